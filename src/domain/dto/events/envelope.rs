//! 복제 이벤트 봉투(envelope)
//!
//! 큐 메시지 하나는 다음 형태의 JSON 문서입니다.
//!
//! ```json
//! { "action": "CREATE", "data": { "_id": "…", "title": "…" } }
//! ```
//!
//! `action`이 없는 기존 형식(문서만 있는 메시지)은 수신자가 기본 액션을
//! 설정한 경우에만 허용됩니다.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};

use crate::errors::{AppError, AppResult};

/// 복제 액션
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplicationAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for ReplicationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplicationAction::Create => write!(f, "CREATE"),
            ReplicationAction::Update => write!(f, "UPDATE"),
            ReplicationAction::Delete => write!(f, "DELETE"),
        }
    }
}

/// 복제 대상 엔티티 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Course,
    Module,
    Lesson,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Course, EntityKind::Module, EntityKind::Lesson];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Course => "course",
            EntityKind::Module => "module",
            EntityKind::Lesson => "lesson",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 엔티티별 복제 메시지가 구현하는 trait
pub trait ReplicationMessage: DeserializeOwned + Validate + Send + Sync + 'static {
    /// 메시지가 나타내는 엔티티 종류
    const KIND: EntityKind;

    /// 메시지의 엔티티 ID
    fn id(&self) -> &str;
}

/// 액션과 문서를 함께 담은 복제 이벤트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationEnvelope<T> {
    pub action: ReplicationAction,
    pub data: T,
}

impl<T: ReplicationMessage> ReplicationEnvelope<T> {
    /// 페이로드를 디코딩합니다.
    ///
    /// 최상위 객체에 `action` 키가 있으면 봉투 형식으로, 없으면 문서 자체로 해석합니다.
    /// 문서만 있는 경우 `default_action`이 없으면 디코딩 에러입니다.
    pub fn decode(payload: &[u8], default_action: Option<ReplicationAction>) -> AppResult<Self> {
        let value: Value = serde_json::from_slice(payload)?;

        let is_enveloped = value
            .as_object()
            .map(|map| map.contains_key("action"))
            .unwrap_or(false);

        if is_enveloped {
            return Ok(serde_json::from_value(value)?);
        }

        let action = default_action.ok_or_else(|| {
            AppError::DecodeError(format!(
                "{} message carries no action and no default action is configured",
                T::KIND
            ))
        })?;

        Ok(Self {
            action,
            data: serde_json::from_value(value)?,
        })
    }

    /// 액션에 맞게 필수 필드를 검증합니다.
    ///
    /// DELETE는 `_id`만 검사하고, CREATE/UPDATE는 전체 필드 규칙을 적용합니다.
    pub fn validate(&self) -> AppResult<()> {
        match self.action {
            ReplicationAction::Delete => validate_uuid(self.data.id())
                .map_err(|e| AppError::ValidationError(format!("_id: {}", e))),
            ReplicationAction::Create | ReplicationAction::Update => {
                Validate::validate(&self.data)?;
                Ok(())
            }
        }
    }
}

/// ID가 UUID 형식인지 검증
pub fn validate_uuid(id: &str) -> Result<(), ValidationError> {
    uuid::Uuid::parse_str(id).map(|_| ()).map_err(|_| {
        ValidationError::new("invalid_uuid").with_message("ID는 UUID 형식이어야 합니다".into())
    })
}

/// 선택적 타임스탬프를 BSON `DateTime`으로 변환합니다. 없으면 `fallback`을 사용합니다.
pub fn to_bson_datetime(
    ts: Option<chrono::DateTime<chrono::Utc>>,
    fallback: chrono::DateTime<chrono::Utc>,
) -> mongodb::bson::DateTime {
    mongodb::bson::DateTime::from_millis(ts.unwrap_or(fallback).timestamp_millis())
}
