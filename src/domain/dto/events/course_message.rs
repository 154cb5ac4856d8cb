//! 코스 복제 메시지

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::envelope::{EntityKind, ReplicationMessage, to_bson_datetime, validate_uuid};
use super::module_message::ModuleMessage;
use crate::domain::entities::CourseDocument;

/// 코스 변경 이벤트의 `data`
///
/// ```json
/// {
///   "_id": "5f0c1d2e-…",
///   "name": "Go Basics",
///   "category": "PROGRAMMING",
///   "level": "BEGINNER",
///   "instructor_id": "…",
///   "thumbnail_url": "https://…",
///   "language": "EN",
///   "modules": [],
///   "created_at": "2024-01-01T00:00:00Z",
///   "updated_at": "2024-01-01T00:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CourseMessage {
    #[serde(rename = "_id", alias = "id")]
    #[validate(custom(function = "validate_uuid"))]
    pub id: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "name은 필수입니다"))]
    pub name: String,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub level: String,

    #[serde(default)]
    pub instructor_id: String,

    #[serde(default)]
    pub thumbnail_url: String,

    #[serde(default)]
    pub language: String,

    #[serde(default)]
    #[validate(nested)]
    pub modules: Vec<ModuleMessage>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ReplicationMessage for CourseMessage {
    const KIND: EntityKind = EntityKind::Course;

    fn id(&self) -> &str {
        &self.id
    }
}

impl CourseMessage {
    /// 저장용 문서로 변환합니다. 임베드 트리 전체가 함께 변환됩니다.
    pub fn into_document(self, received_at: DateTime<Utc>) -> CourseDocument {
        let mut modules: Vec<_> = self
            .modules
            .into_iter()
            .map(|m| m.into_document(received_at))
            .collect();
        modules.sort_by_key(|m| m.order_number);

        CourseDocument {
            id: self.id,
            name: self.name,
            category: self.category,
            level: self.level,
            instructor_id: self.instructor_id,
            thumbnail_url: self.thumbnail_url,
            language: self.language,
            modules,
            created_at: to_bson_datetime(self.created_at, received_at),
            updated_at: to_bson_datetime(self.updated_at, received_at),
        }
    }
}
