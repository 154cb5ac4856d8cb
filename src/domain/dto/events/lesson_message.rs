//! 레슨 복제 메시지

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::envelope::{EntityKind, ReplicationMessage, to_bson_datetime, validate_uuid};
use crate::domain::entities::LessonDocument;

/// 레슨 변경 이벤트의 `data`
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct LessonMessage {
    #[serde(rename = "_id", alias = "id")]
    #[validate(custom(function = "validate_uuid"))]
    pub id: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "module_id는 필수입니다"))]
    pub module_id: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "title은 필수입니다"))]
    pub title: String,

    #[serde(default)]
    pub content: String,

    #[serde(default)]
    #[validate(range(min = 0, message = "duration_minutes는 0 이상이어야 합니다"))]
    pub duration_minutes: i32,

    #[serde(default)]
    #[validate(range(min = 1, message = "order_number는 1 이상이어야 합니다"))]
    pub order_number: i32,

    #[serde(default)]
    pub content_type: String,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ReplicationMessage for LessonMessage {
    const KIND: EntityKind = EntityKind::Lesson;

    fn id(&self) -> &str {
        &self.id
    }
}

impl LessonMessage {
    /// 저장용 문서로 변환합니다. 타임스탬프가 없으면 `received_at`을 사용합니다.
    pub fn into_document(self, received_at: DateTime<Utc>) -> LessonDocument {
        LessonDocument {
            id: self.id,
            module_id: self.module_id,
            title: self.title,
            content: self.content,
            content_type: self.content_type,
            duration_minutes: self.duration_minutes,
            order_number: self.order_number,
            created_at: to_bson_datetime(self.created_at, received_at),
            updated_at: to_bson_datetime(self.updated_at, received_at),
        }
    }
}
