//! 모듈 복제 메시지

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::envelope::{EntityKind, ReplicationMessage, to_bson_datetime, validate_uuid};
use super::lesson_message::LessonMessage;
use crate::domain::entities::ModuleDocument;

/// 모듈 변경 이벤트의 `data`
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ModuleMessage {
    #[serde(rename = "_id", alias = "id")]
    #[validate(custom(function = "validate_uuid"))]
    pub id: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "course_id는 필수입니다"))]
    pub course_id: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "title은 필수입니다"))]
    pub title: String,

    #[serde(default)]
    #[validate(range(min = 1, message = "order_number는 1 이상이어야 합니다"))]
    pub order_number: i32,

    #[serde(default)]
    #[validate(nested)]
    pub lessons: Vec<LessonMessage>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ReplicationMessage for ModuleMessage {
    const KIND: EntityKind = EntityKind::Module;

    fn id(&self) -> &str {
        &self.id
    }
}

impl ModuleMessage {
    /// 저장용 문서로 변환합니다. 임베드 레슨도 함께 변환되며 순서대로 정렬됩니다.
    pub fn into_document(self, received_at: DateTime<Utc>) -> ModuleDocument {
        let mut lessons: Vec<_> = self
            .lessons
            .into_iter()
            .map(|l| l.into_document(received_at))
            .collect();
        lessons.sort_by_key(|l| l.order_number);

        ModuleDocument {
            id: self.id,
            course_id: self.course_id,
            title: self.title,
            order_number: self.order_number,
            lessons,
            created_at: to_bson_datetime(self.created_at, received_at),
            updated_at: to_bson_datetime(self.updated_at, received_at),
        }
    }
}
