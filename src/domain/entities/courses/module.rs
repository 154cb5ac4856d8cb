//! Module Document
//!
//! `modules` 컬렉션에 저장되며, 부모 코스의 `modules` 배열에도 임베드되는 문서입니다.
//! 모듈 자신도 레슨 배열을 임베드합니다.

use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

use super::lesson::LessonDocument;

/// 모듈 문서
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDocument {
    /// 모듈 ID (UUID 문자열)
    #[serde(rename = "_id")]
    pub id: String,
    /// 소속 코스 ID
    pub course_id: String,
    pub title: String,
    /// 코스 내 순서 (1부터 시작)
    pub order_number: i32,
    /// `order_number` 오름차순으로 정렬된 임베드 레슨
    #[serde(default)]
    pub lessons: Vec<LessonDocument>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl ModuleDocument {
    /// 같은 ID의 레슨이 있으면 교체하고, 없으면 추가합니다.
    ///
    /// 배열은 항상 `order_number` 순으로 유지됩니다.
    pub fn upsert_lesson(&mut self, lesson: LessonDocument) {
        self.lessons.retain(|l| l.id != lesson.id);
        self.lessons.push(lesson);
        self.lessons.sort_by_key(|l| l.order_number);
    }

    /// 임베드된 레슨을 제거합니다. 제거된 경우 `true`를 반환합니다.
    pub fn remove_lesson(&mut self, lesson_id: &str) -> bool {
        let before = self.lessons.len();
        self.lessons.retain(|l| l.id != lesson_id);
        self.lessons.len() != before
    }

    /// UPDATE 이벤트를 기존 문서에 적용한 결과를 반환합니다.
    ///
    /// 스칼라 필드와 `updated_at`만 교체하고, 임베드 레슨과 `created_at`은 유지합니다.
    pub fn merged_with(&self, incoming: &ModuleDocument) -> ModuleDocument {
        ModuleDocument {
            id: self.id.clone(),
            course_id: incoming.course_id.clone(),
            title: incoming.title.clone(),
            order_number: incoming.order_number,
            lessons: self.lessons.clone(),
            created_at: self.created_at,
            updated_at: incoming.updated_at,
        }
    }
}
