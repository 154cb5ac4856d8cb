//! Lesson Document
//!
//! `lessons` 컬렉션에 저장되며, 부모 모듈의 `lessons` 배열에도 임베드되는 문서입니다.

use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

/// 레슨 문서
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonDocument {
    /// 레슨 ID (UUID 문자열)
    #[serde(rename = "_id")]
    pub id: String,
    /// 소속 모듈 ID
    pub module_id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// 콘텐츠 종류 (VIDEO, TEXT, QUIZ 등)
    #[serde(default)]
    pub content_type: String,
    /// 학습 시간 (분)
    #[serde(default)]
    pub duration_minutes: i32,
    /// 모듈 내 순서 (1부터 시작)
    pub order_number: i32,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}
