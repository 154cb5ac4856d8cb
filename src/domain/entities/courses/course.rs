//! Course Document
//!
//! 진도 추적 조회에 최적화된 코스 문서입니다.
//! 모듈 트리 전체를 임베드하며 `courses` 컬렉션에 저장됩니다.

use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

use super::module::ModuleDocument;

/// 코스 문서
///
/// 카탈로그 서비스의 쓰기 모델을 복제한 읽기 모델입니다.
/// `modules` 배열은 `modules` 컬렉션의 단독 문서와 같은 내용을 유지해야 합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseDocument {
    /// 코스 ID (UUID 문자열, 변경되지 않음)
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub category: String,
    pub level: String,
    pub instructor_id: String,
    #[serde(default)]
    pub thumbnail_url: String,
    #[serde(default)]
    pub language: String,
    /// `order_number` 오름차순으로 정렬된 임베드 모듈
    #[serde(default)]
    pub modules: Vec<ModuleDocument>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl CourseDocument {
    /// 같은 ID의 모듈이 있으면 교체하고, 없으면 추가합니다.
    pub fn upsert_module(&mut self, module: ModuleDocument) {
        self.modules.retain(|m| m.id != module.id);
        self.modules.push(module);
        self.modules.sort_by_key(|m| m.order_number);
    }

    /// 임베드된 모듈을 제거합니다. 제거된 경우 `true`를 반환합니다.
    pub fn remove_module(&mut self, module_id: &str) -> bool {
        let before = self.modules.len();
        self.modules.retain(|m| m.id != module_id);
        self.modules.len() != before
    }

    /// 임베드된 모듈을 ID로 찾습니다.
    pub fn module(&self, module_id: &str) -> Option<&ModuleDocument> {
        self.modules.iter().find(|m| m.id == module_id)
    }
}
