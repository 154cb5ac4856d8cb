//! 진도 추적용 코스 트리 리포지토리
//!
//! [`CourseProgressRepository`] trait과 두 구현체를 제공합니다.
//!
//! - [`mongo_repo::MongoCourseProgressRepository`] - MongoDB `courses`/`modules`/`lessons` 컬렉션
//! - [`memory_repo::InMemoryCourseProgressRepository`] - 프로세스 내부 저장소
//!
//! # 이중 저장 규칙
//!
//! 모듈과 레슨은 자신의 컬렉션에 단독 문서로 저장되는 동시에 부모 문서의 배열에
//! 임베드됩니다. 두 위치는 서로 다른 쓰기로 갱신되므로 원자적이지 않으며,
//! 중간에 실패하면 조상 문서가 다시 저장될 때까지 일시적으로 어긋날 수 있습니다.
//!
//! # 삭제 전파
//!
//! | 연산 | 삭제 대상 |
//! |------|-----------|
//! | `delete_module` | 모듈의 레슨 → 모듈 → 코스 배열의 요소 |
//! | `delete_lesson` | 레슨 → 모듈 배열의 요소 |
//! | `delete` (코스) | 코스 → 코스의 모듈 (레슨은 남음) |

use async_trait::async_trait;

use crate::domain::entities::{CourseDocument, LessonDocument, ModuleDocument};
use crate::errors::AppResult;

pub mod memory_repo;
pub mod mongo_repo;

pub use memory_repo::InMemoryCourseProgressRepository;
pub use mongo_repo::MongoCourseProgressRepository;

/// 한 페이지당 최대 코스 수
pub const MAX_PAGE_LIMIT: u64 = 100;

/// `find_all` 결과 페이지
#[derive(Debug, Clone, PartialEq)]
pub struct CoursePage {
    /// `created_at` 내림차순으로 정렬된 코스
    pub items: Vec<CourseDocument>,
    /// 전체 코스 수
    pub total: u64,
    /// 1부터 시작하는 페이지 번호
    pub page: u64,
    pub limit: u64,
}

/// 페이지 번호와 크기를 보정합니다.
///
/// 페이지는 1부터 시작하며 0은 1로, 크기는 1..=100 범위로 맞춥니다.
pub fn normalize_page(page: u64, limit: u64) -> (u64, u64) {
    (page.max(1), limit.clamp(1, MAX_PAGE_LIMIT))
}

/// 코스 트리 읽기 모델 리포지토리
///
/// 모든 쓰기 연산은 같은 입력으로 두 번 호출해도 결과가 같고,
/// 이미 없는 ID를 삭제해도 에러가 아닙니다 (`Ok(false)`).
#[async_trait]
pub trait CourseProgressRepository: Send + Sync {
    /// 코스 문서를 ID 기준으로 upsert 합니다.
    ///
    /// 실려 온 모듈/레슨은 단독 문서로도 upsert 되고, 코스의 `modules` 배열은
    /// `modules` 컬렉션 기준으로 다시 만들어집니다. 따라서 빈 `modules`로 저장해도
    /// 이미 복제된 모듈이 사라지지 않습니다.
    async fn save(&self, course: CourseDocument) -> AppResult<()>;

    /// `save`와 같지만 저장된 코스의 `created_at`을 유지합니다.
    async fn update(&self, course: CourseDocument) -> AppResult<()>;

    /// 코스와 `course_id`가 일치하는 모든 모듈을 삭제합니다. 레슨은 삭제하지 않습니다.
    async fn delete(&self, course_id: &str) -> AppResult<bool>;

    /// 단독 모듈(실려 온 레슨 포함)을 upsert 하고 코스 배열에 넣거나 교체합니다.
    ///
    /// 저장된 모듈이 있으면 `created_at`은 유지되고, 레슨 배열은 `lessons` 컬렉션
    /// 기준으로 다시 만들어집니다. 부모보다 먼저 도착한 레슨도 이때 임베드됩니다.
    async fn add_module(&self, course_id: &str, module: ModuleDocument) -> AppResult<()>;

    /// `module.course_id` 코스로 `add_module` 합니다. 레슨과 `created_at`은 유지됩니다.
    async fn update_module(&self, module: ModuleDocument) -> AppResult<()>;

    /// 모듈의 레슨, 모듈, 코스 배열의 요소를 차례로 삭제합니다.
    ///
    /// 단독 모듈 문서가 있었을 때만 `true` 입니다.
    async fn delete_module(&self, module_id: &str) -> AppResult<bool>;

    /// 단독 레슨을 upsert 하고 모듈 배열에 넣거나 교체합니다.
    async fn add_lesson(&self, module_id: &str, lesson: LessonDocument) -> AppResult<()>;

    /// 레슨을 교체하고(저장된 `created_at` 유지) 모듈 배열의 요소도 교체합니다.
    async fn update_lesson(&self, lesson: LessonDocument) -> AppResult<()>;

    /// 레슨과 모듈 배열의 요소를 삭제합니다.
    async fn delete_lesson(&self, lesson_id: &str) -> AppResult<bool>;

    async fn find_by_id(&self, course_id: &str) -> AppResult<Option<CourseDocument>>;

    /// `created_at` 내림차순 페이지와 전체 개수를 반환합니다.
    async fn find_all(&self, page: u64, limit: u64) -> AppResult<CoursePage>;

    async fn find_by_instructor(&self, instructor_id: &str) -> AppResult<Vec<CourseDocument>>;

    async fn find_by_category(&self, category: &str) -> AppResult<Vec<CourseDocument>>;

    async fn find_by_level(&self, level: &str) -> AppResult<Vec<CourseDocument>>;

    async fn find_module_by_id(&self, module_id: &str) -> AppResult<Option<ModuleDocument>>;

    async fn find_lesson_by_id(&self, lesson_id: &str) -> AppResult<Option<LessonDocument>>;

    /// 코스의 단독 모듈 문서를 `order_number` 순으로 반환합니다.
    async fn find_modules_by_course(&self, course_id: &str) -> AppResult<Vec<ModuleDocument>>;

    /// 모듈의 단독 레슨 문서를 `order_number` 순으로 반환합니다.
    async fn find_lessons_by_module(&self, module_id: &str) -> AppResult<Vec<LessonDocument>>;
}
