//! 코스 트리 문서 (courses → modules → lessons)
//!
//! 세 문서는 각자의 컬렉션에 단독으로 저장되는 동시에 부모 문서의 배열에 임베드됩니다.
//! 두 위치를 함께 갱신하는 책임은 리포지토리에 있습니다.

pub mod course;
pub mod lesson;
pub mod module;

pub use course::CourseDocument;
pub use lesson::LessonDocument;
pub use module::ModuleDocument;
