//! 카탈로그 복제 이벤트 DTO
//!
//! 코스 서비스가 발행하는 코스/모듈/레슨 변경 이벤트의 와이어 형식입니다.
//! 디코딩과 필드 검증을 담당하며, 저장용 문서로의 변환을 제공합니다.
//!
//! ## 필수 필드
//!
//! | 메시지 | 규칙 |
//! |--------|------|
//! | 공통 | `_id`는 UUID |
//! | Course | `name` 비어있지 않음 |
//! | Module | `course_id`, `title` 비어있지 않음, `order_number` ≥ 1 |
//! | Lesson | `module_id`, `title` 비어있지 않음, `order_number` ≥ 1 |

pub mod course_message;
pub mod envelope;
pub mod lesson_message;
pub mod module_message;

pub use course_message::CourseMessage;
pub use envelope::*;
pub use lesson_message::LessonMessage;
pub use module_message::ModuleMessage;
