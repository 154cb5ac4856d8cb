//! # Data Transfer Objects (DTO) Module
//!
//! 서비스 경계에서 들어오는 데이터의 계약을 정의합니다.
//! 이 서비스의 경계는 HTTP가 아니라 메시지 큐이므로, DTO는 큐 메시지 형식입니다.
//!
//! ## 설계 원칙
//!
//! - **와이어 형식과 저장 형식 분리**: DTO는 RFC 3339 타임스탬프를 받고,
//!   엔티티는 BSON `DateTime`으로 저장합니다.
//! - **검증 내장**: `validator` crate로 필수 필드 규칙을 선언합니다.
//!
//! ## 모듈 구조
//!
//! ```text
//! dto/
//! └── events/
//!     ├── envelope.rs        # 액션 + 문서 봉투, 디코딩/검증
//!     ├── course_message.rs
//!     ├── module_message.rs
//!     └── lesson_message.rs
//! ```

pub mod events;
