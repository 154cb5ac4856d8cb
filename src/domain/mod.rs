//! # Domain Layer Module
//!
//! 복제 파이프라인의 도메인 계층입니다.
//!
//! ```text
//! Domain Layer (이 모듈)
//! ├── Entities  - MongoDB에 저장되는 코스/모듈/레슨 문서
//! └── DTOs      - 큐로 들어오는 복제 이벤트
//!      │
//!      ▼
//! Receivers (디코딩 → 검증 → 적용)
//!      │
//!      ▼
//! Repositories (courses / modules / lessons 컬렉션)
//! ```
//!
//! | 구분 | 타임스탬프 | ID | 검증 |
//! |------|-----------|----|------|
//! | `dto::events` | `chrono::DateTime<Utc>` (RFC 3339) | UUID 문자열 | `validator` |
//! | `entities` | `bson::DateTime` | UUID 문자열 | 없음 (검증된 DTO에서만 생성) |

pub mod dto;
pub mod entities;
