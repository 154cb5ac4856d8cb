//! # Configuration Module
//!
//! 복제 서비스의 설정 관리를 담당하는 모듈입니다.
//! 환경 변수 기반의 설정값들을 중앙집중식으로 관리합니다.
//!
//! ## 모듈 구성
//!
//! - [`data_config`] - 실행 환경, MongoDB, Redis 연결 설정
//! - [`queue_config`] - 큐 이름, 수신 타임아웃, 백오프, 데드레터 설정
//!
//! ## 환경 변수 설정 가이드
//!
//! ```bash
//! # 저장소
//! export MONGODB_URI="mongodb://localhost:27017"
//! export DATABASE_NAME="enrollment"
//!
//! # 브로커
//! export REDIS_URL="redis://localhost:6379"
//!
//! # 큐
//! export COURSE_QUEUE="course-replication"
//! export MODULE_QUEUE="module-replication"
//! export LESSON_QUEUE="lesson-replication"
//! export RECEIVE_TIMEOUT_SECS="20"
//! export ERROR_BACKOFF_MS="2000"
//! export DEAD_LETTER_ENABLED="true"
//! ```

pub mod data_config;
pub mod queue_config;

pub use data_config::*;
pub use queue_config::*;
