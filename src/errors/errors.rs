//! 애플리케이션 전역에서 사용하는 에러 시스템
//!
//! 복제 파이프라인을 위한 통합 에러 처리 시스템입니다.
//! `thiserror`를 사용하여 타입 안전하고 일관된 에러 처리를 제공합니다.
//!
//! ## 에러 분류와 메시지 처리
//!
//! | AppError | 분류 | 큐 메시지 처리 |
//! |----------|------|----------------|
//! | `Timeout` | 전송 | 소비된 메시지 없음, 다음 루프에서 재시도 |
//! | `BrokerError` | 전송 | 소비된 메시지 없음, 백오프 후 재시도 |
//! | `DecodeError` | 디코딩 | 데드레터 후 ACK |
//! | `ValidationError` | 검증 | 데드레터 후 ACK |
//! | `DatabaseError` | 저장소 | ACK 하지 않음 (브로커가 재전달) |
//! | `Cancelled` | 취소 | 호출자에게 즉시 반환 |
//!
//! ## 사용 예제
//!
//! ```rust,ignore
//! use crate::errors::AppError;
//!
//! let course = collection.find_one(doc! { "_id": id }).await
//!     .map_err(|e| AppError::DatabaseError(e.to_string()))?;
//! ```

use thiserror::Error;

/// 애플리케이션 전역 에러 타입
///
/// 복제 파이프라인에서 발생할 수 있는 모든 종류의 에러를 포괄하는 열거형입니다.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    /// 데이터베이스 관련 에러
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// 메시지 브로커 관련 에러 (연결 실패, 명령 실패)
    #[error("Broker error: {0}")]
    BrokerError(String),

    /// 수신 대기 시간 초과
    #[error("Receive timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// 호출자가 수신을 취소함
    #[error("Receive cancelled")]
    Cancelled,

    /// JSON 페이로드 디코딩 에러
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// 입력값 검증 에러
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 설정값 에러
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// 내부 에러
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AppError {
    /// 메시지 자체가 처리 불가능한 에러인지 확인합니다.
    ///
    /// 디코딩/검증 에러는 재전달해도 결과가 같으므로 ACK 대상입니다.
    pub fn is_unprocessable(&self) -> bool {
        matches!(self, AppError::DecodeError(_) | AppError::ValidationError(_))
    }

    /// 브로커 수준의 일시적 에러인지 확인합니다.
    pub fn is_transport(&self) -> bool {
        matches!(self, AppError::Timeout(_) | AppError::BrokerError(_))
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(e: mongodb::error::Error) -> Self {
        AppError::DatabaseError(e.to_string())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        AppError::BrokerError(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::DecodeError(e.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::ValidationError(e.to_string())
    }
}

/// 편의성을 위한 Result 타입 별칭
pub type AppResult<T> = Result<T, AppError>;

/// 외부 라이브러리 에러를 AppError로 변환하는 확장 trait
pub trait ErrorContext<T> {
    /// 컨텍스트 정보와 함께 에러를 변환합니다.
    fn context(self, msg: &str) -> AppResult<T>;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn context(self, msg: &str) -> AppResult<T> {
        self.map_err(|e| AppError::InternalError(format!("{}: {}", msg, e)))
    }
}
