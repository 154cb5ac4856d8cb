//! 데이터 저장소 및 환경 설정 관리 모듈
//!
//! MongoDB, Redis 연결 정보와 실행 환경 설정을 관리합니다.

use std::env;

/// 애플리케이션 실행 환경
#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    /// 개발 환경
    Development,
    /// 테스트 환경
    Test,
    /// 프로덕션 환경
    Production,
}

impl Environment {
    /// 현재 실행 환경을 감지합니다.
    ///
    /// `ENVIRONMENT` 환경 변수를 확인하며,
    /// 설정되지 않은 경우 `Production`을 기본값으로 사용합니다.
    pub fn current() -> Self {
        Self::from_str(&env::var("ENVIRONMENT").unwrap_or_else(|_| "production".to_string()))
    }

    /// 문자열에서 Environment를 생성합니다.
    ///
    /// 알 수 없는 값인 경우 `Production`을 반환합니다.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            "test" | "testing" => Environment::Test,
            _ => Environment::Production,
        }
    }

    /// 환경별 기본 데이터베이스 이름
    pub fn default_database_name(&self) -> &'static str {
        match self {
            Environment::Development => "enrollment_dev",
            Environment::Test => "enrollment_test",
            Environment::Production => "enrollment",
        }
    }
}

/// MongoDB 연결 설정
pub struct DatabaseConfig;

impl DatabaseConfig {
    /// MongoDB 연결 URI. 기본값: "mongodb://localhost:27017"
    pub fn uri() -> String {
        env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string())
    }

    /// 사용할 데이터베이스 이름
    ///
    /// `DATABASE_NAME`이 없으면 현재 환경의 기본 이름을 사용합니다.
    pub fn database_name() -> String {
        env::var("DATABASE_NAME")
            .unwrap_or_else(|_| Environment::current().default_database_name().to_string())
    }

    /// 모니터링에 표시될 애플리케이션 이름
    pub fn app_name() -> String {
        env::var("MONGODB_APP_NAME").unwrap_or_else(|_| "enrollment_replication".to_string())
    }
}

/// 메시지 브로커(Redis) 연결 설정
pub struct BrokerConfig;

impl BrokerConfig {
    /// Redis 연결 URL. 기본값: "redis://localhost:6379"
    pub fn redis_url() -> String {
        env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
    }
}
