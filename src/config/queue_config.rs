//! 복제 큐 설정 관리 모듈
//!
//! 엔티티 종류별 큐 이름, 수신 타임아웃, 가시성 시간, 에러 백오프, 데드레터 설정을 관리합니다.

use std::env;
use std::time::Duration;

use crate::domain::dto::events::EntityKind;
use crate::errors::{AppError, AppResult};

/// 복제 큐 설정
pub struct QueueConfig;

impl QueueConfig {
    /// 엔티티 종류별 큐 이름을 반환합니다.
    ///
    /// # Environment Variables
    ///
    /// - `COURSE_QUEUE` (기본값: "course-replication")
    /// - `MODULE_QUEUE` (기본값: "module-replication")
    /// - `LESSON_QUEUE` (기본값: "lesson-replication")
    pub fn queue_name(kind: EntityKind) -> String {
        let (var, default) = match kind {
            EntityKind::Course => ("COURSE_QUEUE", "course-replication"),
            EntityKind::Module => ("MODULE_QUEUE", "module-replication"),
            EntityKind::Lesson => ("LESSON_QUEUE", "lesson-replication"),
        };
        env::var(var).unwrap_or_else(|_| default.to_string())
    }

    /// 한 번의 수신 호출이 대기하는 최대 시간. 기본값: 20초
    pub fn receive_timeout() -> Duration {
        let secs = env::var("RECEIVE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(20);
        Duration::from_secs(secs)
    }

    /// 수신 후 ACK 없이 이 시간이 지나면 메시지를 다시 전달합니다. 기본값: 300초
    ///
    /// 적용 실패 시의 즉시 반환이 실패했을 때(연결 끊김, 프로세스 중단) 쓰이는
    /// 안전망이므로 메시지 하나를 적용하는 데 걸리는 시간보다 충분히 길어야 합니다.
    pub fn visibility_timeout() -> Duration {
        let secs = env::var("VISIBILITY_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(300);
        Duration::from_secs(secs)
    }

    /// 전송/저장소 에러 후 다음 수신까지 대기 시간. 기본값: 2000ms
    pub fn error_backoff() -> Duration {
        let millis = env::var("ERROR_BACKOFF_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(2000);
        Duration::from_millis(millis)
    }

    /// 처리 불가능한 메시지를 데드레터 큐로 보낼지 여부. 기본값: true
    pub fn dead_letter_enabled() -> bool {
        env::var("DEAD_LETTER_ENABLED")
            .map(|v| !matches!(v.to_lowercase().as_str(), "false" | "0" | "no"))
            .unwrap_or(true)
    }

    /// 큐 이름에 대응하는 데드레터 큐 이름
    pub fn dead_letter_queue(queue: &str) -> String {
        format!("{}.dlq", queue)
    }

    /// 설정된 세 큐 이름을 검사합니다.
    pub fn validate() -> AppResult<()> {
        let names: Vec<String> = EntityKind::ALL.iter().map(|k| Self::queue_name(*k)).collect();
        Self::validate_queue_names(&names)
    }

    /// 큐 이름은 비어있지 않아야 하고 엔티티 종류마다 달라야 합니다.
    pub fn validate_queue_names(names: &[String]) -> AppResult<()> {
        for (i, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(AppError::ConfigError("큐 이름이 비어 있습니다".to_string()));
            }
            if names[..i].contains(name) {
                return Err(AppError::ConfigError(format!("큐 이름 중복: {}", name)));
            }
        }
        Ok(())
    }
}
