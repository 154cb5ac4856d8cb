//! 메시지 브로커 계층 모듈
//!
//! 수신자가 사용하는 브로커 추상화와 구현체를 제공합니다.
//! 이 trait 위의 모든 코드는 브로커 종류와 무관합니다.
//!
//! # 구현체
//!
//! - [`redis::RedisBroker`] - Redis 리스트 기반 신뢰성 큐 (운영)
//! - [`memory::InMemoryBroker`] - 프로세스 내부 큐 (테스트, 임베딩)
//!
//! # 전달 보장
//!
//! 수신된 메시지는 `delete_message`로 ACK 하기 전까지 in-flight 상태로 남고,
//! ACK 되지 않은 메시지는 브로커가 다시 전달합니다 (at-least-once).
//!
//! - 적용에 실패한 메시지는 `release_message`로 즉시 대기열에 되돌립니다.
//! - 반환조차 못 한 메시지는 가시성 시간이 지나면 `requeue_expired`가 되돌립니다.
//!
//! ```rust,ignore
//! let message = broker.receive_message("course-replication", Duration::from_secs(20)).await?;
//! // ... 적용 ...
//! broker.delete_message("course-replication", &message.receipt).await?;
//! ```

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::AppResult;

pub mod memory;
pub mod redis;

pub use self::memory::InMemoryBroker;
pub use self::redis::RedisBroker;

/// 수신된 메시지 하나
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    /// JSON 페이로드
    pub payload: Vec<u8>,
    /// ACK에 사용하는 불투명 핸들
    pub receipt: String,
}

/// 수신자가 사용하는 브로커 클라이언트
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// 메시지가 도착하거나 `timeout`이 지날 때까지 대기합니다.
    ///
    /// 호출당 ACK 되지 않은 메시지 하나를 반환하며,
    /// 시간 초과 시 [`AppError::Timeout`](crate::errors::AppError::Timeout)을 반환합니다.
    async fn receive_message(&self, queue: &str, timeout: Duration) -> AppResult<ReceivedMessage>;

    /// `receipt`가 가리키는 메시지를 큐에서 제거(ACK)합니다.
    async fn delete_message(&self, queue: &str, receipt: &str) -> AppResult<()>;

    /// ACK 하지 않고 메시지를 대기열에 되돌립니다. 다음 수신에서 다시 전달됩니다.
    ///
    /// 이미 ACK 되었거나 되돌려진 영수증이면 아무것도 하지 않습니다.
    async fn release_message(&self, queue: &str, receipt: &str) -> AppResult<()>;

    /// 수신 후 `visibility` 이상 ACK 되지 않은 메시지를 대기열에 되돌립니다.
    ///
    /// 되돌린 메시지 수를 반환합니다.
    async fn requeue_expired(&self, queue: &str, visibility: Duration) -> AppResult<usize>;

    /// 큐에 메시지를 넣습니다. 데드레터 전송에 사용됩니다.
    async fn send_message(&self, queue: &str, payload: &[u8]) -> AppResult<()>;
}
