//! 큐 하나를 담당하는 제네릭 엔티티 수신자

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, info, warn};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{ApplyReplication, ReceiveOutcome, ReplicationReceiver};
use crate::broker::{BrokerClient, ReceivedMessage};
use crate::config::QueueConfig;
use crate::domain::dto::events::{EntityKind, ReplicationAction, ReplicationEnvelope};
use crate::errors::{AppError, AppResult};
use crate::repositories::courses::CourseProgressRepository;

/// 브로커가 `timeout`을 지키지 못할 때 추가로 기다리는 시간
const RECEIVE_GRACE: Duration = Duration::from_secs(5);

const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(300);

/// 엔티티 수신자
///
/// `M`은 큐에 실리는 메시지 타입이며, 적용 규칙은 `M`의 [`ApplyReplication`] 구현을 따릅니다.
pub struct EntityReceiver<M> {
    queue: String,
    broker: Arc<dyn BrokerClient>,
    repository: Arc<dyn CourseProgressRepository>,
    timeout: Duration,
    visibility_timeout: Duration,
    dead_letter_queue: Option<String>,
    default_action: Option<ReplicationAction>,
    _message: PhantomData<fn() -> M>,
}

impl<M: ApplyReplication> EntityReceiver<M> {
    pub fn new(
        queue: impl Into<String>,
        broker: Arc<dyn BrokerClient>,
        repository: Arc<dyn CourseProgressRepository>,
        timeout: Duration,
    ) -> Self {
        Self {
            queue: queue.into(),
            broker,
            repository,
            timeout,
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
            dead_letter_queue: None,
            default_action: None,
            _message: PhantomData,
        }
    }

    /// [`QueueConfig`]의 큐 이름, 수신 타임아웃, 가시성 시간, 데드레터 설정으로 수신자를 만듭니다.
    pub fn from_config(
        broker: Arc<dyn BrokerClient>,
        repository: Arc<dyn CourseProgressRepository>,
    ) -> Self {
        let queue = QueueConfig::queue_name(M::KIND);
        let dead_letter_queue = QueueConfig::dead_letter_enabled()
            .then(|| QueueConfig::dead_letter_queue(&queue));

        Self {
            dead_letter_queue,
            visibility_timeout: QueueConfig::visibility_timeout(),
            ..Self::new(queue, broker, repository, QueueConfig::receive_timeout())
        }
    }

    /// 디코딩/검증에 실패한 메시지를 ACK 하기 전에 보낼 큐를 지정합니다.
    pub fn with_dead_letter_queue(mut self, queue: impl Into<String>) -> Self {
        self.dead_letter_queue = Some(queue.into());
        self
    }

    /// `action` 없이 문서만 실린 메시지에 적용할 액션을 지정합니다.
    pub fn with_default_action(mut self, action: ReplicationAction) -> Self {
        self.default_action = Some(action);
        self
    }

    pub fn with_visibility_timeout(mut self, visibility: Duration) -> Self {
        self.visibility_timeout = visibility;
        self
    }

    async fn receive_from_broker(&self) -> AppResult<ReceivedMessage> {
        let receive = self.broker.receive_message(&self.queue, self.timeout);

        match tokio::time::timeout(self.timeout + RECEIVE_GRACE, receive).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(self.timeout)),
        }
    }

    fn decode(&self, payload: &[u8]) -> AppResult<ReplicationEnvelope<M>> {
        let envelope = ReplicationEnvelope::<M>::decode(payload, self.default_action)?;
        envelope.validate()?;
        Ok(envelope)
    }

    /// 처리할 수 없는 메시지를 데드레터 큐로 보낸 뒤 ACK 합니다.
    ///
    /// 데드레터 전송이 실패하면 ACK 하지 않습니다.
    async fn reject(&self, message: &ReceivedMessage, cause: &AppError) -> AppResult<()> {
        let id = peek_id(&message.payload);

        match &self.dead_letter_queue {
            Some(dlq) => {
                warn!(
                    "☠️ [{}] 처리할 수 없는 메시지 queue={} id={} dlq={}: {}",
                    M::KIND, self.queue, id, dlq, cause
                );
                self.broker.send_message(dlq, &message.payload).await?;
            }
            None => warn!(
                "🗑️ [{}] 처리할 수 없는 메시지 폐기 queue={} id={}: {}",
                M::KIND, self.queue, id, cause
            ),
        }

        self.broker.delete_message(&self.queue, &message.receipt).await
    }

    async fn handle_message(&self, message: ReceivedMessage) -> AppResult<ReceiveOutcome> {
        let envelope = match self.decode(&message.payload) {
            Ok(envelope) => envelope,
            Err(cause) => {
                self.reject(&message, &cause).await?;
                return Err(cause);
            }
        };

        let id = envelope.data.id().to_string();
        let action = envelope.action;

        if let Err(e) = envelope
            .data
            .apply(action, self.repository.as_ref(), Utc::now())
            .await
        {
            error!(
                "❌ [{}] 적용 실패, 큐에 반환 queue={} id={} action={}: {}",
                M::KIND, self.queue, id, action, e
            );

            // 반환에 실패해도 가시성 시간이 지나면 다시 전달된다
            if let Err(release_error) = self.broker.release_message(&self.queue, &message.receipt).await {
                warn!(
                    "⚠️ [{}] 메시지 반환 실패 queue={} id={}: {}",
                    M::KIND, self.queue, id, release_error
                );
            }
            return Err(e);
        }

        self.broker.delete_message(&self.queue, &message.receipt).await?;

        info!("✅ [{}] 복제 적용 queue={} id={} action={}", M::KIND, self.queue, id, action);

        Ok(ReceiveOutcome {
            kind: M::KIND,
            id,
            action,
        })
    }
}

#[async_trait]
impl<M: ApplyReplication> ReplicationReceiver for EntityReceiver<M> {
    fn kind(&self) -> EntityKind {
        M::KIND
    }

    fn queue(&self) -> &str {
        &self.queue
    }

    fn dead_letter_queue(&self) -> Option<&str> {
        self.dead_letter_queue.as_deref()
    }

    fn visibility_timeout(&self) -> Duration {
        self.visibility_timeout
    }

    async fn requeue_expired(&self) -> AppResult<usize> {
        self.broker.requeue_expired(&self.queue, self.visibility_timeout).await
    }

    async fn receive(&self, cancel: &CancellationToken) -> AppResult<ReceiveOutcome> {
        // 취소되면 브로커 호출 future는 drop 되고, 가져오지 않은 메시지는 큐에 남는다
        let message = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("[{}] 수신 취소 queue={}", M::KIND, self.queue);
                return Err(AppError::Cancelled);
            }
            result = self.receive_from_broker() => result?,
        };

        self.handle_message(message).await
    }
}

/// 로그용으로 페이로드에서 엔티티 ID를 꺼냅니다.
fn peek_id(payload: &[u8]) -> String {
    let Ok(value) = serde_json::from_slice::<Value>(payload) else {
        return "-".to_string();
    };

    let document = value.get("data").unwrap_or(&value);
    document
        .get("_id")
        .or_else(|| document.get("id"))
        .and_then(Value::as_str)
        .unwrap_or("-")
        .to_string()
}
