//! 엔티티 복제 수신자 모듈
//!
//! 큐 하나를 담당하는 수신자가 메시지를 받아 디코딩, 검증한 뒤
//! 리포지토리에 적용하고 ACK 합니다. 코스, 모듈, 레슨 수신자는 구조가 같고
//! 엔티티별 적용 규칙만 [`ApplyReplication`] 구현으로 다릅니다.
//!
//! # 처리 흐름
//!
//! ```text
//! receive(cancel)
//!    │
//!    ├─ cancel ──────────────────────────────▶ Err(Cancelled)
//!    ▼
//! broker.receive_message(queue, timeout) ──▶ Err(Timeout | BrokerError)
//!    │
//!    ▼
//! decode + validate ──실패──▶ DLQ 전송 → ACK ─▶ Err(DecodeError | ValidationError)
//!    │
//!    ▼
//! repository 적용 ──실패──▶ 큐에 반환 ──────▶ Err(DatabaseError)  (다음 수신에서 재전달)
//!    │
//!    ▼
//! broker.delete_message(queue, receipt) ───▶ Ok(ReceiveOutcome)
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! let receiver = CourseReceiver::new("course-replication", broker, repository, Duration::from_secs(20))
//!     .with_dead_letter_queue("course-replication.dlq");
//!
//! let outcome = receiver.receive(&cancel).await?;
//! info!("applied {} {} {}", outcome.kind, outcome.action, outcome.id);
//! ```

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::domain::dto::events::{
    CourseMessage, EntityKind, LessonMessage, ModuleMessage, ReplicationAction, ReplicationMessage,
};
use crate::errors::AppResult;
use crate::repositories::courses::CourseProgressRepository;

pub mod course_receiver;
pub mod entity_receiver;
pub mod lesson_receiver;
pub mod module_receiver;

pub use entity_receiver::EntityReceiver;

pub type CourseReceiver = EntityReceiver<CourseMessage>;
pub type ModuleReceiver = EntityReceiver<ModuleMessage>;
pub type LessonReceiver = EntityReceiver<LessonMessage>;

/// 성공적으로 적용되고 ACK 된 메시지 하나의 결과
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiveOutcome {
    pub kind: EntityKind,
    pub id: String,
    pub action: ReplicationAction,
}

impl fmt::Display for ReceiveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.action, self.kind, self.id)
    }
}

/// 엔티티별 리포지토리 적용 규칙
#[async_trait]
pub trait ApplyReplication: ReplicationMessage {
    /// 메시지를 `action`에 맞는 리포지토리 연산으로 적용합니다.
    ///
    /// `received_at`은 메시지에 타임스탬프가 없을 때 사용됩니다.
    async fn apply(
        self,
        action: ReplicationAction,
        repository: &dyn CourseProgressRepository,
        received_at: DateTime<Utc>,
    ) -> AppResult<()>;
}

/// 소비 루프가 사용하는 수신자 인터페이스
///
/// 서로 다른 메시지 타입의 수신자를 하나의 컬렉션으로 다루기 위한 trait입니다.
#[async_trait]
pub trait ReplicationReceiver: Send + Sync {
    fn kind(&self) -> EntityKind;

    fn queue(&self) -> &str;

    /// 처리 불가능한 메시지를 보내는 큐. 비활성화되어 있으면 `None`
    fn dead_letter_queue(&self) -> Option<&str>;

    /// ACK 되지 않은 메시지를 다시 전달하기까지의 시간
    fn visibility_timeout(&self) -> Duration;

    /// 가시성 시간이 지난 in-flight 메시지를 큐에 되돌리고 그 수를 반환합니다.
    async fn requeue_expired(&self) -> AppResult<usize>;

    /// 메시지 하나를 받아 적용합니다. 호출당 최대 한 번의 변경만 일어납니다.
    async fn receive(&self, cancel: &CancellationToken) -> AppResult<ReceiveOutcome>;
}
