//! 코스 메시지 적용 규칙
//!
//! | action | 리포지토리 연산 |
//! |--------|-----------------|
//! | CREATE | `save` |
//! | UPDATE | `update` |
//! | DELETE | `delete` (코스와 모듈, 레슨은 남음) |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;

use super::ApplyReplication;
use crate::domain::dto::events::{CourseMessage, ReplicationAction};
use crate::errors::AppResult;
use crate::repositories::courses::CourseProgressRepository;

#[async_trait]
impl ApplyReplication for CourseMessage {
    async fn apply(
        self,
        action: ReplicationAction,
        repository: &dyn CourseProgressRepository,
        received_at: DateTime<Utc>,
    ) -> AppResult<()> {
        match action {
            ReplicationAction::Create => repository.save(self.into_document(received_at)).await,
            ReplicationAction::Update => repository.update(self.into_document(received_at)).await,
            ReplicationAction::Delete => {
                if !repository.delete(&self.id).await? {
                    debug!("[course] 이미 없는 코스 삭제 id={}", self.id);
                }
                Ok(())
            }
        }
    }
}
