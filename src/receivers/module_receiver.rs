//! 모듈 메시지 적용 규칙

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;

use super::ApplyReplication;
use crate::domain::dto::events::{ModuleMessage, ReplicationAction};
use crate::errors::AppResult;
use crate::repositories::courses::CourseProgressRepository;

#[async_trait]
impl ApplyReplication for ModuleMessage {
    async fn apply(
        self,
        action: ReplicationAction,
        repository: &dyn CourseProgressRepository,
        received_at: DateTime<Utc>,
    ) -> AppResult<()> {
        match action {
            ReplicationAction::Create => {
                let course_id = self.course_id.clone();
                repository
                    .add_module(&course_id, self.into_document(received_at))
                    .await
            }
            ReplicationAction::Update => {
                repository
                    .update_module(self.into_document(received_at))
                    .await
            }
            ReplicationAction::Delete => {
                if !repository.delete_module(&self.id).await? {
                    debug!("[module] 이미 없는 모듈 삭제 id={}", self.id);
                }
                Ok(())
            }
        }
    }
}
