//! 레슨 메시지 적용 규칙
//!
//! 부모 모듈이 아직 복제되지 않은 레슨은 단독 문서로만 저장되고 ACK 됩니다.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;

use super::ApplyReplication;
use crate::domain::dto::events::{LessonMessage, ReplicationAction};
use crate::errors::AppResult;
use crate::repositories::courses::CourseProgressRepository;

#[async_trait]
impl ApplyReplication for LessonMessage {
    async fn apply(
        self,
        action: ReplicationAction,
        repository: &dyn CourseProgressRepository,
        received_at: DateTime<Utc>,
    ) -> AppResult<()> {
        match action {
            ReplicationAction::Create => {
                let module_id = self.module_id.clone();
                repository
                    .add_lesson(&module_id, self.into_document(received_at))
                    .await
            }
            ReplicationAction::Update => {
                repository
                    .update_lesson(self.into_document(received_at))
                    .await
            }
            ReplicationAction::Delete => {
                if !repository.delete_lesson(&self.id).await? {
                    debug!("[lesson] 이미 없는 레슨 삭제 id={}", self.id);
                }
                Ok(())
            }
        }
    }
}
