//! 복제 소비 루프
//!
//! 엔티티 종류별 수신자 하나당 tokio 태스크 하나를 띄워 종료 신호가 올 때까지
//! `receive`를 반복 호출합니다. 어떤 에러도 루프를 멈추지 않습니다.
//!
//! | 결과 | 동작 |
//! |------|------|
//! | `Ok` | 바로 다음 수신 |
//! | `Timeout` | debug 로그 후 바로 다음 수신 |
//! | `Cancelled` | 루프 종료 |
//! | 그 외 에러 | 백오프 후 다음 수신 (백오프 중에도 취소 가능) |
//!
//! 적용에 실패한 메시지는 수신자가 큐에 되돌리므로 백오프 뒤 다시 수신됩니다.
//! 반환하지 못한 메시지는 가시성 시간마다 도는 만료 검사가 되돌립니다.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use log::{debug, error, info, warn};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::domain::dto::events::EntityKind;
use crate::errors::AppError;
use crate::receivers::ReplicationReceiver;

/// 소비 루프 하나의 처리 통계
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumerStats {
    pub applied: u64,
    pub rejected: u64,
    pub failed: u64,
    pub timeouts: u64,
    /// 가시성 시간 초과로 큐에 되돌린 메시지 수
    pub requeued: u64,
}

/// 수신자 하나를 취소될 때까지 반복 실행합니다.
pub async fn run_consumer(
    receiver: Arc<dyn ReplicationReceiver>,
    cancel: CancellationToken,
    error_backoff: Duration,
) -> ConsumerStats {
    let kind = receiver.kind();
    let mut stats = ConsumerStats::default();

    info!("▶️ [{}] 소비 시작 queue={}", kind, receiver.queue());

    let mut last_sweep = Instant::now();

    loop {
        if last_sweep.elapsed() >= receiver.visibility_timeout() {
            match receiver.requeue_expired().await {
                Ok(count) => stats.requeued += count as u64,
                Err(e) => warn!("⚠️ [{}] 만료 메시지 재전달 실패 queue={}: {}", kind, receiver.queue(), e),
            }
            last_sweep = Instant::now();
        }

        match receiver.receive(&cancel).await {
            Ok(_) => stats.applied += 1,
            Err(AppError::Cancelled) => break,
            Err(AppError::Timeout(waited)) => {
                stats.timeouts += 1;
                debug!("[{}] {:?} 동안 메시지 없음 queue={}", kind, waited, receiver.queue());
            }
            Err(e) => {
                if e.is_unprocessable() {
                    stats.rejected += 1;
                } else if e.is_transport() {
                    stats.failed += 1;
                    warn!("⚠️ [{}] 브로커 수신 실패 queue={}: {}", kind, receiver.queue(), e);
                } else {
                    stats.failed += 1;
                    error!("❌ [{}] 메시지 처리 실패 queue={}: {}", kind, receiver.queue(), e);
                }

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(error_backoff) => {}
                }
            }
        }

        if cancel.is_cancelled() {
            break;
        }
    }

    info!(
        "⏹️ [{}] 소비 종료 queue={} applied={} rejected={} failed={} requeued={}",
        kind,
        receiver.queue(),
        stats.applied,
        stats.rejected,
        stats.failed,
        stats.requeued
    );

    stats
}

/// 엔티티 종류별 소비 태스크 묶음
pub struct ReplicationPipeline {
    cancel: CancellationToken,
    handles: Vec<(EntityKind, JoinHandle<ConsumerStats>)>,
}

impl ReplicationPipeline {
    /// 수신자마다 소비 태스크를 띄웁니다.
    pub fn spawn(
        receivers: Vec<Arc<dyn ReplicationReceiver>>,
        cancel: CancellationToken,
        error_backoff: Duration,
    ) -> Self {
        let handles = receivers
            .into_iter()
            .map(|receiver| {
                let kind = receiver.kind();
                let handle = tokio::spawn(run_consumer(receiver, cancel.clone(), error_backoff));
                (kind, handle)
            })
            .collect();

        Self { cancel, handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// 모든 소비 루프에 종료를 알립니다.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// 모든 소비 태스크가 끝날 때까지 기다립니다.
    pub async fn join(self) -> Vec<(EntityKind, ConsumerStats)> {
        let (kinds, handles): (Vec<_>, Vec<_>) = self.handles.into_iter().unzip();

        kinds
            .into_iter()
            .zip(join_all(handles).await)
            .filter_map(|(kind, joined)| match joined {
                Ok(stats) => Some((kind, stats)),
                Err(e) => {
                    error!("❌ [{}] 소비 태스크 비정상 종료: {}", kind, e);
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{BrokerClient, InMemoryBroker};
    use crate::domain::dto::events::{CourseMessage, LessonMessage, ModuleMessage};
    use crate::domain::entities::{CourseDocument, LessonDocument, ModuleDocument};
    use crate::errors::AppResult;
    use crate::receivers::EntityReceiver;
    use crate::repositories::courses::{
        CoursePage, CourseProgressRepository, InMemoryCourseProgressRepository,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const COURSE_ID: &str = "6f1c2a2e-1d7b-4a39-9a57-3f0f2b7b9c11";
    const MODULE_ID: &str = "a3c5e9b0-52a4-4d3e-8a61-7d1f6f0c2b22";
    const LESSON_ID: &str = "c5e7a1d2-74c6-4f5a-8c83-9f3b8b2e4d44";

    fn receivers(
        broker: &Arc<InMemoryBroker>,
        repository: &Arc<InMemoryCourseProgressRepository>,
    ) -> Vec<Arc<dyn ReplicationReceiver>> {
        let timeout = Duration::from_millis(20);
        let courses: Arc<dyn ReplicationReceiver> = Arc::new(EntityReceiver::<CourseMessage>::new(
            "courses", broker.clone(), repository.clone(), timeout,
        ));
        let modules: Arc<dyn ReplicationReceiver> = Arc::new(EntityReceiver::<ModuleMessage>::new(
            "modules", broker.clone(), repository.clone(), timeout,
        ));
        let lessons: Arc<dyn ReplicationReceiver> = Arc::new(EntityReceiver::<LessonMessage>::new(
            "lessons", broker.clone(), repository.clone(), timeout,
        ));
        vec![courses, modules, lessons]
    }

    async fn wait_for_counts(repository: &InMemoryCourseProgressRepository, expected: (usize, usize, usize)) {
        for _ in 0..200 {
            if repository.counts().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("repository never reached {:?}", expected);
    }

    #[tokio::test]
    async fn test_pipeline_applies_all_kinds_until_shutdown() {
        let broker = Arc::new(InMemoryBroker::new());
        let repository = Arc::new(InMemoryCourseProgressRepository::new());

        let pipeline = ReplicationPipeline::spawn(
            receivers(&broker, &repository),
            CancellationToken::new(),
            Duration::from_millis(10),
        );
        assert_eq!(pipeline.len(), 3);

        broker
            .publish("courses", serde_json::to_vec(&json!({
                "action": "CREATE",
                "data": { "_id": COURSE_ID, "name": "Go Basics" }
            })).unwrap())
            .unwrap();
        wait_for_counts(&repository, (1, 0, 0)).await;

        broker
            .publish("modules", serde_json::to_vec(&json!({
                "action": "CREATE",
                "data": { "_id": MODULE_ID, "course_id": COURSE_ID, "title": "Intro", "order_number": 1 }
            })).unwrap())
            .unwrap();
        wait_for_counts(&repository, (1, 1, 0)).await;

        broker
            .publish("lessons", serde_json::to_vec(&json!({
                "action": "CREATE",
                "data": { "_id": LESSON_ID, "module_id": MODULE_ID, "title": "Hello", "order_number": 1 }
            })).unwrap())
            .unwrap();
        wait_for_counts(&repository, (1, 1, 1)).await;

        pipeline.shutdown();
        let stats = pipeline.join().await;

        assert_eq!(stats.len(), 3);
        assert!(stats.iter().all(|(_, s)| s.applied == 1 && s.failed == 0));

        let course = repository.find_by_id(COURSE_ID).await.unwrap().unwrap();
        assert_eq!(course.module(MODULE_ID).unwrap().lessons.len(), 1);
    }

    #[tokio::test]
    async fn test_bad_message_does_not_stop_consumer() {
        let broker = Arc::new(InMemoryBroker::new());
        let repository = Arc::new(InMemoryCourseProgressRepository::new());
        let cancel = CancellationToken::new();

        let receiver: Arc<dyn ReplicationReceiver> = Arc::new(EntityReceiver::<CourseMessage>::new(
            "courses",
            broker.clone(),
            repository.clone(),
            Duration::from_millis(20),
        ));
        let consumer = tokio::spawn(run_consumer(receiver, cancel.clone(), Duration::from_millis(5)));

        broker.publish("courses", b"{broken".to_vec()).unwrap();
        broker
            .publish("courses", serde_json::to_vec(&json!({
                "action": "CREATE",
                "data": { "_id": COURSE_ID, "name": "Go Basics" }
            })).unwrap())
            .unwrap();
        wait_for_counts(&repository, (1, 0, 0)).await;

        cancel.cancel();
        let stats = consumer.await.unwrap();

        assert_eq!(stats.applied, 1);
        assert_eq!(stats.rejected, 1);
    }

    /// 처음 `outages`번의 코스 저장만 실패하는 저장소
    struct FlakyRepository {
        inner: InMemoryCourseProgressRepository,
        outages: AtomicUsize,
    }

    impl FlakyRepository {
        fn new(outages: usize) -> Self {
            Self {
                inner: InMemoryCourseProgressRepository::new(),
                outages: AtomicUsize::new(outages),
            }
        }
    }

    #[async_trait]
    impl CourseProgressRepository for FlakyRepository {
        async fn save(&self, course: CourseDocument) -> AppResult<()> {
            let down = self
                .outages
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if down {
                return Err(AppError::DatabaseError("connection reset".to_string()));
            }
            self.inner.save(course).await
        }
        async fn update(&self, c: CourseDocument) -> AppResult<()> { self.inner.update(c).await }
        async fn delete(&self, id: &str) -> AppResult<bool> { self.inner.delete(id).await }
        async fn add_module(&self, id: &str, m: ModuleDocument) -> AppResult<()> { self.inner.add_module(id, m).await }
        async fn update_module(&self, m: ModuleDocument) -> AppResult<()> { self.inner.update_module(m).await }
        async fn delete_module(&self, id: &str) -> AppResult<bool> { self.inner.delete_module(id).await }
        async fn add_lesson(&self, id: &str, l: LessonDocument) -> AppResult<()> { self.inner.add_lesson(id, l).await }
        async fn update_lesson(&self, l: LessonDocument) -> AppResult<()> { self.inner.update_lesson(l).await }
        async fn delete_lesson(&self, id: &str) -> AppResult<bool> { self.inner.delete_lesson(id).await }
        async fn find_by_id(&self, id: &str) -> AppResult<Option<CourseDocument>> { self.inner.find_by_id(id).await }
        async fn find_all(&self, p: u64, l: u64) -> AppResult<CoursePage> { self.inner.find_all(p, l).await }
        async fn find_by_instructor(&self, v: &str) -> AppResult<Vec<CourseDocument>> { self.inner.find_by_instructor(v).await }
        async fn find_by_category(&self, v: &str) -> AppResult<Vec<CourseDocument>> { self.inner.find_by_category(v).await }
        async fn find_by_level(&self, v: &str) -> AppResult<Vec<CourseDocument>> { self.inner.find_by_level(v).await }
        async fn find_module_by_id(&self, id: &str) -> AppResult<Option<ModuleDocument>> { self.inner.find_module_by_id(id).await }
        async fn find_lesson_by_id(&self, id: &str) -> AppResult<Option<LessonDocument>> { self.inner.find_lesson_by_id(id).await }
        async fn find_modules_by_course(&self, id: &str) -> AppResult<Vec<ModuleDocument>> { self.inner.find_modules_by_course(id).await }
        async fn find_lessons_by_module(&self, id: &str) -> AppResult<Vec<LessonDocument>> { self.inner.find_lessons_by_module(id).await }
    }

    #[tokio::test]
    async fn test_failed_message_is_applied_after_repository_recovers() {
        let broker = Arc::new(InMemoryBroker::new());
        let repository = Arc::new(FlakyRepository::new(2));
        let cancel = CancellationToken::new();

        let receiver: Arc<dyn ReplicationReceiver> = Arc::new(EntityReceiver::<CourseMessage>::new(
            "courses",
            broker.clone(),
            repository.clone(),
            Duration::from_millis(20),
        ));
        let consumer = tokio::spawn(run_consumer(receiver, cancel.clone(), Duration::from_millis(5)));

        broker
            .publish("courses", serde_json::to_vec(&json!({
                "action": "CREATE",
                "data": { "_id": COURSE_ID, "name": "Go Basics" }
            })).unwrap())
            .unwrap();
        wait_for_counts(&repository.inner, (1, 0, 0)).await;

        cancel.cancel();
        let stats = consumer.await.unwrap();

        assert_eq!(stats.failed, 2);
        assert_eq!(stats.applied, 1);
        assert_eq!(broker.ready_len("courses"), 0);
        assert_eq!(broker.in_flight_len("courses"), 0);
    }

    #[tokio::test]
    async fn test_consumer_requeues_messages_past_visibility_timeout() {
        let broker = Arc::new(InMemoryBroker::new());
        let repository = Arc::new(InMemoryCourseProgressRepository::new());
        let cancel = CancellationToken::new();

        // 다른 소비자가 가져간 뒤 ACK 도 반환도 하지 못한 메시지
        broker
            .publish("courses", serde_json::to_vec(&json!({
                "action": "CREATE",
                "data": { "_id": COURSE_ID, "name": "Go Basics" }
            })).unwrap())
            .unwrap();
        broker.receive_message("courses", Duration::from_millis(10)).await.unwrap();
        assert_eq!(broker.in_flight_len("courses"), 1);

        let receiver: Arc<dyn ReplicationReceiver> = Arc::new(
            EntityReceiver::<CourseMessage>::new("courses", broker.clone(), repository.clone(), Duration::from_millis(20))
                .with_visibility_timeout(Duration::from_millis(50)),
        );
        let consumer = tokio::spawn(run_consumer(receiver, cancel.clone(), Duration::from_millis(5)));

        wait_for_counts(&repository, (1, 0, 0)).await;

        cancel.cancel();
        let stats = consumer.await.unwrap();

        assert_eq!(stats.requeued, 1);
        assert_eq!(stats.applied, 1);
        assert_eq!(broker.in_flight_len("courses"), 0);
    }
}
