//! 수강 서비스 카탈로그 복제 파이프라인
//!
//! 코스 서비스가 발행하는 코스/모듈/레슨 변경 이벤트를 큐에서 받아
//! 진도 추적용 비정규화 문서 저장소에 적용하는 소비자들입니다.
//!
//! # Features
//!
//! - **At-least-once 수신**: 적용에 성공한 뒤에만 ACK, 실패하면 브로커가 재전달
//! - **멱등 적용**: ID 기준 upsert/delete 로 중복, 순서 뒤바뀐 이벤트를 허용
//! - **이중 저장**: 모듈/레슨을 단독 문서와 부모 배열 양쪽에 유지
//! - **취소 가능한 수신**: `CancellationToken` 으로 대기 중인 수신을 즉시 중단
//! - **MongoDB**: `courses`, `modules`, `lessons` 컬렉션
//! - **Redis**: 리스트 기반 신뢰성 큐
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │    Consumer     │ ← 엔티티 종류별 소비 루프 (tokio 태스크)
//! └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    Receivers    │ ← 디코딩, 검증, 적용, ACK
//! └─────────────────┘
//!      │        │
//!      ▼        ▼
//! ┌────────┐ ┌──────────────┐
//! │ Broker │ │ Repositories │ ← 큐 / 코스 트리 읽기 모델
//! └────────┘ └──────────────┘
//!      │        │
//!      ▼        ▼
//! ┌─────────────────┐
//! │ Redis + MongoDB │ ← 저장소
//! └─────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use enrollment_replication::broker::InMemoryBroker;
//! use enrollment_replication::receivers::{CourseReceiver, ReplicationReceiver};
//! use enrollment_replication::repositories::courses::InMemoryCourseProgressRepository;
//!
//! let broker = Arc::new(InMemoryBroker::new());
//! let repository = Arc::new(InMemoryCourseProgressRepository::new());
//! let receiver = CourseReceiver::new("course-replication", broker, repository, Duration::from_secs(20));
//!
//! let outcome = receiver.receive(&CancellationToken::new()).await?;
//! ```

pub mod broker;
pub mod config;
pub mod consumer;
pub mod db;
pub mod domain;
pub mod errors;
pub mod receivers;
pub mod repositories;
pub mod utils;
