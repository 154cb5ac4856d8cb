//! 카탈로그 복제 서비스 메인 애플리케이션
//!
//! MongoDB, Redis 연결을 설정하고 코스/모듈/레슨 복제 소비자를 구동합니다.
//! Ctrl-C 를 받으면 모든 소비 루프를 취소하고 종료를 기다립니다.

use std::sync::Arc;

use dotenv::dotenv;
use env_logger::Env;
use log::{error, info};

use enrollment_replication::broker::{BrokerClient, RedisBroker};
use enrollment_replication::config::QueueConfig;
use enrollment_replication::consumer::ReplicationPipeline;
use enrollment_replication::db::Database;
use enrollment_replication::domain::dto::events::EntityKind;
use enrollment_replication::errors::AppResult;
use enrollment_replication::receivers::{
    CourseReceiver, LessonReceiver, ModuleReceiver, ReplicationReceiver,
};
use enrollment_replication::repositories::courses::{
    CourseProgressRepository, MongoCourseProgressRepository,
};
use enrollment_replication::utils::display_terminal::{
    print_boxed_title, print_final_summary, print_queue_binding, print_step_complete,
    print_step_start, print_sub_task,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    // 환경 설정 및 로깅 초기화
    load_env_file();
    init_logging();

    info!("🚀 카탈로그 복제 서비스 시작중...");

    if let Err(e) = run().await {
        error!("❌ 복제 서비스 비정상 종료: {}", e);
        std::process::exit(1);
    }

    info!("👋 카탈로그 복제 서비스 종료");
}

async fn run() -> AppResult<()> {
    print_boxed_title("Catalog Replication");

    QueueConfig::validate()?;

    let (repository, broker) = initialize_data_stores().await?;

    print_step_start(2, "Creating read model indexes");
    repository.create_indexes().await?;
    print_step_complete(2, "Indexes ready", 3);

    print_step_start(3, "Recovering unacknowledged messages");
    let mut recovered = 0;
    for kind in EntityKind::ALL {
        let queue = QueueConfig::queue_name(kind);
        let count = broker.recover_in_flight(&queue).await?;
        let pending = broker.queue_length(&queue).await?;
        print_sub_task(&queue, &format!("{} recovered, {} pending", count, pending));
        recovered += count;
    }
    print_step_complete(3, "In-flight messages recovered", recovered);

    print_step_start(4, "Binding receivers");
    let receivers = build_receivers(broker, repository);
    for receiver in &receivers {
        print_queue_binding(receiver.kind().as_str(), receiver.queue(), receiver.dead_letter_queue());
    }
    print_step_complete(4, "Receivers bound", receivers.len());

    let cancel = CancellationToken::new();
    let pipeline = ReplicationPipeline::spawn(receivers, cancel.clone(), QueueConfig::error_backoff());

    print_final_summary(
        pipeline.len(),
        recovered,
        QueueConfig::receive_timeout().as_secs(),
    );

    wait_for_shutdown().await;

    info!("🛑 종료 신호 수신, 소비자 정리중...");
    cancel.cancel();

    for (kind, stats) in pipeline.join().await {
        info!(
            "📊 [{}] applied={} rejected={} failed={} timeouts={} requeued={}",
            kind, stats.applied, stats.rejected, stats.failed, stats.timeouts, stats.requeued
        );
    }

    Ok(())
}

/// 환경별 설정 파일을 로드합니다
///
/// # Environment Variables
///
/// * `PROFILE=dev` - .env.dev 파일 로드 (기본값)
/// * `PROFILE=prod` - .env.prod 파일 로드
/// * 기타 - 기본 .env 파일 로드
///
/// ```bash
/// PROFILE=prod cargo run
/// ```
fn load_env_file() {
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "dev".to_string());

    info!("Current profile: {}", profile);

    match profile.as_str() {
        "prod" => match dotenv::from_filename(".env.prod") {
            Ok(_) => info!(".env.prod 파일 로드 됨"),
            Err(e) => error!(".env.prod 파일 로드 실패: {}", e),
        },
        "dev" => match dotenv::from_filename(".env.dev") {
            Ok(_) => info!(".env.dev 파일 로드 됨"),
            Err(e) => error!(".env.dev 파일 로드 실패: {}", e),
        },
        _ => {
            dotenv().ok();
            info!("기본 .env 파일 로드");
        }
    }
}

/// 로깅 시스템을 초기화합니다
///
/// `RUST_LOG` 가 없으면 info 레벨을 사용합니다.
///
/// ```bash
/// # 타임아웃까지 보려면
/// RUST_LOG=enrollment_replication=debug cargo run
/// ```
fn init_logging() {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
}

/// MongoDB 리포지토리와 Redis 브로커를 초기화합니다
async fn initialize_data_stores() -> AppResult<(Arc<MongoCourseProgressRepository>, Arc<RedisBroker>)> {
    print_step_start(1, "Connecting data stores");
    info!("📡 데이터베이스 연결 중...");

    let database = Arc::new(Database::new().await?);
    print_sub_task("MongoDB", database.database_name());

    let broker = Arc::new(RedisBroker::new().await?);
    print_sub_task("Redis", "Connected");

    print_step_complete(1, "Data stores connected", 2);

    Ok((Arc::new(MongoCourseProgressRepository::new(database)), broker))
}

fn build_receivers(
    broker: Arc<RedisBroker>,
    repository: Arc<MongoCourseProgressRepository>,
) -> Vec<Arc<dyn ReplicationReceiver>> {
    let broker: Arc<dyn BrokerClient> = broker;
    let repository: Arc<dyn CourseProgressRepository> = repository;

    let courses: Arc<dyn ReplicationReceiver> =
        Arc::new(CourseReceiver::from_config(broker.clone(), repository.clone()));
    let modules: Arc<dyn ReplicationReceiver> =
        Arc::new(ModuleReceiver::from_config(broker.clone(), repository.clone()));
    let lessons: Arc<dyn ReplicationReceiver> =
        Arc::new(LessonReceiver::from_config(broker, repository));

    vec![courses, modules, lessons]
}

async fn wait_for_shutdown() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("종료 신호 대기 실패: {}", e);
    }
}
