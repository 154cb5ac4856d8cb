//! # Redis 브로커 구현
//!
//! Redis 리스트를 사용한 신뢰성 큐(reliable queue) 패턴 구현입니다.
//!
//! ## 키 구조
//!
//! - `{queue}` - 대기 중인 메시지 (발행자는 `LPUSH`)
//! - `{queue}:processing` - 수신되었지만 ACK 되지 않은 메시지
//! - `{queue}:received` - in-flight 메시지의 수신 시각 (sorted set, ms)
//!
//! ## 동작
//!
//! - **수신**: `BLMOVE {queue} {queue}:processing RIGHT LEFT timeout` 후 `ZADD {queue}:received`
//! - **ACK**: processing 에서 `LREM`, 같은 페이로드가 더 없으면 `ZREM`
//! - **반환**: processing 에서 꺼내 큐의 수신 쪽 끝(`RPUSH`)에 되돌림. 바로 다시 수신됩니다
//! - **만료 재전달**: 수신 후 가시성 시간이 지난 메시지를 같은 방식으로 되돌림
//! - **시작 복구**: [`RedisBroker::recover_in_flight`]가 processing 리스트 전체를 원래 큐로 되돌림
//!
//! 영수증(receipt)은 in-flight 페이로드 자체입니다. 반환과 ACK 는 Lua 스크립트로
//! 원자적으로 수행되므로 같은 메시지가 두 번 되돌아가지 않습니다.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use redis::{AsyncCommands, Client, Script};

use super::{BrokerClient, ReceivedMessage};
use crate::config::BrokerConfig;
use crate::errors::{AppError, AppResult};

/// KEYS: processing, received / ARGV: receipt
const ACK_SCRIPT: &str = r#"
    local removed = redis.call('LREM', KEYS[1], 1, ARGV[1])
    if not redis.call('LPOS', KEYS[1], ARGV[1]) then
        redis.call('ZREM', KEYS[2], ARGV[1])
    end
    return removed
"#;

/// KEYS: queue, processing, received / ARGV: receipt
const RELEASE_SCRIPT: &str = r#"
    local removed = redis.call('LREM', KEYS[2], 1, ARGV[1])
    if removed > 0 then
        redis.call('RPUSH', KEYS[1], ARGV[1])
    end
    if not redis.call('LPOS', KEYS[2], ARGV[1]) then
        redis.call('ZREM', KEYS[3], ARGV[1])
    end
    return removed
"#;

#[derive(Clone)]
pub struct RedisBroker {
    client: Client,
}

impl RedisBroker {
    /// 설정의 `REDIS_URL`로 연결합니다.
    pub async fn new() -> AppResult<Self> {
        Self::connect(&BrokerConfig::redis_url()).await
    }

    pub async fn connect(redis_url: &str) -> AppResult<Self> {
        let client = Client::open(redis_url)?;

        // 연결 테스트 - PING 명령으로 서버 가용성 확인
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;

        info!("✅ Redis 브로커 연결 성공");

        Ok(Self { client })
    }

    fn processing_key(queue: &str) -> String {
        format!("{}:processing", queue)
    }

    fn received_key(queue: &str) -> String {
        format!("{}:received", queue)
    }

    /// ACK 되지 않은 메시지를 원래 큐로 되돌립니다.
    ///
    /// 가장 오래된 메시지가 먼저 다시 수신되도록 이동합니다.
    /// 되돌린 메시지 수를 반환합니다.
    pub async fn recover_in_flight(&self, queue: &str) -> AppResult<usize> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let processing = Self::processing_key(queue);
        let mut recovered = 0;

        loop {
            let moved: Option<String> = redis::cmd("LMOVE")
                .arg(&processing)
                .arg(queue)
                .arg("LEFT")
                .arg("RIGHT")
                .query_async(&mut conn)
                .await?;

            match moved {
                Some(_) => recovered += 1,
                None => break,
            }
        }

        let _: usize = conn.del(Self::received_key(queue)).await?;

        if recovered > 0 {
            info!("♻️ queue={} in-flight 메시지 {}건 복구", queue, recovered);
        }

        Ok(recovered)
    }

    /// 대기 중인 메시지 수
    pub async fn queue_length(&self, queue: &str) -> AppResult<usize> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn.llen(queue).await?)
    }

    async fn release(&self, queue: &str, receipt: &str) -> AppResult<usize> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let released: usize = Script::new(RELEASE_SCRIPT)
            .key(queue)
            .key(Self::processing_key(queue))
            .key(Self::received_key(queue))
            .arg(receipt)
            .invoke_async(&mut conn)
            .await?;

        Ok(released)
    }
}

#[async_trait]
impl BrokerClient for RedisBroker {
    async fn receive_message(&self, queue: &str, timeout: Duration) -> AppResult<ReceivedMessage> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        // BLMOVE의 timeout 0은 무한 대기이므로 최소값을 둔다
        let timeout_secs = timeout.as_secs_f64().max(0.01);

        let payload: Option<String> = redis::cmd("BLMOVE")
            .arg(queue)
            .arg(Self::processing_key(queue))
            .arg("RIGHT")
            .arg("LEFT")
            .arg(timeout_secs)
            .query_async(&mut conn)
            .await?;

        let Some(payload) = payload else {
            return Err(AppError::Timeout(timeout));
        };

        // 기록에 실패해도 메시지는 processing 에 있으므로 시작 복구 대상으로 남는다
        let stamped: redis::RedisResult<usize> = conn
            .zadd(Self::received_key(queue), &payload, Utc::now().timestamp_millis())
            .await;
        if let Err(e) = stamped {
            warn!("⚠️ queue={} 수신 시각 기록 실패: {}", queue, e);
        }

        debug!("queue={} 메시지 수신 ({} bytes)", queue, payload.len());
        Ok(ReceivedMessage {
            payload: payload.clone().into_bytes(),
            receipt: payload,
        })
    }

    async fn delete_message(&self, queue: &str, receipt: &str) -> AppResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let removed: usize = Script::new(ACK_SCRIPT)
            .key(Self::processing_key(queue))
            .key(Self::received_key(queue))
            .arg(receipt)
            .invoke_async(&mut conn)
            .await?;

        if removed == 0 {
            debug!("queue={} 이미 ACK 되었거나 복구된 메시지", queue);
        }

        Ok(())
    }

    async fn release_message(&self, queue: &str, receipt: &str) -> AppResult<()> {
        if self.release(queue, receipt).await? == 0 {
            debug!("queue={} 이미 ACK 되었거나 되돌려진 메시지", queue);
        }
        Ok(())
    }

    async fn requeue_expired(&self, queue: &str, visibility: Duration) -> AppResult<usize> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let cutoff = Utc::now().timestamp_millis() - visibility.as_millis() as i64;
        let expired: Vec<String> = conn
            .zrangebyscore(Self::received_key(queue), "-inf", cutoff)
            .await?;

        let mut requeued = 0;
        for receipt in &expired {
            requeued += self.release(queue, receipt).await?;
        }

        if requeued > 0 {
            info!("♻️ queue={} 가시성 시간 초과 메시지 {}건 재전달", queue, requeued);
        }

        Ok(requeued)
    }

    async fn send_message(&self, queue: &str, payload: &[u8]) -> AppResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: usize = conn.lpush(queue, payload).await?;
        Ok(())
    }
}
