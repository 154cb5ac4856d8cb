//! 프로세스 내부 브로커
//!
//! 큐별로 대기 메시지와 in-flight 메시지를 관리합니다.
//! ACK 되지 않은 메시지는 `release_message`, 가시성 시간 초과(`requeue_expired`),
//! [`InMemoryBroker::requeue_in_flight`] 중 하나로 다시 대기열 앞에 놓입니다.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::{BrokerClient, ReceivedMessage};
use crate::errors::{AppError, AppResult};

struct InFlight {
    payload: Vec<u8>,
    received_at: Instant,
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<Vec<u8>>,
    in_flight: HashMap<String, InFlight>,
}

impl QueueState {
    /// 주어진 영수증들을 수신 순서대로 대기열 앞에 되돌립니다.
    fn requeue(&mut self, mut receipts: Vec<String>) -> usize {
        receipts.sort_by_key(|r| receipt_sequence(r));

        let mut requeued = 0;
        for receipt in receipts.iter().rev() {
            if let Some(message) = self.in_flight.remove(receipt) {
                self.ready.push_front(message.payload);
                requeued += 1;
            }
        }
        requeued
    }
}

#[derive(Default)]
pub struct InMemoryBroker {
    queues: Mutex<HashMap<String, QueueState>>,
    notify: Notify,
    next_receipt: AtomicU64,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, HashMap<String, QueueState>>> {
        self.queues
            .lock()
            .map_err(|_| AppError::BrokerError("in-memory broker lock poisoned".to_string()))
    }

    /// 큐에 메시지를 발행합니다.
    pub fn publish(&self, queue: &str, payload: impl Into<Vec<u8>>) -> AppResult<()> {
        self.lock()?
            .entry(queue.to_string())
            .or_default()
            .ready
            .push_back(payload.into());
        self.notify.notify_waiters();
        Ok(())
    }

    /// ACK 되지 않은 메시지를 대기열 앞으로 되돌립니다.
    pub fn requeue_in_flight(&self, queue: &str) -> AppResult<usize> {
        let requeued = {
            let mut queues = self.lock()?;
            let state = queues.entry(queue.to_string()).or_default();
            let receipts = state.in_flight.keys().cloned().collect();
            state.requeue(receipts)
        };

        self.notify.notify_waiters();
        Ok(requeued)
    }

    /// 대기 중인 메시지 수
    pub fn ready_len(&self, queue: &str) -> usize {
        self.lock()
            .map(|q| q.get(queue).map(|s| s.ready.len()).unwrap_or(0))
            .unwrap_or(0)
    }

    /// 수신되었지만 ACK 되지 않은 메시지 수
    pub fn in_flight_len(&self, queue: &str) -> usize {
        self.lock()
            .map(|q| q.get(queue).map(|s| s.in_flight.len()).unwrap_or(0))
            .unwrap_or(0)
    }

    /// 대기 중인 메시지 사본 (데드레터 확인용)
    pub fn ready_messages(&self, queue: &str) -> Vec<Vec<u8>> {
        self.lock()
            .map(|q| {
                q.get(queue)
                    .map(|s| s.ready.iter().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    fn try_take(&self, queue: &str) -> AppResult<Option<ReceivedMessage>> {
        let mut queues = self.lock()?;
        let state = queues.entry(queue.to_string()).or_default();

        let Some(payload) = state.ready.pop_front() else {
            return Ok(None);
        };

        let sequence = self.next_receipt.fetch_add(1, Ordering::Relaxed);
        let receipt = format!("{}#{}", queue, sequence);
        state.in_flight.insert(
            receipt.clone(),
            InFlight {
                payload: payload.clone(),
                received_at: Instant::now(),
            },
        );

        Ok(Some(ReceivedMessage { payload, receipt }))
    }
}

fn receipt_sequence(receipt: &str) -> u64 {
    receipt
        .rsplit('#')
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

#[async_trait]
impl BrokerClient for InMemoryBroker {
    async fn receive_message(&self, queue: &str, timeout: Duration) -> AppResult<ReceivedMessage> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            // notify_waiters()는 생성된 Notified에 바로 전달되므로 확인 전에 만든다
            let notified = self.notify.notified();

            if let Some(message) = self.try_take(queue)? {
                return Ok(message);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Err(AppError::Timeout(timeout));
            }
        }
    }

    async fn delete_message(&self, queue: &str, receipt: &str) -> AppResult<()> {
        if let Some(state) = self.lock()?.get_mut(queue) {
            state.in_flight.remove(receipt);
        }
        Ok(())
    }

    async fn release_message(&self, queue: &str, receipt: &str) -> AppResult<()> {
        let released = match self.lock()?.get_mut(queue) {
            Some(state) => state.requeue(vec![receipt.to_string()]),
            None => 0,
        };

        if released > 0 {
            self.notify.notify_waiters();
        }
        Ok(())
    }

    async fn requeue_expired(&self, queue: &str, visibility: Duration) -> AppResult<usize> {
        let requeued = match self.lock()?.get_mut(queue) {
            Some(state) => {
                let expired = state
                    .in_flight
                    .iter()
                    .filter(|(_, m)| m.received_at.elapsed() >= visibility)
                    .map(|(receipt, _)| receipt.clone())
                    .collect();
                state.requeue(expired)
            }
            None => 0,
        };

        if requeued > 0 {
            self.notify.notify_waiters();
        }
        Ok(requeued)
    }

    async fn send_message(&self, queue: &str, payload: &[u8]) -> AppResult<()> {
        self.publish(queue, payload.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_receive_then_ack() {
        let broker = InMemoryBroker::new();
        broker.publish("q", b"one".to_vec()).unwrap();

        let message = broker.receive_message("q", Duration::from_millis(50)).await.unwrap();
        assert_eq!(message.payload, b"one");
        assert_eq!(broker.ready_len("q"), 0);
        assert_eq!(broker.in_flight_len("q"), 1);

        broker.delete_message("q", &message.receipt).await.unwrap();
        assert_eq!(broker.in_flight_len("q"), 0);

        // 같은 영수증으로 다시 ACK 해도 에러가 아니다
        broker.delete_message("q", &message.receipt).await.unwrap();
    }

    #[tokio::test]
    async fn test_receive_times_out_on_empty_queue() {
        let broker = InMemoryBroker::new();
        let err = broker
            .receive_message("empty", Duration::from_millis(20))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::Timeout(Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn test_waiting_receiver_is_woken_by_publish() {
        let broker = Arc::new(InMemoryBroker::new());
        let waiter = {
            let broker = broker.clone();
            tokio::spawn(async move { broker.receive_message("q", Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        broker.publish("q", b"late".to_vec()).unwrap();

        let message = waiter.await.unwrap().unwrap();
        assert_eq!(message.payload, b"late");
    }

    #[tokio::test]
    async fn test_requeue_in_flight_keeps_fifo_order() {
        let broker = InMemoryBroker::new();
        broker.publish("q", b"first".to_vec()).unwrap();
        broker.publish("q", b"second".to_vec()).unwrap();
        broker.publish("q", b"third".to_vec()).unwrap();

        broker.receive_message("q", Duration::from_millis(10)).await.unwrap();
        broker.receive_message("q", Duration::from_millis(10)).await.unwrap();

        assert_eq!(broker.requeue_in_flight("q").unwrap(), 2);
        assert_eq!(
            broker.ready_messages("q"),
            vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]
        );
    }

    #[tokio::test]
    async fn test_released_message_is_received_again_first() {
        let broker = InMemoryBroker::new();
        broker.publish("q", b"first".to_vec()).unwrap();
        broker.publish("q", b"second".to_vec()).unwrap();

        let message = broker.receive_message("q", Duration::from_millis(10)).await.unwrap();
        broker.release_message("q", &message.receipt).await.unwrap();
        assert_eq!(broker.in_flight_len("q"), 0);

        // 되돌린 뒤 같은 영수증으로 ACK 나 반환을 해도 아무 일도 없다
        broker.release_message("q", &message.receipt).await.unwrap();
        broker.delete_message("q", &message.receipt).await.unwrap();
        assert_eq!(broker.ready_len("q"), 2);

        let again = broker.receive_message("q", Duration::from_millis(10)).await.unwrap();
        assert_eq!(again.payload, b"first");
        assert_ne!(again.receipt, message.receipt);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requeue_expired_returns_only_overdue_messages() {
        let broker = InMemoryBroker::new();
        broker.publish("q", b"old".to_vec()).unwrap();
        broker.publish("q", b"new".to_vec()).unwrap();

        broker.receive_message("q", Duration::from_millis(10)).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        broker.receive_message("q", Duration::from_millis(10)).await.unwrap();

        assert_eq!(broker.requeue_expired("q", Duration::from_secs(20)).await.unwrap(), 1);
        assert_eq!(broker.ready_messages("q"), vec![b"old".to_vec()]);
        assert_eq!(broker.in_flight_len("q"), 1);

        assert_eq!(broker.requeue_expired("missing", Duration::ZERO).await.unwrap(), 0);
    }
}
