// Outbox relay worker
//
// Drains due outbox messages through the configured Notifier. A failed
// delivery is rescheduled with exponential backoff until the attempt
// cap, then parked as failed for an operator to inspect. Delivery is
// at-least-once: a crash between notify and mark_delivered means one
// extra send, never a lost one.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use backend_application::AppState;

/// One drain pass. Returns how many messages were delivered.
pub async fn deliver_due_once(state: &AppState) -> anyhow::Result<usize> {
    let due = state
        .outbox_repo
        .fetch_due(Utc::now(), state.config.outbox_batch_limit)
        .await?;
    let mut delivered = 0usize;

    for message in due {
        match state
            .notifier
            .notify(&message.recipient, &message.template, &message.payload)
            .await
        {
            Ok(()) => {
                state.outbox_repo.mark_delivered(message.id, Utc::now()).await?;
                state.metrics.record_outbox_delivered();
                delivered += 1;
            }
            Err(err) => {
                let attempt = message.attempts + 1;
                let retry_at = if attempt >= state.config.outbox_max_attempts {
                    warn!(
                        "outbox message {} parked after {} attempts: {}",
                        message.id, attempt, err
                    );
                    None
                } else {
                    debug!(
                        "outbox message {} delivery attempt {} failed: {}",
                        message.id, attempt, err
                    );
                    Some(Utc::now() + backoff(state.config.outbox_retry_base_seconds, attempt))
                };
                state
                    .outbox_repo
                    .mark_failed(message.id, &err.to_string(), retry_at)
                    .await?;
                state.metrics.record_outbox_failed();
            }
        }
    }

    Ok(delivered)
}

/// base * 2^(attempt-1), capped at an hour.
fn backoff(base_seconds: u64, attempt: i32) -> chrono::Duration {
    let exponent = attempt.saturating_sub(1).clamp(0, 16) as u32;
    let seconds = base_seconds
        .max(1)
        .saturating_mul(1u64 << exponent)
        .min(3600);
    chrono::Duration::seconds(seconds as i64)
}

pub fn spawn_outbox_relay(
    state: AppState,
    mut shutdown_rx: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(state.config.outbox_poll_seconds.max(1)));
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(err) = deliver_due_once(&state).await {
                        warn!("outbox relay pass failed: {}", err);
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    use backend_application::Metrics;
    use backend_domain::ports::Notifier;
    use backend_domain::services::QrCodec;
    use backend_domain::OutboxMessage;

    use crate::config::AppConfig;
    use crate::repositories::InMemoryStore;

    use super::*;

    /// Fails the first `failures` deliveries, then succeeds.
    struct FlakyNotifier {
        failures: AtomicU32,
    }

    impl FlakyNotifier {
        fn new(failures: u32) -> Self {
            Self {
                failures: AtomicU32::new(failures),
            }
        }
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn notify(
            &self,
            _recipient: &str,
            _template: &str,
            _payload: &serde_json::Value,
        ) -> anyhow::Result<()> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                anyhow::bail!("simulated delivery failure");
            }
            Ok(())
        }
    }

    fn relay_state(notifier: Arc<dyn Notifier>) -> AppState {
        let store = Arc::new(InMemoryStore::new());
        AppState {
            config: AppConfig::default().to_runtime_config(),
            order_repo: store.clone(),
            payment_repo: store.clone(),
            ticket_repo: store.clone(),
            validation_repo: store.clone(),
            outbox_repo: store,
            providers: Arc::new(Vec::new()),
            notifier,
            qr_codec: Arc::new(QrCodec::new("relay-test-secret", 12).expect("codec")),
            metrics: Arc::new(Metrics::default()),
        }
    }

    async fn enqueue(state: &AppState) -> OutboxMessage {
        let message = OutboxMessage::new(
            "ada@example.com",
            "ticket-issued",
            serde_json::json!({"ticket_number": "TKT-RELAY"}),
        );
        state.outbox_repo.enqueue(&message).await.expect("enqueue");
        message
    }

    #[tokio::test]
    async fn delivers_due_messages_and_marks_them() {
        let state = relay_state(Arc::new(FlakyNotifier::new(0)));
        enqueue(&state).await;

        let delivered = deliver_due_once(&state).await.expect("drain");
        assert_eq!(delivered, 1);

        let due = state
            .outbox_repo
            .fetch_due(Utc::now() + ChronoDuration::hours(1), 10)
            .await
            .expect("fetch");
        assert!(due.is_empty());
        // A second pass has nothing to do.
        assert_eq!(deliver_due_once(&state).await.expect("drain"), 0);
    }

    #[tokio::test]
    async fn failed_delivery_backs_off_then_succeeds() {
        let state = relay_state(Arc::new(FlakyNotifier::new(1)));
        enqueue(&state).await;

        assert_eq!(deliver_due_once(&state).await.expect("first pass"), 0);

        // Rescheduled into the future, so an immediate pass sees nothing.
        assert!(state
            .outbox_repo
            .fetch_due(Utc::now(), 10)
            .await
            .expect("fetch")
            .is_empty());

        let base = state.config.outbox_retry_base_seconds;
        let retried = state
            .outbox_repo
            .fetch_due(Utc::now() + ChronoDuration::seconds(base as i64 + 1), 10)
            .await
            .expect("fetch");
        assert_eq!(retried.len(), 1);
        assert_eq!(retried[0].attempts, 1);

        // Force the message due again and drain; this time it goes out.
        state
            .outbox_repo
            .mark_failed(retried[0].id, "still down", Some(Utc::now()))
            .await
            .expect("reschedule");
        assert_eq!(deliver_due_once(&state).await.expect("second pass"), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_park_the_message() {
        let state = relay_state(Arc::new(FlakyNotifier::new(u32::MAX)));
        let message = enqueue(&state).await;

        for _ in 0..state.config.outbox_max_attempts {
            // Make it due regardless of the backoff schedule.
            state
                .outbox_repo
                .mark_failed(message.id, "seed", Some(Utc::now()))
                .await
                .expect("make due");
            deliver_due_once(&state).await.expect("pass");
        }

        // Parked: not due even far in the future.
        let due = state
            .outbox_repo
            .fetch_due(Utc::now() + ChronoDuration::days(365), 10)
            .await
            .expect("fetch");
        assert!(due.is_empty());
    }

    #[tokio::test]
    async fn relay_loop_stops_on_shutdown() {
        let state = relay_state(Arc::new(FlakyNotifier::new(0)));
        enqueue(&state).await;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = spawn_outbox_relay(state.clone(), shutdown_rx);

        // The first tick fires immediately; give it a moment to drain.
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(()).expect("signal shutdown");
        handle.await.expect("join relay");

        let remaining = state
            .outbox_repo
            .fetch_due(Utc::now() + ChronoDuration::hours(1), 10)
            .await
            .expect("fetch");
        assert!(remaining.is_empty());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff(30, 1), ChronoDuration::seconds(30));
        assert_eq!(backoff(30, 2), ChronoDuration::seconds(60));
        assert_eq!(backoff(30, 3), ChronoDuration::seconds(120));
        assert_eq!(backoff(30, 12), ChronoDuration::seconds(3600));
        assert_eq!(backoff(0, 1), ChronoDuration::seconds(1));
    }
}
