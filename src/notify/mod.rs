//! Outbound notifications. Best effort: callers log failures and move on.

pub mod webhook;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::models::order::{Order, OrderEvent};

pub use webhook::{Backoff, BackoffPolicy, WebhookNotifier};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),

    #[error("notification endpoint responded with status {0}")]
    Status(u16),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_order_created(&self, order: &Order) -> Result<(), NotifyError>;

    fn name(&self) -> &'static str;
}

/// Publishes on the in-process event channel that feeds `/ws`.
pub struct ChannelNotifier {
    events_tx: broadcast::Sender<OrderEvent>,
}

impl ChannelNotifier {
    pub fn new(events_tx: broadcast::Sender<OrderEvent>) -> Self {
        Self { events_tx }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify_order_created(&self, order: &Order) -> Result<(), NotifyError> {
        // No subscribers is not a failure.
        let _ = self.events_tx.send(OrderEvent::created(order));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

/// Calls every notifier; reports the first failure after all have run.
pub struct FanoutNotifier {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn notify_order_created(&self, order: &Order) -> Result<(), NotifyError> {
        let mut first_error = None;

        for notifier in &self.notifiers {
            if let Err(err) = notifier.notify_order_created(order).await {
                tracing::warn!(
                    notifier = notifier.name(),
                    order_id = %order.id,
                    error = %err,
                    "notifier failed"
                );
                first_error.get_or_insert(err);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    fn name(&self) -> &'static str {
        "fanout"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::broadcast;

    use super::{ChannelNotifier, FanoutNotifier, Notifier, NotifyError};
    use crate::models::order::{Order, OrderState};
    use crate::test_support::sample_order;

    struct Failing;

    #[async_trait]
    impl Notifier for Failing {
        async fn notify_order_created(&self, _order: &Order) -> Result<(), NotifyError> {
            Err(NotifyError::Status(502))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    #[derive(Default)]
    struct Counting(AtomicUsize);

    #[async_trait]
    impl Notifier for Counting {
        async fn notify_order_created(&self, _order: &Order) -> Result<(), NotifyError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn channel_notifier_publishes_created_event() {
        let (tx, mut rx) = broadcast::channel(8);
        let order = sample_order();

        ChannelNotifier::new(tx)
            .notify_order_created(&order)
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.order_id, order.id);
        assert_eq!(event.state, OrderState::Pending);
        assert!(event.action.is_none());
    }

    #[tokio::test]
    async fn channel_notifier_without_subscribers_succeeds() {
        let (tx, _) = broadcast::channel(8);
        let result = ChannelNotifier::new(tx)
            .notify_order_created(&sample_order())
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn fanout_runs_every_notifier_even_after_failure() {
        let counting = Arc::new(Counting::default());
        let fanout = FanoutNotifier::new(vec![Arc::new(Failing), counting.clone()]);

        let result = fanout.notify_order_created(&sample_order()).await;

        assert!(matches!(result, Err(NotifyError::Status(502))));
        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
    }
}
