use std::time::Duration;

use async_trait::async_trait;
use chrono::FixedOffset;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::engine::schedule::format_window;
use crate::models::order::{Order, OrderState};
use crate::notify::{Notifier, NotifyError};

#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Retry state for one delivery. Each delivery owns its own counter.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    attempts: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Records a failed attempt. Returns how long to wait before the next one,
    /// or `None` once the attempt budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempts += 1;
        if self.attempts >= self.policy.max_attempts {
            return None;
        }

        let factor = 2u32.saturating_pow(self.attempts - 1);
        Some(
            self.policy
                .base_delay
                .saturating_mul(factor)
                .min(self.policy.max_delay),
        )
    }
}

#[derive(Debug, Serialize)]
struct OrderCreatedPayload<'a> {
    event: &'static str,
    order_id: Uuid,
    customer_id: Uuid,
    state: OrderState,
    service: &'a str,
    price: f64,
    provider_id: Uuid,
    provider_name: &'a str,
    pickup_address: String,
    delivery_address: String,
    pickup_window: String,
    delivery_window: String,
    notes: &'a str,
}

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    policy: BackoffPolicy,
    offset: FixedOffset,
}

impl WebhookNotifier {
    pub fn new(url: &str, policy: BackoffPolicy, offset: FixedOffset) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| NotifyError::Delivery(err.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
            policy,
            offset,
        })
    }

    fn payload<'a>(&self, order: &'a Order) -> OrderCreatedPayload<'a> {
        OrderCreatedPayload {
            event: "order_created",
            order_id: order.id,
            customer_id: order.customer_id,
            state: order.state,
            service: &order.service.name,
            price: order.service.price,
            provider_id: order.provider.id,
            provider_name: &order.provider.name,
            pickup_address: order.pickup_address.display_line(),
            delivery_address: order.delivery_address.display_line(),
            pickup_window: format_window(order.pickup_at, self.offset),
            delivery_window: format_window(order.delivery_at, self.offset),
            notes: &order.notes,
        }
    }

    async fn post(&self, payload: &OrderCreatedPayload<'_>) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|err| NotifyError::Delivery(err.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_order_created(&self, order: &Order) -> Result<(), NotifyError> {
        let payload = self.payload(order);
        let mut backoff = Backoff::new(self.policy);

        loop {
            match self.post(&payload).await {
                Ok(()) => return Ok(()),
                Err(err) => match backoff.next_delay() {
                    Some(delay) => {
                        debug!(
                            order_id = %order.id,
                            attempt = backoff.attempts(),
                            retry_in_ms = delay.as_millis() as u64,
                            error = %err,
                            "webhook delivery failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(err),
                },
            }
        }
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::FixedOffset;

    use super::{Backoff, BackoffPolicy, WebhookNotifier};
    use crate::test_support::sample_order;

    #[test]
    fn backoff_doubles_until_budget_is_spent() {
        let mut backoff = Backoff::new(BackoffPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
        });

        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(400)));
        assert_eq!(backoff.next_delay(), None);
        assert_eq!(backoff.attempts(), 4);
    }

    #[test]
    fn backoff_is_capped() {
        let mut backoff = Backoff::new(BackoffPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
        });

        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn separate_deliveries_do_not_share_attempts() {
        let policy = BackoffPolicy::default();
        let mut first = Backoff::new(policy);
        first.next_delay();
        first.next_delay();

        let second = Backoff::new(policy);
        assert_eq!(second.attempts(), 0);
    }

    #[test]
    fn payload_carries_display_windows() {
        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        let notifier =
            WebhookNotifier::new("http://localhost:9/hook", BackoffPolicy::default(), offset)
                .unwrap();
        let order = sample_order();

        let payload = serde_json::to_value(notifier.payload(&order)).unwrap();
        assert_eq!(payload["event"], "order_created");
        assert_eq!(payload["state"], "pending");
        assert_eq!(payload["pickup_window"], "Lunes, 2 de marzo, 10:00");
        assert_eq!(payload["delivery_window"], "Lunes, 2 de marzo, 18:00");
    }
}
