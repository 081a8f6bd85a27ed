use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::order::OrderEvent;
use crate::state::AppState;

/// `/ws?order_id=..` follows one order, `/ws?provider_id=..` one provider's
/// queue. Without either the socket gets every event.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct EventFilter {
    pub order_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
}

impl EventFilter {
    pub fn matches(&self, event: &OrderEvent) -> bool {
        self.order_id.is_none_or(|id| id == event.order_id)
            && self.provider_id.is_none_or(|id| id == event.provider_id)
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(filter): Query<EventFilter>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, filter, state))
}

async fn handle_socket(socket: WebSocket, filter: EventFilter, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.events_tx.subscribe();

    info!(
        order_id = ?filter.order_id,
        provider_id = ?filter.provider_id,
        subscribers = state.events_tx.receiver_count(),
        "order event subscriber connected"
    );

    let mut send_task = tokio::spawn(async move {
        let mut delivered: u64 = 0;
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "order event subscriber lagging, events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            if !filter.matches(&event) {
                continue;
            }

            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(order_id = %event.order_id, error = %err, "failed to serialize order event");
                    continue;
                }
            };

            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
            delivered += 1;
            debug!(order_id = %event.order_id, state = %event.state, "order event pushed");
        }
        delivered
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    let delivered = tokio::select! {
        sent = &mut send_task => {
            recv_task.abort();
            sent.unwrap_or_default()
        }
        _ = &mut recv_task => {
            send_task.abort();
            0
        }
    };

    info!(
        delivered,
        subscribers = state.events_tx.receiver_count(),
        "order event subscriber disconnected"
    );
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::EventFilter;
    use crate::models::order::{Action, OrderEvent};
    use crate::test_support::sample_order;

    #[test]
    fn empty_filter_passes_everything() {
        let event = OrderEvent::created(&sample_order());
        assert!(EventFilter::default().matches(&event));
    }

    #[test]
    fn filter_narrows_to_order_and_provider() {
        let order = sample_order();
        let event = OrderEvent::transitioned(&order, Action::Accept);

        let same_order = EventFilter {
            order_id: Some(order.id),
            provider_id: None,
        };
        assert!(same_order.matches(&event));

        let other_order = EventFilter {
            order_id: Some(Uuid::new_v4()),
            provider_id: None,
        };
        assert!(!other_order.matches(&event));

        let other_provider = EventFilter {
            order_id: Some(order.id),
            provider_id: Some(Uuid::from_u128(2)),
        };
        assert!(!other_provider.matches(&event));
    }
}
