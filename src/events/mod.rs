use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Events emitted by services after their transactions commit.
///
/// Consumers must treat delivery as best-effort; nothing in the request path
/// waits on event processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderCreated { order_id: i64, order_no: String },
    OrderUpdated(i64),
    OrderCancelled(i64),
    OrderCompleted { order_id: i64, supplier_id: i64 },
    OrderReactivated(i64),
    SuppliersInvited { order_id: i64, supplier_ids: Vec<i64> },

    // Quote events
    QuoteSubmitted { order_id: i64, supplier_id: i64 },
    QuoteUpdated { order_id: i64, supplier_id: i64 },

    // Supplier events
    SupplierCreated(i64),
    SupplierDeleted(i64),
    SupplierTokenRotated(i64),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Drains the event channel, recording each event in the log.
///
/// Kept as a free-standing task so additional consumers (audit trail,
/// outbound integrations) can be attached without touching the services.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    info!("Event processor started");
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated { order_id, order_no } => {
                info!(order_id, order_no = %order_no, "event: order created");
            }
            Event::OrderCompleted {
                order_id,
                supplier_id,
            } => {
                info!(order_id, supplier_id, "event: order completed");
            }
            Event::QuoteSubmitted {
                order_id,
                supplier_id,
            }
            | Event::QuoteUpdated {
                order_id,
                supplier_id,
            } => {
                info!(order_id, supplier_id, "event: quote activity");
            }
            other => debug!(event = ?other, "event"),
        }
    }
    info!("Event processor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_fails_after_receiver_dropped() {
        let (tx, rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        drop(rx);
        assert!(sender.send(Event::OrderUpdated(1)).await.is_err());
    }

    #[tokio::test]
    async fn events_round_trip_through_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        sender
            .send(Event::OrderCreated {
                order_id: 3,
                order_no: "RX240315001".into(),
            })
            .await
            .expect("send");

        match rx.recv().await {
            Some(Event::OrderCreated { order_id, order_no }) => {
                assert_eq!(order_id, 3);
                assert_eq!(order_no, "RX240315001");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
