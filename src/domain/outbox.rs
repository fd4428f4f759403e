use serde_json::Value;
use uuid::Uuid;

/// An integration event written in the same transaction as the state change
/// it describes. Relaying it (e-mail, message bus) happens outside this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: Value,
}

impl OutboxEvent {
    pub fn for_order(order_id: Uuid, event_type: &str, payload: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            aggregate_type: "Order".to_string(),
            aggregate_id: order_id.to_string(),
            event_type: event_type.to_string(),
            payload,
        }
    }
}
