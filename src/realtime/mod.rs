//! In-process change feed: every committed row change is relayed here by
//! the outbox dispatcher and fanned out to SSE subscribers and registered
//! consumers.

mod event;

pub use event::{ChangeEvent, ChangeOp, ChangeTable};

use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Clone)]
pub struct RealtimeHub {
    tx: broadcast::Sender<ChangeEvent>,
}

impl RealtimeHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes to all current subscribers, returning how many received
    /// the event. Zero subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionScope {
    /// Rows owned by the given user.
    Mine(Uuid),
    /// Every row of the table.
    All,
    /// Orders still on the kitchen's plate: pending, confirmed, preparing.
    Kitchen,
}

#[derive(Debug, Clone, Copy)]
pub struct SubscriptionFilter {
    pub table: ChangeTable,
    pub scope: SubscriptionScope,
}

impl SubscriptionFilter {
    pub fn new(table: ChangeTable, scope: SubscriptionScope) -> Self {
        Self { table, scope }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.table != self.table {
            return false;
        }
        match self.scope {
            SubscriptionScope::All => true,
            SubscriptionScope::Mine(user_id) => event.scope_user == Some(user_id),
            SubscriptionScope::Kitchen => {
                // Deletes only carry the old row image.
                let row = if event.op == ChangeOp::Deleted {
                    event.old_row.as_ref()
                } else {
                    Some(&event.row)
                };
                row.and_then(|row| row.get("status"))
                    .and_then(|status| status.as_str())
                    .map(|status| matches!(status, "pending" | "confirmed" | "preparing"))
                    .unwrap_or(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order_event(status: &str, user: Option<Uuid>) -> ChangeEvent {
        ChangeEvent::created(
            ChangeTable::Orders,
            Uuid::new_v4(),
            user,
            json!({ "status": status }),
        )
    }

    #[tokio::test]
    async fn publish_reaches_every_subscriber() {
        let hub = RealtimeHub::new(16);
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();

        let delivered = hub.publish(order_event("pending", None));
        assert_eq!(delivered, 2);

        assert_eq!(first.recv().await.unwrap().table, ChangeTable::Orders);
        assert_eq!(second.recv().await.unwrap().op, ChangeOp::Created);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_not_an_error() {
        let hub = RealtimeHub::new(16);
        assert_eq!(hub.publish(order_event("pending", None)), 0);
    }

    #[test]
    fn mine_scope_filters_by_owner() {
        let user = Uuid::new_v4();
        let filter = SubscriptionFilter::new(ChangeTable::Orders, SubscriptionScope::Mine(user));

        assert!(filter.matches(&order_event("pending", Some(user))));
        assert!(!filter.matches(&order_event("pending", Some(Uuid::new_v4()))));
        assert!(!filter.matches(&order_event("pending", None)));
    }

    #[test]
    fn kitchen_scope_tracks_active_statuses_only() {
        let filter = SubscriptionFilter::new(ChangeTable::Orders, SubscriptionScope::Kitchen);

        for status in ["pending", "confirmed", "preparing"] {
            assert!(filter.matches(&order_event(status, None)), "{status}");
        }
        for status in ["ready", "served", "cancelled"] {
            assert!(!filter.matches(&order_event(status, None)), "{status}");
        }
    }

    #[test]
    fn kitchen_scope_reads_the_old_image_on_delete() {
        let filter = SubscriptionFilter::new(ChangeTable::Orders, SubscriptionScope::Kitchen);
        let event = ChangeEvent::deleted(
            ChangeTable::Orders,
            Uuid::new_v4(),
            None,
            json!({ "status": "preparing" }),
        );
        assert!(filter.matches(&event));
    }

    #[test]
    fn table_mismatch_never_matches() {
        let filter = SubscriptionFilter::new(ChangeTable::Payments, SubscriptionScope::All);
        assert!(!filter.matches(&order_event("pending", None)));
    }
}
