use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle of an order. Orders move forward through
/// `pending -> confirmed -> preparing -> ready -> served`; the kitchen may
/// start preparation straight from `pending`. `cancelled` is reachable from
/// any non-terminal state. `served` and `cancelled` are terminal.
///
/// Order items share the same vocabulary: the kitchen toggles them between
/// `pending`, `preparing` and `ready`, and they inherit `served` or
/// `cancelled` from the parent order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Served,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::Served => "served",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "preparing" => Some(OrderStatus::Preparing),
            "ready" => Some(OrderStatus::Ready),
            "served" => Some(OrderStatus::Served),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Served | OrderStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (*self, next) {
            (_, Cancelled) => !self.is_terminal(),
            (Pending, Confirmed)
            | (Pending, Preparing)
            | (Confirmed, Preparing)
            | (Preparing, Ready)
            | (Ready, Served) => true,
            _ => false,
        }
    }

    /// Statuses the kitchen may set directly on an individual item.
    pub fn is_kitchen_togglable(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Preparing | OrderStatus::Ready
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gate for the order-level `ready` transition: every item must be ready.
/// An order without items can never become ready.
pub fn all_items_ready<'a>(item_statuses: impl IntoIterator<Item = &'a str>) -> bool {
    let mut any = false;
    for status in item_statuses {
        if status != OrderStatus::Ready.as_str() {
            return false;
        }
        any = true;
    }
    any
}

/// Kitchen display priority derived from order age. Presentational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

pub fn priority_for_age(age_minutes: i64) -> Priority {
    if age_minutes > 20 {
        Priority::High
    } else if age_minutes >= 10 {
        Priority::Medium
    } else {
        Priority::Low
    }
}

/// Message shown to the customer when their order reaches a status.
pub fn customer_status_message(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "Your order has been placed and is pending confirmation.",
        OrderStatus::Confirmed => "Your order has been confirmed and will be prepared soon.",
        OrderStatus::Preparing => "Your order is being prepared in the kitchen.",
        OrderStatus::Ready => "Your order is ready for pickup!",
        OrderStatus::Served => "Your order has been served. Enjoy your meal!",
        OrderStatus::Cancelled => "Your order has been cancelled.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    #[test]
    fn forward_transitions_are_legal() {
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Preparing));
        assert!(Confirmed.can_transition_to(Preparing));
        assert!(Preparing.can_transition_to(Ready));
        assert!(Ready.can_transition_to(Served));
    }

    #[test]
    fn skipping_forward_states_is_illegal() {
        assert!(!Pending.can_transition_to(Ready));
        assert!(!Pending.can_transition_to(Served));
        assert!(!Confirmed.can_transition_to(Served));
        assert!(!Preparing.can_transition_to(Served));
    }

    #[test]
    fn backward_transitions_are_illegal() {
        assert!(!Ready.can_transition_to(Preparing));
        assert!(!Preparing.can_transition_to(Pending));
        assert!(!Served.can_transition_to(Ready));
    }

    #[test]
    fn cancellation_is_legal_from_any_non_terminal_state() {
        for status in [Pending, Confirmed, Preparing, Ready] {
            assert!(status.can_transition_to(Cancelled), "{status}");
        }
        assert!(!Served.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Cancelled));
    }

    #[test]
    fn terminal_states_allow_nothing() {
        for next in [Pending, Confirmed, Preparing, Ready, Served, Cancelled] {
            assert!(!Served.can_transition_to(next), "served -> {next}");
            assert!(!Cancelled.can_transition_to(next), "cancelled -> {next}");
        }
    }

    #[test]
    fn ready_gate_requires_every_item_ready() {
        assert!(all_items_ready(["ready", "ready", "ready"]));
        assert!(!all_items_ready(["ready", "preparing", "ready"]));
        assert!(!all_items_ready(Vec::<&str>::new()));
    }

    #[test]
    fn priority_follows_age_thresholds() {
        assert_eq!(priority_for_age(0), Priority::Low);
        assert_eq!(priority_for_age(9), Priority::Low);
        assert_eq!(priority_for_age(10), Priority::Medium);
        assert_eq!(priority_for_age(20), Priority::Medium);
        assert_eq!(priority_for_age(21), Priority::High);
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [Pending, Confirmed, Preparing, Ready, Served, Cancelled] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("delivered"), None);
    }
}
