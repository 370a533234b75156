use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

/// Tables whose row changes are fanned out to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTable {
    Orders,
    OrderItems,
    Payments,
    Notifications,
    MenuItems,
    Feedback,
}

impl ChangeTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeTable::Orders => "orders",
            ChangeTable::OrderItems => "order_items",
            ChangeTable::Payments => "payments",
            ChangeTable::Notifications => "notifications",
            ChangeTable::MenuItems => "menu_items",
            ChangeTable::Feedback => "feedback",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "orders" => Some(ChangeTable::Orders),
            "order_items" => Some(ChangeTable::OrderItems),
            "payments" => Some(ChangeTable::Payments),
            "notifications" => Some(ChangeTable::Notifications),
            "menu_items" => Some(ChangeTable::MenuItems),
            "feedback" => Some(ChangeTable::Feedback),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Created,
    Updated,
    Deleted,
}

impl ChangeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOp::Created => "created",
            ChangeOp::Updated => "updated",
            ChangeOp::Deleted => "deleted",
        }
    }
}

/// A single row-level change. Delivery is at-least-once and a lagging
/// subscriber skips ahead, so consumers must treat the row image as
/// "replace by id", never as a diff to apply.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChangeEvent {
    pub table: ChangeTable,
    pub op: ChangeOp,
    pub row_id: Uuid,
    /// Owner of the row, when the table has one; used for `mine` scoping.
    pub scope_user: Option<Uuid>,
    pub row: Value,
    pub old_row: Option<Value>,
    pub occurred_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn created(table: ChangeTable, row_id: Uuid, scope_user: Option<Uuid>, row: Value) -> Self {
        Self {
            table,
            op: ChangeOp::Created,
            row_id,
            scope_user,
            row,
            old_row: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn updated(
        table: ChangeTable,
        row_id: Uuid,
        scope_user: Option<Uuid>,
        old_row: Value,
        row: Value,
    ) -> Self {
        Self {
            table,
            op: ChangeOp::Updated,
            row_id,
            scope_user,
            row,
            old_row: Some(old_row),
            occurred_at: Utc::now(),
        }
    }

    pub fn deleted(table: ChangeTable, row_id: Uuid, scope_user: Option<Uuid>, old_row: Value) -> Self {
        Self {
            table,
            op: ChangeOp::Deleted,
            row_id,
            scope_user,
            row: Value::Null,
            old_row: Some(old_row),
            occurred_at: Utc::now(),
        }
    }

    /// Routing key consumers register on, e.g. `orders.created`.
    pub fn key(&self) -> String {
        format!("{}.{}", self.table.as_str(), self.op.as_str())
    }
}
