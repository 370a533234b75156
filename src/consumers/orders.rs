use std::sync::Arc;

use anyhow::{Context, Result};
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;
use futures::future::BoxFuture;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::core::app_state::AppState;
use crate::domain::{
    status::{self, OrderStatus},
    types::NotificationType,
};
use crate::models::OrderEntity;
use crate::realtime::ChangeEvent;
use crate::schema::{order_items, user_roles};
use crate::services::notifications;

/// Fans a new order out to every staff/admin user so the kitchen hears
/// about it. Best-effort: a failed notification is logged and skipped.
pub fn order_created(event: ChangeEvent, state: Arc<AppState>) -> BoxFuture<'static, Result<()>> {
    Box::pin(async move {
        let conn = &mut state.db_pool.get().await?;
        let order: OrderEntity =
            serde_json::from_value(event.row).context("Malformed order row in change event")?;

        let item_count: i64 = order_items::table
            .filter(order_items::order_id.eq(order.id))
            .count()
            .get_result(conn)
            .await
            .context("Failed to count order items")?;

        let staff: Vec<Uuid> = user_roles::table
            .filter(user_roles::role.eq_any(["staff", "admin"]))
            .select(user_roles::user_id)
            .get_results(conn)
            .await
            .context("Failed to get staff users")?;

        for user_id in staff {
            let result = notifications::create(
                conn,
                user_id,
                "New Order Received",
                format!("Table {} - {} items", order.table_number, item_count),
                NotificationType::Kitchen,
                Some(json!({ "order_id": order.id, "table_number": order.table_number })),
            )
            .await;
            if let Err(err) = result {
                tracing::warn!("Failed to notify staff user {user_id}: {err:#}");
            }
        }

        info!("Kitchen notified about order #{}", order.id);
        Ok(())
    })
}

/// Tells the customer where their order stands whenever its status moves.
pub fn order_status_changed(
    event: ChangeEvent,
    state: Arc<AppState>,
) -> BoxFuture<'static, Result<()>> {
    Box::pin(async move {
        let order: OrderEntity =
            serde_json::from_value(event.row).context("Malformed order row in change event")?;
        let old: Option<OrderEntity> = event
            .old_row
            .filter(|row| !row.is_null())
            .map(serde_json::from_value)
            .transpose()
            .context("Malformed old order row in change event")?;

        if let Some(old) = &old {
            if old.status == order.status {
                return Ok(());
            }
        }
        let Some(user_id) = order.user_id else {
            return Ok(());
        };
        let Some(new_status) = OrderStatus::parse(&order.status) else {
            return Ok(());
        };

        let conn = &mut state.db_pool.get().await?;
        notifications::create(
            conn,
            user_id,
            "Order Status Updated",
            status::customer_status_message(new_status).to_string(),
            NotificationType::OrderUpdate,
            Some(json!({ "order_id": order.id, "status": order.status })),
        )
        .await?;

        info!("Order #{} is now {}", order.id, order.status);
        Ok(())
    })
}
