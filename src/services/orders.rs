//! Order aggregate operations shared by the customer, staff and kitchen
//! routes. Every mutation runs in one transaction together with its outbox
//! event and audit entry; the change feed only ever sees committed rows.

use std::collections::HashMap;

use anyhow::Context;
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::core::{app_error::AppError, audit, middleware::CurrentUser, outbox};
use crate::domain::{
    checkout::OrderDraft,
    status::{self, OrderStatus},
    types::{PaymentMethod, PaymentStatus},
};
use crate::models::{
    CreateOrderItemEntity, CreatePaymentEntity, MenuItemEntity, OrderEntity, OrderItemEntity,
    PaymentEntity,
};
use crate::realtime::{ChangeEvent, ChangeTable};
use crate::schema::{menu_items, order_items, orders, payments};

#[derive(Serialize, Debug, ToSchema)]
pub struct OrderItemDetail {
    pub item: OrderItemEntity,
    pub menu_item: Option<MenuItemEntity>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct OrderAggregate {
    pub order: OrderEntity,
    pub order_items: Vec<OrderItemDetail>,
    pub payments: Vec<PaymentEntity>,
}

/// Attaches items (with their menu snapshots) and payments to the given
/// order headers, preserving the input order.
pub async fn load_aggregates(
    conn: &mut AsyncPgConnection,
    order_headers: Vec<OrderEntity>,
) -> Result<Vec<OrderAggregate>, AppError> {
    let order_ids: Vec<Uuid> = order_headers.iter().map(|order| order.id).collect();

    let item_rows: Vec<(OrderItemEntity, Option<MenuItemEntity>)> = order_items::table
        .left_join(menu_items::table)
        .filter(order_items::order_id.eq_any(&order_ids))
        .select((
            OrderItemEntity::as_select(),
            Option::<MenuItemEntity>::as_select(),
        ))
        .get_results(conn)
        .await
        .context("Failed to get order items")?;

    let mut items_by_order: HashMap<Uuid, Vec<OrderItemDetail>> = HashMap::new();
    for (item, menu_item) in item_rows {
        items_by_order
            .entry(item.order_id)
            .or_default()
            .push(OrderItemDetail { item, menu_item });
    }

    let payment_rows: Vec<PaymentEntity> = payments::table
        .filter(payments::order_id.eq_any(&order_ids))
        .get_results(conn)
        .await
        .context("Failed to get payments")?;

    let mut payments_by_order: HashMap<Uuid, Vec<PaymentEntity>> = HashMap::new();
    for payment in payment_rows {
        payments_by_order
            .entry(payment.order_id)
            .or_default()
            .push(payment);
    }

    Ok(order_headers
        .into_iter()
        .map(|order| OrderAggregate {
            order_items: items_by_order.remove(&order.id).unwrap_or_default(),
            payments: payments_by_order.remove(&order.id).unwrap_or_default(),
            order,
        })
        .collect())
}

/// Persists the checkout draft: header, items and a pending payment as one
/// unit. The kitchen fan-out happens asynchronously off the change feed.
pub async fn create_order(
    conn: &mut AsyncPgConnection,
    actor: CurrentUser,
    draft: OrderDraft,
    method: PaymentMethod,
    split_info: Option<Value>,
) -> Result<(OrderEntity, Vec<OrderItemEntity>, PaymentEntity), AppError> {
    conn.transaction(move |conn| {
        Box::pin(async move {
            let order: OrderEntity = diesel::insert_into(orders::table)
                .values(draft.header)
                .returning(OrderEntity::as_returning())
                .get_result(conn)
                .await
                .context("Failed to create order")?;

            let item_values: Vec<CreateOrderItemEntity> = draft
                .items
                .into_iter()
                .map(|item| CreateOrderItemEntity {
                    order_id: order.id,
                    menu_item_id: item.menu_item_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    total_price: item.total_price,
                    special_instructions: item.special_instructions,
                    item_status: OrderStatus::Pending.as_str().to_string(),
                })
                .collect();

            let created_items: Vec<OrderItemEntity> = diesel::insert_into(order_items::table)
                .values(item_values)
                .returning(OrderItemEntity::as_returning())
                .get_results(conn)
                .await
                .context("Failed to create order items")?;

            let payment: PaymentEntity = diesel::insert_into(payments::table)
                .values(CreatePaymentEntity {
                    order_id: order.id,
                    user_id: order.user_id,
                    amount: order.total_amount,
                    payment_method: method.as_str().to_string(),
                    payment_status: PaymentStatus::Pending.as_str().to_string(),
                    split_info,
                })
                .returning(PaymentEntity::as_returning())
                .get_result(conn)
                .await
                .context("Failed to create payment")?;

            let order_json =
                serde_json::to_value(&order).context("Failed to serialize order")?;
            let event = ChangeEvent::created(
                ChangeTable::Orders,
                order.id,
                order.user_id,
                order_json.clone(),
            );
            outbox::publish(conn, event.key(), &event).await?;

            let payment_json =
                serde_json::to_value(&payment).context("Failed to serialize payment")?;
            let event = ChangeEvent::created(
                ChangeTable::Payments,
                payment.id,
                payment.user_id,
                payment_json,
            );
            outbox::publish(conn, event.key(), &event).await?;

            audit::record(
                conn,
                Some(actor.id),
                "INSERT",
                "orders",
                Some(order.id),
                None,
                Some(order_json),
            )
            .await?;

            Ok::<(OrderEntity, Vec<OrderItemEntity>, PaymentEntity), AppError>((
                order,
                created_items,
                payment,
            ))
        })
    })
    .await
}

/// Moves an order through the status machine. Illegal transitions are
/// rejected; `ready` is gated on every item being ready; `served` stamps
/// `completed_at`; terminal transitions cascade to the items.
pub async fn update_order_status(
    conn: &mut AsyncPgConnection,
    actor: CurrentUser,
    order_id: Uuid,
    next: OrderStatus,
) -> Result<OrderEntity, AppError> {
    conn.transaction(move |conn| {
        Box::pin(async move {
            let order: OrderEntity = orders::table
                .find(order_id)
                .get_result(conn)
                .await
                .map_err(|_| AppError::NotFound)?;

            let current = parse_status(&order)?;
            if current == next {
                // Repeating a status is a no-op; concurrent writers race
                // last-writer-wins rather than erroring.
                return Ok(order);
            }
            if !current.can_transition_to(next) {
                return Err(AppError::Conflict(format!(
                    "Cannot move order from {current} to {next}"
                )));
            }
            if next == OrderStatus::Ready {
                ensure_all_items_ready(conn, order_id).await?;
            }

            let updated: OrderEntity = if next == OrderStatus::Served {
                diesel::update(orders::table.find(order_id))
                    .set((
                        orders::status.eq(next.as_str()),
                        orders::completed_at.eq(diesel::dsl::now),
                    ))
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to update order status")?
            } else {
                diesel::update(orders::table.find(order_id))
                    .set(orders::status.eq(next.as_str()))
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to update order status")?
            };

            if next.is_terminal() {
                cascade_item_status(conn, &updated, next).await?;
            }

            publish_order_update(conn, &order, &updated).await?;
            audit::record(
                conn,
                Some(actor.id),
                "UPDATE",
                "orders",
                Some(order_id),
                Some(serde_json::to_value(&order).context("Failed to serialize order")?),
                Some(serde_json::to_value(&updated).context("Failed to serialize order")?),
            )
            .await?;

            Ok::<OrderEntity, AppError>(updated)
        })
    })
    .await
}

/// Cancels one of the customer's own orders. Cancelling twice is a no-op;
/// a served order can no longer be cancelled.
pub async fn cancel_order(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
    order_id: Uuid,
) -> Result<OrderEntity, AppError> {
    conn.transaction(move |conn| {
        Box::pin(async move {
            let order: OrderEntity = orders::table
                .find(order_id)
                .filter(orders::user_id.eq(user_id))
                .get_result(conn)
                .await
                .map_err(|_| AppError::NotFound)?;

            let current = parse_status(&order)?;
            if current == OrderStatus::Cancelled {
                return Ok(order);
            }
            if current.is_terminal() {
                return Err(AppError::Conflict(
                    "A served order can no longer be cancelled".to_string(),
                ));
            }

            let updated: OrderEntity = diesel::update(orders::table.find(order_id))
                .set(orders::status.eq(OrderStatus::Cancelled.as_str()))
                .returning(OrderEntity::as_returning())
                .get_result(conn)
                .await
                .context("Failed to cancel order")?;

            cascade_item_status(conn, &updated, OrderStatus::Cancelled).await?;
            publish_order_update(conn, &order, &updated).await?;
            audit::record(
                conn,
                Some(user_id),
                "UPDATE",
                "orders",
                Some(order_id),
                Some(serde_json::to_value(&order).context("Failed to serialize order")?),
                Some(serde_json::to_value(&updated).context("Failed to serialize order")?),
            )
            .await?;

            Ok::<OrderEntity, AppError>(updated)
        })
    })
    .await
}

/// Sets a single item's kitchen status. The parent order is untouched; the
/// ready gate re-reads item state when the order transition is requested.
pub async fn update_item_status(
    conn: &mut AsyncPgConnection,
    actor: CurrentUser,
    item_id: Uuid,
    next: OrderStatus,
) -> Result<OrderItemEntity, AppError> {
    if !next.is_kitchen_togglable() {
        return Err(AppError::BadRequest(
            "Item status can only be toggled between pending, preparing and ready".to_string(),
        ));
    }

    conn.transaction(move |conn| {
        Box::pin(async move {
            let item: OrderItemEntity = order_items::table
                .find(item_id)
                .get_result(conn)
                .await
                .map_err(|_| AppError::NotFound)?;

            let order: OrderEntity = orders::table
                .find(item.order_id)
                .get_result(conn)
                .await
                .context("Failed to get parent order")?;
            let order_status = parse_status(&order)?;
            if order_status.is_terminal() {
                return Err(AppError::Conflict(format!(
                    "Order is already {order_status}"
                )));
            }

            let updated: OrderItemEntity = diesel::update(order_items::table.find(item_id))
                .set(order_items::item_status.eq(next.as_str()))
                .returning(OrderItemEntity::as_returning())
                .get_result(conn)
                .await
                .context("Failed to update item status")?;

            let event = ChangeEvent::updated(
                ChangeTable::OrderItems,
                updated.id,
                order.user_id,
                serde_json::to_value(&item).context("Failed to serialize order item")?,
                serde_json::to_value(&updated).context("Failed to serialize order item")?,
            );
            outbox::publish(conn, event.key(), &event).await?;

            audit::record(
                conn,
                Some(actor.id),
                "UPDATE",
                "order_items",
                Some(item_id),
                Some(serde_json::to_value(&item).context("Failed to serialize order item")?),
                Some(serde_json::to_value(&updated).context("Failed to serialize order item")?),
            )
            .await?;

            Ok::<OrderItemEntity, AppError>(updated)
        })
    })
    .await
}

fn parse_status(order: &OrderEntity) -> Result<OrderStatus, AppError> {
    OrderStatus::parse(&order.status).ok_or_else(|| {
        AppError::Other(anyhow::anyhow!(
            "Order {} carries unknown status {:?}",
            order.id,
            order.status
        ))
    })
}

async fn ensure_all_items_ready(
    conn: &mut AsyncPgConnection,
    order_id: Uuid,
) -> Result<(), AppError> {
    let statuses: Vec<String> = order_items::table
        .filter(order_items::order_id.eq(order_id))
        .select(order_items::item_status)
        .get_results(conn)
        .await
        .context("Failed to get order items")?;

    if !status::all_items_ready(statuses.iter().map(String::as_str)) {
        return Err(AppError::Conflict(
            "Every item must be ready before the order can be marked ready".to_string(),
        ));
    }
    Ok(())
}

/// Items inherit `served`/`cancelled` from the parent. One event per item,
/// mirroring the write burst the cascade produces.
async fn cascade_item_status(
    conn: &mut AsyncPgConnection,
    order: &OrderEntity,
    next: OrderStatus,
) -> Result<(), AppError> {
    let old_items: Vec<OrderItemEntity> = order_items::table
        .filter(order_items::order_id.eq(order.id))
        .get_results(conn)
        .await
        .context("Failed to get order items")?;

    let updated_items: Vec<OrderItemEntity> =
        diesel::update(order_items::table.filter(order_items::order_id.eq(order.id)))
            .set(order_items::item_status.eq(next.as_str()))
            .returning(OrderItemEntity::as_returning())
            .get_results(conn)
            .await
            .context("Failed to cascade item status")?;

    let mut old_by_id: HashMap<Uuid, OrderItemEntity> =
        old_items.into_iter().map(|item| (item.id, item)).collect();
    for item in updated_items {
        let old_json = match old_by_id.remove(&item.id) {
            Some(old) => {
                serde_json::to_value(old).context("Failed to serialize order item")?
            }
            None => Value::Null,
        };
        let event = ChangeEvent::updated(
            ChangeTable::OrderItems,
            item.id,
            order.user_id,
            old_json,
            serde_json::to_value(&item).context("Failed to serialize order item")?,
        );
        outbox::publish(conn, event.key(), &event).await?;
    }
    Ok(())
}

async fn publish_order_update(
    conn: &mut AsyncPgConnection,
    old: &OrderEntity,
    new: &OrderEntity,
) -> Result<(), AppError> {
    let event = ChangeEvent::updated(
        ChangeTable::Orders,
        new.id,
        new.user_id,
        serde_json::to_value(old).context("Failed to serialize order")?,
        serde_json::to_value(new).context("Failed to serialize order")?,
    );
    outbox::publish(conn, event.key(), &event).await?;
    Ok(())
}
