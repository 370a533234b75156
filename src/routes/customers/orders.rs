use std::collections::HashMap;

use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::core::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    middleware::{self, CurrentUser},
};
use crate::domain::{
    checkout::{self, CheckoutLine},
    types::PaymentPath,
};
use crate::models::{MenuItemEntity, OrderEntity, OrderItemEntity, PaymentEntity};
use crate::schema::{dining_tables, menu_items, order_items, orders, payments};
use crate::services::orders::{self as order_service, OrderAggregate};

/// Defines all customer-facing order routes (checkout + tracking +
/// cancellation).
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/customers/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_my_orders))
            .routes(utoipa_axum::routes!(get_order))
            .routes(utoipa_axum::routes!(create_order))
            .routes(utoipa_axum::routes!(cancel_order))
            .route_layer(axum::middleware::from_fn(
                middleware::customers_authorization,
            )),
    )
}

/// Fetch all orders belonging to the authenticated customer, newest first.
#[utoipa::path(
    get,
    path = "/my-orders",
    tags = ["Orders"],
    responses(
        (status = 200, description = "List my orders", body = StdResponse<Vec<OrderAggregate>, String>)
    )
)]
async fn get_my_orders(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order_headers: Vec<OrderEntity> = orders::table
        .filter(orders::user_id.eq(user.id))
        .order_by(orders::created_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get my orders")?;

    let aggregates = order_service::load_aggregates(conn, order_headers).await?;

    Ok(StdResponse {
        data: Some(aggregates),
        message: Some("Get my orders successfully"),
    })
}

/// Fetch a specific order belonging to the authenticated customer.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Orders"],
    params(
        ("id" = Uuid, Path, description = "Order ID to fetch")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<OrderAggregate, String>)
    )
)]
async fn get_order(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order: OrderEntity = orders::table
        .find(id)
        .filter(orders::user_id.eq(user.id))
        .get_result(conn)
        .await
        .map_err(|_| AppError::NotFound)?;

    let aggregate = order_service::load_aggregates(conn, vec![order])
        .await?
        .into_iter()
        .next()
        .ok_or(AppError::NotFound)?;

    Ok(StdResponse {
        data: Some(aggregate),
        message: Some("Get order successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct CheckoutItemReq {
    menu_item_id: Uuid,
    quantity: i32,
    special_instructions: Option<String>,
}

#[derive(Deserialize, ToSchema)]
struct CreateOrderReq {
    table_number: String,
    items: Vec<CheckoutItemReq>,
    special_instructions: Option<String>,
    payment_path: PaymentPath,
    /// Free-form split metadata; when omitted for an equal split,
    /// `split_participants` derives it.
    split_info: Option<Value>,
    split_participants: Option<u32>,
    idempotency_key: Option<String>,
}

#[derive(Serialize, ToSchema)]
struct CreateOrderRes {
    order: OrderEntity,
    order_items: Vec<OrderItemEntity>,
    payment: PaymentEntity,
}

/// Convert the submitted cart into an order aggregate. Lines are re-priced
/// from the current menu; header, items and the pending payment are
/// persisted as one unit.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Orders"],
    request_body = CreateOrderReq,
    responses(
        (status = 200, description = "Created order successfully", body = StdResponse<CreateOrderRes, String>)
    )
)]
async fn create_order(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    // A retried checkout with the same key gets the original order back.
    if let Some(key) = &body.idempotency_key {
        let existing: Option<OrderEntity> = orders::table
            .filter(orders::idempotency_key.eq(key))
            .filter(orders::user_id.eq(user.id))
            .first(conn)
            .await
            .optional()
            .context("Failed to check idempotency key")?;
        if let Some(order) = existing {
            return existing_order_response(conn, order).await;
        }
    }

    let known_table: i64 = dining_tables::table
        .filter(dining_tables::table_number.eq(&body.table_number))
        .filter(dining_tables::is_active.eq(true))
        .count()
        .get_result(conn)
        .await
        .context("Failed to look up dining table")?;
    if known_table == 0 {
        return Err(AppError::BadRequest(format!(
            "Unknown table {}",
            body.table_number
        )));
    }

    let menu_ids: Vec<Uuid> = body.items.iter().map(|item| item.menu_item_id).collect();
    let menu_rows: Vec<MenuItemEntity> = menu_items::table
        .filter(menu_items::id.eq_any(&menu_ids))
        .get_results(conn)
        .await
        .context("Failed to get menu items")?;
    let menu: HashMap<Uuid, MenuItemEntity> =
        menu_rows.into_iter().map(|item| (item.id, item)).collect();

    let lines: Vec<CheckoutLine> = body
        .items
        .iter()
        .map(|item| CheckoutLine {
            menu_item_id: item.menu_item_id,
            quantity: item.quantity,
            special_instructions: item.special_instructions.clone(),
        })
        .collect();

    let draft = checkout::build_order(
        Some(user.id),
        &body.table_number,
        &lines,
        &menu,
        body.payment_path,
        body.special_instructions.clone(),
        body.idempotency_key.clone(),
    )
    .map_err(|err| AppError::BadRequest(err.to_string()))?;

    let split_info = body.split_info.clone().or_else(|| {
        body.split_participants.and_then(|participants| {
            checkout::equal_split_info(draft.header.total_amount, participants)
        })
    });

    let result =
        order_service::create_order(conn, user, draft, body.payment_path.method(), split_info)
            .await;

    match result {
        Ok((order, created_items, payment)) => Ok(StdResponse {
            data: Some(CreateOrderRes {
                order,
                order_items: created_items,
                payment,
            }),
            message: Some("Create order successfully"),
        }),
        Err(AppError::Conflict(message)) => {
            // A concurrent retry with the same key lost the insert race;
            // hand back the winner.
            if let Some(key) = &body.idempotency_key {
                let existing: Option<OrderEntity> = orders::table
                    .filter(orders::idempotency_key.eq(key))
                    .filter(orders::user_id.eq(user.id))
                    .first(conn)
                    .await
                    .optional()
                    .context("Failed to re-check idempotency key")?;
                if let Some(order) = existing {
                    return existing_order_response(conn, order).await;
                }
            }
            Err(AppError::Conflict(message))
        }
        Err(err) => Err(err),
    }
}

async fn existing_order_response(
    conn: &mut AsyncPgConnection,
    order: OrderEntity,
) -> Result<StdResponse<CreateOrderRes, &'static str>, AppError> {
    let items: Vec<OrderItemEntity> = order_items::table
        .filter(order_items::order_id.eq(order.id))
        .get_results(conn)
        .await
        .context("Failed to get order items")?;

    let payment: PaymentEntity = payments::table
        .filter(payments::order_id.eq(order.id))
        .first(conn)
        .await
        .map_err(|_| AppError::NotFound)?;

    Ok(StdResponse {
        data: Some(CreateOrderRes {
            order,
            order_items: items,
            payment,
        }),
        message: Some("Order already created"),
    })
}

/// Cancel one of the authenticated customer's orders. Idempotent:
/// cancelling a cancelled order changes nothing.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Orders"],
    params(
        ("id" = Uuid, Path, description = "Order ID to cancel")
    ),
    responses(
        (status = 200, description = "Cancelled order successfully", body = StdResponse<OrderEntity, String>)
    )
)]
async fn cancel_order(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let cancelled = order_service::cancel_order(conn, user.id, id).await?;

    Ok(StdResponse {
        data: Some(cancelled),
        message: Some("Cancelled order successfully"),
    })
}
