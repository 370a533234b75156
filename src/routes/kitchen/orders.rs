use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::core::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    middleware::{self, CurrentUser},
};
use crate::domain::status::{self, OrderStatus, Priority};
use crate::models::{OrderEntity, OrderItemEntity};
use crate::schema::orders;
use crate::services::orders::{self as order_service, OrderItemDetail};

/// Defines the kitchen display routes: active orders plus the status
/// transitions kitchen staff drive.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/kitchen",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(list_active_orders))
            .routes(utoipa_axum::routes!(start_preparation))
            .routes(utoipa_axum::routes!(mark_ready))
            .routes(utoipa_axum::routes!(mark_served))
            .routes(utoipa_axum::routes!(update_item_status))
            .route_layer(axum::middleware::from_fn(middleware::staff_authorization)),
    )
}

#[derive(Serialize, ToSchema)]
struct KitchenOrderRes {
    order: OrderEntity,
    order_items: Vec<OrderItemDetail>,
    priority: Priority,
    all_items_ready: bool,
    age_minutes: i64,
}

/// Orders still on the kitchen's plate (pending, confirmed, preparing),
/// oldest first, with display priority derived from order age.
#[utoipa::path(
    get,
    path = "/orders",
    tags = ["Kitchen"],
    responses(
        (status = 200, description = "List active kitchen orders", body = StdResponse<Vec<KitchenOrderRes>, String>)
    )
)]
async fn list_active_orders(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let active: Vec<OrderEntity> = orders::table
        .filter(orders::status.eq_any([
            OrderStatus::Pending.as_str(),
            OrderStatus::Confirmed.as_str(),
            OrderStatus::Preparing.as_str(),
        ]))
        .order_by(orders::created_at.asc())
        .get_results(conn)
        .await
        .context("Failed to get kitchen orders")?;

    let now = Utc::now();
    let kitchen_orders: Vec<KitchenOrderRes> = order_service::load_aggregates(conn, active)
        .await?
        .into_iter()
        .map(|aggregate| {
            let age_minutes = (now - aggregate.order.created_at).num_minutes();
            let all_items_ready = status::all_items_ready(
                aggregate
                    .order_items
                    .iter()
                    .map(|detail| detail.item.item_status.as_str()),
            );
            KitchenOrderRes {
                priority: status::priority_for_age(age_minutes),
                all_items_ready,
                age_minutes,
                order: aggregate.order,
                order_items: aggregate.order_items,
            }
        })
        .collect();

    Ok(StdResponse {
        data: Some(kitchen_orders),
        message: Some("Get kitchen orders successfully"),
    })
}

/// Kitchen staff picks the order up and starts preparing it.
#[utoipa::path(
    patch,
    path = "/orders/{id}/start",
    tags = ["Kitchen"],
    params(
        ("id" = Uuid, Path, description = "Order ID to start preparing")
    ),
    responses(
        (status = 200, description = "Order moved to preparing", body = StdResponse<OrderEntity, String>)
    )
)]
async fn start_preparation(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let updated =
        order_service::update_order_status(conn, user, id, OrderStatus::Preparing).await?;

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Order moved to preparing"),
    })
}

/// Mark the whole order ready. Rejected with a conflict unless every item
/// has been toggled ready first.
#[utoipa::path(
    patch,
    path = "/orders/{id}/ready",
    tags = ["Kitchen"],
    params(
        ("id" = Uuid, Path, description = "Order ID to mark ready")
    ),
    responses(
        (status = 200, description = "Order marked ready", body = StdResponse<OrderEntity, String>),
        (status = 409, description = "Not every item is ready yet", body = StdResponse<String, String>)
    )
)]
async fn mark_ready(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let updated = order_service::update_order_status(conn, user, id, OrderStatus::Ready).await?;

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Order marked ready"),
    })
}

/// Mark the order picked up and delivered to the table. Stamps
/// `completed_at` and settles every item as served.
#[utoipa::path(
    patch,
    path = "/orders/{id}/served",
    tags = ["Kitchen"],
    params(
        ("id" = Uuid, Path, description = "Order ID to mark served")
    ),
    responses(
        (status = 200, description = "Order marked served", body = StdResponse<OrderEntity, String>)
    )
)]
async fn mark_served(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let updated = order_service::update_order_status(conn, user, id, OrderStatus::Served).await?;

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Order marked served"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpdateItemStatusReq {
    item_status: OrderStatus,
}

/// Toggle one item between pending, preparing and ready. Has no cascading
/// effect on the parent order.
#[utoipa::path(
    patch,
    path = "/order-items/{id}",
    tags = ["Kitchen"],
    params(
        ("id" = Uuid, Path, description = "Order item ID to update")
    ),
    request_body = UpdateItemStatusReq,
    responses(
        (status = 200, description = "Item status updated", body = StdResponse<OrderItemEntity, String>)
    )
)]
async fn update_item_status(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<UpdateItemStatusReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let updated = order_service::update_item_status(conn, user, id, body.item_status).await?;

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Item status updated"),
    })
}
