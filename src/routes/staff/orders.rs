use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::core::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    middleware::{self, CurrentUser},
};
use crate::domain::status::OrderStatus;
use crate::models::OrderEntity;
use crate::schema::orders;
use crate::services::orders::{self as order_service, OrderAggregate};

/// Defines the staff/admin order routes: full listing, status management
/// and aggregate statistics.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/staff/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_orders))
            .routes(utoipa_axum::routes!(get_order_statistics))
            .routes(utoipa_axum::routes!(update_order_status))
            .route_layer(axum::middleware::from_fn(middleware::staff_authorization)),
    )
}

/// Fetch all orders in the system with nested items and payments, newest
/// first.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Orders"],
    responses(
        (status = 200, description = "List all orders", body = StdResponse<Vec<OrderAggregate>, String>)
    )
)]
async fn get_orders(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order_headers: Vec<OrderEntity> = orders::table
        .order_by(orders::created_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get orders")?;

    let aggregates = order_service::load_aggregates(conn, order_headers).await?;

    Ok(StdResponse {
        data: Some(aggregates),
        message: Some("Get orders successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpdateOrderStatusReq {
    status: OrderStatus,
}

/// Move an order through its lifecycle. Transitions are validated against
/// the status machine; `ready` requires every item ready; `served` stamps
/// the completion time.
#[utoipa::path(
    patch,
    path = "/{id}/status",
    tags = ["Orders"],
    params(
        ("id" = Uuid, Path, description = "Order ID to update")
    ),
    request_body = UpdateOrderStatusReq,
    responses(
        (status = 200, description = "Order status updated", body = StdResponse<OrderEntity, String>),
        (status = 409, description = "Illegal status transition", body = StdResponse<String, String>)
    )
)]
async fn update_order_status(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<UpdateOrderStatusReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let updated = order_service::update_order_status(conn, user, id, body.status).await?;

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Order status updated"),
    })
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct StatisticsQuery {
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
}

#[derive(Serialize, Default, Debug, PartialEq, ToSchema)]
struct StatusCounts {
    pending: i64,
    confirmed: i64,
    preparing: i64,
    ready: i64,
    served: i64,
    cancelled: i64,
}

#[derive(Serialize, Debug, PartialEq, ToSchema)]
struct OrderStatisticsRes {
    total_orders: i64,
    /// Sum of total_amount over non-cancelled orders.
    total_revenue: f64,
    average_order_value: f64,
    /// Mean minutes between creation and completion of served orders.
    average_fulfilment_minutes: Option<f64>,
    status_counts: StatusCounts,
}

/// Aggregate order statistics over an optional date range.
#[utoipa::path(
    get,
    path = "/statistics",
    tags = ["Orders"],
    params(StatisticsQuery),
    responses(
        (status = 200, description = "Order statistics", body = StdResponse<OrderStatisticsRes, String>)
    )
)]
async fn get_order_statistics(
    Query(query): Query<StatisticsQuery>,
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut rows_query = orders::table
        .select((
            orders::status,
            orders::total_amount,
            orders::created_at,
            orders::completed_at,
        ))
        .into_boxed();
    if let Some(start) = query.start_date {
        rows_query = rows_query.filter(orders::created_at.ge(start));
    }
    if let Some(end) = query.end_date {
        rows_query = rows_query.filter(orders::created_at.le(end));
    }

    let rows: Vec<StatisticsRow> = rows_query
        .get_results(conn)
        .await
        .context("Failed to get orders for statistics")?;

    Ok(StdResponse {
        data: Some(compute_statistics(&rows)),
        message: Some("Get order statistics successfully"),
    })
}

type StatisticsRow = (String, f64, DateTime<Utc>, Option<DateTime<Utc>>);

fn compute_statistics(rows: &[StatisticsRow]) -> OrderStatisticsRes {
    let mut counts = StatusCounts::default();
    let mut revenue = 0.0;
    let mut billed_orders: i64 = 0;
    let mut fulfilment_minutes = 0.0;
    let mut served_with_completion: i64 = 0;

    for (status, total_amount, created_at, completed_at) in rows {
        match OrderStatus::parse(status) {
            Some(OrderStatus::Pending) => counts.pending += 1,
            Some(OrderStatus::Confirmed) => counts.confirmed += 1,
            Some(OrderStatus::Preparing) => counts.preparing += 1,
            Some(OrderStatus::Ready) => counts.ready += 1,
            Some(OrderStatus::Served) => counts.served += 1,
            Some(OrderStatus::Cancelled) => counts.cancelled += 1,
            None => {}
        }

        if OrderStatus::parse(status) != Some(OrderStatus::Cancelled) {
            revenue += total_amount;
            billed_orders += 1;
        }

        if let Some(completed_at) = completed_at {
            if OrderStatus::parse(status) == Some(OrderStatus::Served) {
                fulfilment_minutes += (*completed_at - *created_at).num_seconds() as f64 / 60.0;
                served_with_completion += 1;
            }
        }
    }

    OrderStatisticsRes {
        total_orders: rows.len() as i64,
        total_revenue: crate::domain::money::round2(revenue),
        average_order_value: if billed_orders > 0 {
            crate::domain::money::round2(revenue / billed_orders as f64)
        } else {
            0.0
        },
        average_fulfilment_minutes: if served_with_completion > 0 {
            Some(crate::domain::money::round2(
                fulfilment_minutes / served_with_completion as f64,
            ))
        } else {
            None
        },
        status_counts: counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn row(status: &str, total: f64, minutes_to_complete: Option<i64>) -> StatisticsRow {
        let created = Utc::now();
        (
            status.to_string(),
            total,
            created,
            minutes_to_complete.map(|m| created + Duration::minutes(m)),
        )
    }

    #[test]
    fn cancelled_orders_are_excluded_from_revenue() {
        let rows = vec![
            row("served", 100.0, Some(20)),
            row("pending", 50.0, None),
            row("cancelled", 500.0, None),
        ];
        let stats = compute_statistics(&rows);

        assert_eq!(stats.total_orders, 3);
        assert_eq!(stats.total_revenue, 150.0);
        assert_eq!(stats.average_order_value, 75.0);
        assert_eq!(stats.status_counts.served, 1);
        assert_eq!(stats.status_counts.cancelled, 1);
        assert_eq!(stats.average_fulfilment_minutes, Some(20.0));
    }

    #[test]
    fn empty_range_yields_zeroes() {
        let stats = compute_statistics(&[]);
        assert_eq!(stats.total_orders, 0);
        assert_eq!(stats.total_revenue, 0.0);
        assert_eq!(stats.average_order_value, 0.0);
        assert_eq!(stats.average_fulfilment_minutes, None);
    }
}
