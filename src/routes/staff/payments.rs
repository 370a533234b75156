use std::collections::HashMap;

use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::core::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    audit,
    middleware::{self, CurrentUser},
    outbox,
};
use crate::domain::{money, types::PaymentStatus};
use crate::models::{OrderEntity, PaymentEntity};
use crate::realtime::{ChangeEvent, ChangeTable};
use crate::schema::{orders, payments};

/// Defines the staff payment routes: listing and refunds.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/staff/payments",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_payments))
            .routes(utoipa_axum::routes!(process_refund))
            .route_layer(axum::middleware::from_fn(middleware::staff_authorization)),
    )
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct PaymentsQuery {
    /// Optional payment status filter: pending, completed, failed, refunded.
    status: Option<String>,
}

#[derive(Serialize, ToSchema)]
struct PaymentWithOrderRes {
    payment: PaymentEntity,
    order: Option<OrderEntity>,
}

/// Fetch all payments with their orders, newest first.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Payments"],
    params(PaymentsQuery),
    responses(
        (status = 200, description = "List payments", body = StdResponse<Vec<PaymentWithOrderRes>, String>)
    )
)]
async fn get_payments(
    Query(query): Query<PaymentsQuery>,
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let status_filter = match query.status.as_deref() {
        Some(raw) => Some(
            PaymentStatus::parse(raw)
                .ok_or_else(|| AppError::BadRequest(format!("{raw} is not a payment status")))?,
        ),
        None => None,
    };

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut payments_query = payments::table
        .order_by(payments::created_at.desc())
        .into_boxed();
    if let Some(status) = status_filter {
        payments_query = payments_query.filter(payments::payment_status.eq(status.as_str()));
    }

    let payment_rows: Vec<PaymentEntity> = payments_query
        .get_results(conn)
        .await
        .context("Failed to get payments")?;

    let order_ids: Vec<Uuid> = payment_rows.iter().map(|payment| payment.order_id).collect();
    let order_rows: Vec<OrderEntity> = orders::table
        .filter(orders::id.eq_any(&order_ids))
        .get_results(conn)
        .await
        .context("Failed to get orders")?;
    let mut orders_by_id: HashMap<Uuid, OrderEntity> =
        order_rows.into_iter().map(|order| (order.id, order)).collect();

    let payments_with_orders: Vec<PaymentWithOrderRes> = payment_rows
        .into_iter()
        .map(|payment| PaymentWithOrderRes {
            order: orders_by_id.remove(&payment.order_id),
            payment,
        })
        .collect();

    Ok(StdResponse {
        data: Some(payments_with_orders),
        message: Some("Get payments successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct RefundReq {
    amount: f64,
    reason: String,
}

/// Refund a completed payment, fully or partially.
#[utoipa::path(
    post,
    path = "/{id}/refund",
    tags = ["Payments"],
    params(
        ("id" = Uuid, Path, description = "Payment ID to refund")
    ),
    request_body = RefundReq,
    responses(
        (status = 200, description = "Payment refunded", body = StdResponse<PaymentEntity, String>)
    )
)]
async fn process_refund(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<RefundReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.amount <= 0.0 {
        return Err(AppError::BadRequest(
            "Refund amount must be positive".to_string(),
        ));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let refunded = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let payment: PaymentEntity = payments::table
                    .find(id)
                    .get_result(conn)
                    .await
                    .map_err(|_| AppError::NotFound)?;

                if payment.payment_status != PaymentStatus::Completed.as_str() {
                    return Err(AppError::Conflict(format!(
                        "Only completed payments can be refunded, this one is {}",
                        payment.payment_status
                    )));
                }
                if body.amount > payment.amount {
                    return Err(AppError::BadRequest(
                        "Refund cannot exceed the paid amount".to_string(),
                    ));
                }

                let refunded: PaymentEntity = diesel::update(payments::table.find(id))
                    .set((
                        payments::payment_status.eq(PaymentStatus::Refunded.as_str()),
                        payments::refund_amount.eq(money::round2(body.amount)),
                        payments::refund_reason.eq(body.reason),
                    ))
                    .returning(PaymentEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to refund payment")?;

                let old_json =
                    serde_json::to_value(&payment).context("Failed to serialize payment")?;
                let new_json =
                    serde_json::to_value(&refunded).context("Failed to serialize payment")?;
                let event = ChangeEvent::updated(
                    ChangeTable::Payments,
                    refunded.id,
                    refunded.user_id,
                    old_json.clone(),
                    new_json.clone(),
                );
                outbox::publish(conn, event.key(), &event).await?;

                audit::record(
                    conn,
                    Some(user.id),
                    "UPDATE",
                    "payments",
                    Some(id),
                    Some(old_json),
                    Some(new_json),
                )
                .await?;

                Ok::<PaymentEntity, AppError>(refunded)
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(refunded),
        message: Some("Payment refunded successfully"),
    })
}
