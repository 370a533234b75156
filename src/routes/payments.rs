use anyhow::Context;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::core::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    audit, outbox,
};
use crate::domain::types::PaymentStatus;
use crate::models::PaymentEntity;
use crate::realtime::{ChangeEvent, ChangeTable};
use crate::schema::payments;

/// Gateway-facing payment callback. Settlement is simulated: no real
/// gateway sits behind this endpoint.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/payments",
        OpenApiRouter::new().routes(utoipa_axum::routes!(mock_pay)),
    )
}

#[derive(Serialize, ToSchema)]
pub struct MockPayRes {
    updated_payment: PaymentEntity,
}

/// Mock payment settlement for demonstration purposes: marks a pending
/// payment completed and stamps a simulated gateway reference.
#[utoipa::path(
    patch,
    path = "/{id}/mock-pay",
    tags = ["Payments"],
    params(
        ("id" = Uuid, Path, description = "Payment ID to mark as paid")
    ),
    responses(
        (status = 200, description = "Payment successfully marked as paid", body = StdResponse<MockPayRes, String>)
    )
)]
pub async fn mock_pay(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let updated_payment = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let payment: PaymentEntity = payments::table
                    .find(id)
                    .filter(payments::payment_status.eq(PaymentStatus::Pending.as_str()))
                    .get_result(conn)
                    .await
                    .map_err(|_| AppError::NotFound)?;

                let provider_ref = format!("SIM-{}", Uuid::new_v4().simple());
                let updated: PaymentEntity = diesel::update(payments::table.find(id))
                    .set((
                        payments::payment_status.eq(PaymentStatus::Completed.as_str()),
                        payments::provider_ref.eq(provider_ref),
                    ))
                    .returning(PaymentEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to update payment status")?;

                let old_json =
                    serde_json::to_value(&payment).context("Failed to serialize payment")?;
                let new_json =
                    serde_json::to_value(&updated).context("Failed to serialize payment")?;
                let event = ChangeEvent::updated(
                    ChangeTable::Payments,
                    updated.id,
                    updated.user_id,
                    old_json.clone(),
                    new_json.clone(),
                );
                outbox::publish(conn, event.key(), &event).await?;

                audit::record(
                    conn,
                    None,
                    "UPDATE",
                    "payments",
                    Some(id),
                    Some(old_json),
                    Some(new_json),
                )
                .await?;

                Ok::<PaymentEntity, AppError>(updated)
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(MockPayRes { updated_payment }),
        message: Some("Payment paid successfully"),
    })
}
