use anyhow::Context;
use axum::{
    Extension,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::core::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    middleware::{self, CurrentUser},
    outbox,
};
use crate::models::NotificationEntity;
use crate::realtime::{ChangeEvent, ChangeTable};
use crate::schema::notifications;

/// Defines the notification bell routes for the authenticated user.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/customers/notifications",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_notifications))
            .routes(utoipa_axum::routes!(get_unread_count))
            .routes(utoipa_axum::routes!(mark_read))
            .routes(utoipa_axum::routes!(mark_all_read))
            .routes(utoipa_axum::routes!(delete_notification))
            .route_layer(axum::middleware::from_fn(
                middleware::customers_authorization,
            )),
    )
}

/// Fetch the authenticated user's notifications, newest first.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Notifications"],
    responses(
        (status = 200, description = "List my notifications", body = StdResponse<Vec<NotificationEntity>, String>)
    )
)]
async fn get_notifications(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let rows: Vec<NotificationEntity> = notifications::table
        .filter(notifications::user_id.eq(user.id))
        .order_by(notifications::created_at.desc())
        .limit(100)
        .get_results(conn)
        .await
        .context("Failed to get notifications")?;

    Ok(StdResponse {
        data: Some(rows),
        message: Some("Get notifications successfully"),
    })
}

/// Count of the authenticated user's unread notifications.
#[utoipa::path(
    get,
    path = "/unread-count",
    tags = ["Notifications"],
    responses(
        (status = 200, description = "Unread notification count", body = StdResponse<i64, String>)
    )
)]
async fn get_unread_count(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let unread: i64 = notifications::table
        .filter(notifications::user_id.eq(user.id))
        .filter(notifications::read.eq(false))
        .count()
        .get_result(conn)
        .await
        .context("Failed to count unread notifications")?;

    Ok(StdResponse {
        data: Some(unread),
        message: Some("Get unread count successfully"),
    })
}

/// Mark one notification as read.
#[utoipa::path(
    patch,
    path = "/{id}/read",
    tags = ["Notifications"],
    params(
        ("id" = Uuid, Path, description = "Notification ID to mark read")
    ),
    responses(
        (status = 200, description = "Notification marked read", body = StdResponse<NotificationEntity, String>)
    )
)]
async fn mark_read(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let updated = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let old: NotificationEntity = notifications::table
                    .find(id)
                    .filter(notifications::user_id.eq(user.id))
                    .get_result(conn)
                    .await
                    .map_err(|_| AppError::NotFound)?;

                let updated: NotificationEntity =
                    diesel::update(notifications::table.find(id))
                        .set(notifications::read.eq(true))
                        .returning(NotificationEntity::as_returning())
                        .get_result(conn)
                        .await
                        .context("Failed to mark notification read")?;

                let event = ChangeEvent::updated(
                    ChangeTable::Notifications,
                    updated.id,
                    Some(updated.user_id),
                    serde_json::to_value(&old).context("Failed to serialize notification")?,
                    serde_json::to_value(&updated).context("Failed to serialize notification")?,
                );
                outbox::publish(conn, event.key(), &event).await?;

                Ok::<NotificationEntity, AppError>(updated)
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Notification marked read"),
    })
}

/// Mark every unread notification as read. Idempotent: running it again
/// changes nothing.
#[utoipa::path(
    patch,
    path = "/read-all",
    tags = ["Notifications"],
    responses(
        (status = 200, description = "All notifications marked read", body = StdResponse<Vec<NotificationEntity>, String>)
    )
)]
async fn mark_all_read(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let updated = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let updated: Vec<NotificationEntity> = diesel::update(
                    notifications::table
                        .filter(notifications::user_id.eq(user.id))
                        .filter(notifications::read.eq(false)),
                )
                .set(notifications::read.eq(true))
                .returning(NotificationEntity::as_returning())
                .get_results(conn)
                .await
                .context("Failed to mark notifications read")?;

                for notification in &updated {
                    let event = ChangeEvent::updated(
                        ChangeTable::Notifications,
                        notification.id,
                        Some(notification.user_id),
                        serde_json::Value::Null,
                        serde_json::to_value(notification)
                            .context("Failed to serialize notification")?,
                    );
                    outbox::publish(conn, event.key(), &event).await?;
                }

                Ok::<Vec<NotificationEntity>, AppError>(updated)
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(updated),
        message: Some("All notifications marked read"),
    })
}

/// Delete one notification.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Notifications"],
    params(
        ("id" = Uuid, Path, description = "Notification ID to delete")
    ),
    responses(
        (status = 200, description = "Notification deleted", body = StdResponse<NotificationEntity, String>)
    )
)]
async fn delete_notification(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let deleted = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let deleted: NotificationEntity = diesel::delete(
                    notifications::table
                        .find(id)
                        .filter(notifications::user_id.eq(user.id)),
                )
                .returning(NotificationEntity::as_returning())
                .get_result(conn)
                .await
                .map_err(|_| AppError::NotFound)?;

                let event = ChangeEvent::deleted(
                    ChangeTable::Notifications,
                    deleted.id,
                    Some(deleted.user_id),
                    serde_json::to_value(&deleted).context("Failed to serialize notification")?,
                );
                outbox::publish(conn, event.key(), &event).await?;

                Ok::<NotificationEntity, AppError>(deleted)
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(deleted),
        message: Some("Notification deleted"),
    })
}
