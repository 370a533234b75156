use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::core::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    audit,
    middleware::{self, CurrentUser},
};
use crate::models::FeedbackEntity;
use crate::schema::feedback;

/// Defines the staff feedback review routes.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/staff/feedback",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_feedback))
            .routes(utoipa_axum::routes!(respond_to_feedback))
            .route_layer(axum::middleware::from_fn(middleware::staff_authorization)),
    )
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct FeedbackQuery {
    /// Only feedback with this exact rating.
    rating: Option<i32>,
    /// true: only answered feedback; false: only unanswered.
    has_response: Option<bool>,
}

/// Fetch customer feedback, newest first, with optional rating and
/// answered/unanswered filters.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Feedback"],
    params(FeedbackQuery),
    responses(
        (status = 200, description = "List feedback", body = StdResponse<Vec<FeedbackEntity>, String>)
    )
)]
async fn get_feedback(
    Query(query): Query<FeedbackQuery>,
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut feedback_query = feedback::table
        .order_by(feedback::created_at.desc())
        .into_boxed();
    if let Some(rating) = query.rating {
        feedback_query = feedback_query.filter(feedback::rating.eq(rating));
    }
    if let Some(has_response) = query.has_response {
        feedback_query = if has_response {
            feedback_query.filter(feedback::admin_response.is_not_null())
        } else {
            feedback_query.filter(feedback::admin_response.is_null())
        };
    }

    let rows: Vec<FeedbackEntity> = feedback_query
        .get_results(conn)
        .await
        .context("Failed to get feedback")?;

    Ok(StdResponse {
        data: Some(rows),
        message: Some("Get feedback successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct RespondReq {
    response: String,
}

/// Attach an admin response to a piece of feedback.
#[utoipa::path(
    patch,
    path = "/{id}/respond",
    tags = ["Feedback"],
    params(
        ("id" = Uuid, Path, description = "Feedback ID to respond to")
    ),
    request_body = RespondReq,
    responses(
        (status = 200, description = "Response recorded", body = StdResponse<FeedbackEntity, String>)
    )
)]
async fn respond_to_feedback(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<RespondReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.response.trim().is_empty() {
        return Err(AppError::BadRequest("Response cannot be empty".to_string()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let updated = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let old: FeedbackEntity = feedback::table
                    .find(id)
                    .get_result(conn)
                    .await
                    .map_err(|_| AppError::NotFound)?;

                let updated: FeedbackEntity = diesel::update(feedback::table.find(id))
                    .set(feedback::admin_response.eq(body.response))
                    .returning(FeedbackEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to respond to feedback")?;

                audit::record(
                    conn,
                    Some(user.id),
                    "UPDATE",
                    "feedback",
                    Some(id),
                    Some(serde_json::to_value(&old).context("Failed to serialize feedback")?),
                    Some(serde_json::to_value(&updated).context("Failed to serialize feedback")?),
                )
                .await?;

                Ok::<FeedbackEntity, AppError>(updated)
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Response recorded successfully"),
    })
}
