use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::core::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    middleware::{self, CurrentUser},
    outbox,
};
use crate::models::{CreateFeedbackEntity, FeedbackEntity};
use crate::realtime::{ChangeEvent, ChangeTable};
use crate::schema::{feedback, orders};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/customers/feedback",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(create_feedback))
            .routes(utoipa_axum::routes!(mark_helpful))
            .route_layer(axum::middleware::from_fn(
                middleware::customers_authorization,
            )),
    )
}

#[derive(Deserialize, ToSchema)]
struct CreateFeedbackReq {
    order_id: Uuid,
    rating: i32,
    food_rating: Option<i32>,
    service_rating: Option<i32>,
    review_text: Option<String>,
}

fn valid_rating(rating: i32) -> bool {
    (1..=5).contains(&rating)
}

/// Leave feedback on one of the authenticated customer's own orders.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Feedback"],
    request_body = CreateFeedbackReq,
    responses(
        (status = 200, description = "Created feedback successfully", body = StdResponse<FeedbackEntity, String>)
    )
)]
async fn create_feedback(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateFeedbackReq>,
) -> Result<impl IntoResponse, AppError> {
    if !valid_rating(body.rating) {
        return Err(AppError::BadRequest(
            "Rating must be between 1 and 5".to_string(),
        ));
    }
    for sub_rating in [body.food_rating, body.service_rating].into_iter().flatten() {
        if !valid_rating(sub_rating) {
            return Err(AppError::BadRequest(
                "Ratings must be between 1 and 5".to_string(),
            ));
        }
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let owned: i64 = orders::table
        .find(body.order_id)
        .filter(orders::user_id.eq(user.id))
        .count()
        .get_result(conn)
        .await
        .context("Failed to look up order")?;
    if owned == 0 {
        return Err(AppError::NotFound);
    }

    let created = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let created: FeedbackEntity = diesel::insert_into(feedback::table)
                    .values(CreateFeedbackEntity {
                        order_id: body.order_id,
                        user_id: user.id,
                        rating: body.rating,
                        food_rating: body.food_rating,
                        service_rating: body.service_rating,
                        review_text: body.review_text,
                    })
                    .returning(FeedbackEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to create feedback")?;

                let event = ChangeEvent::created(
                    ChangeTable::Feedback,
                    created.id,
                    Some(created.user_id),
                    serde_json::to_value(&created).context("Failed to serialize feedback")?,
                );
                outbox::publish(conn, event.key(), &event).await?;

                Ok::<FeedbackEntity, AppError>(created)
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(created),
        message: Some("Created feedback successfully"),
    })
}

/// Upvote a review as helpful.
#[utoipa::path(
    post,
    path = "/{id}/helpful",
    tags = ["Feedback"],
    params(
        ("id" = Uuid, Path, description = "Feedback ID to upvote")
    ),
    responses(
        (status = 200, description = "Helpful count incremented", body = StdResponse<FeedbackEntity, String>)
    )
)]
async fn mark_helpful(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let updated: FeedbackEntity = diesel::update(feedback::table.find(id))
        .set(feedback::is_helpful_count.eq(feedback::is_helpful_count + 1))
        .returning(FeedbackEntity::as_returning())
        .get_result(conn)
        .await
        .map_err(|_| AppError::NotFound)?;

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Helpful count incremented"),
    })
}

#[cfg(test)]
mod tests {
    use super::valid_rating;

    #[test]
    fn ratings_outside_one_to_five_are_invalid() {
        assert!(valid_rating(1));
        assert!(valid_rating(5));
        assert!(!valid_rating(0));
        assert!(!valid_rating(6));
    }
}
