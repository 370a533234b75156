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
    audit,
    middleware::{self, CurrentUser, UserRole},
};
use crate::models::UserRoleEntity;
use crate::schema::user_roles;

/// Defines the user role management routes. Identity lives in the external
/// auth service; this only governs roles inside the ordering system.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/staff/users",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_user_roles))
            .routes(utoipa_axum::routes!(set_user_role))
            .route_layer(axum::middleware::from_fn(middleware::staff_authorization)),
    )
}

/// Fetch all known user role assignments.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Users"],
    responses(
        (status = 200, description = "List user roles", body = StdResponse<Vec<UserRoleEntity>, String>)
    )
)]
async fn get_user_roles(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let roles: Vec<UserRoleEntity> = user_roles::table
        .order_by(user_roles::created_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get user roles")?;

    Ok(StdResponse {
        data: Some(roles),
        message: Some("Get user roles successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct SetRoleReq {
    role: UserRole,
}

/// Assign or change a user's role. Admin only.
#[utoipa::path(
    put,
    path = "/{user_id}/role",
    tags = ["Users"],
    params(
        ("user_id" = Uuid, Path, description = "User whose role to set")
    ),
    request_body = SetRoleReq,
    responses(
        (status = 200, description = "Role assigned", body = StdResponse<UserRoleEntity, String>)
    )
)]
async fn set_user_role(
    Path(user_id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(actor): Extension<CurrentUser>,
    Json(body): Json<SetRoleReq>,
) -> Result<impl IntoResponse, AppError> {
    if actor.role != UserRole::Admin {
        return Err(AppError::ForbiddenResource(
            "Only admins can assign roles".to_string(),
        ));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let assigned = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let assigned: UserRoleEntity = diesel::insert_into(user_roles::table)
                    .values((
                        user_roles::user_id.eq(user_id),
                        user_roles::role.eq(body.role.as_str()),
                    ))
                    .on_conflict(user_roles::user_id)
                    .do_update()
                    .set(user_roles::role.eq(body.role.as_str()))
                    .returning(UserRoleEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to assign role")?;

                audit::record(
                    conn,
                    Some(actor.id),
                    "UPDATE",
                    "user_roles",
                    Some(user_id),
                    None,
                    Some(serde_json::to_value(&assigned).context("Failed to serialize role")?),
                )
                .await?;

                Ok::<UserRoleEntity, AppError>(assigned)
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(assigned),
        message: Some("Role assigned successfully"),
    })
}
