use anyhow::Context;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;
use utoipa_axum::router::OpenApiRouter;

use crate::core::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
};
use crate::models::DiningTableEntity;
use crate::schema::dining_tables;

/// Table lookup for the QR scan flow. Unauthenticated: diners scan the
/// code before they sign in.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/tables",
        OpenApiRouter::new().routes(utoipa_axum::routes!(get_table)),
    )
}

/// Validate a scanned table code and return the table.
#[utoipa::path(
    get,
    path = "/{table_number}",
    tags = ["Tables"],
    params(
        ("table_number" = String, Path, description = "Table number from the QR code")
    ),
    responses(
        (status = 200, description = "Table found", body = StdResponse<DiningTableEntity, String>),
        (status = 404, description = "No active table with this number", body = StdResponse<String, String>)
    )
)]
async fn get_table(
    Path(table_number): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let table: DiningTableEntity = dining_tables::table
        .filter(dining_tables::table_number.eq(&table_number))
        .filter(dining_tables::is_active.eq(true))
        .first(conn)
        .await
        .map_err(|_| AppError::NotFound)?;

    Ok(StdResponse {
        data: Some(table),
        message: Some("Table found"),
    })
}
