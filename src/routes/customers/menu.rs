use std::collections::HashMap;

use anyhow::Context;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::core::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
};
use crate::models::{MenuCategoryEntity, MenuItemEntity};
use crate::schema::{menu_categories, menu_items};

/// Customer-facing menu: active categories with their available items.
/// Unauthenticated so diners can browse straight from the table QR code.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/customers/menu",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_menu))
            .routes(utoipa_axum::routes!(get_menu_item)),
    )
}

#[derive(Serialize, ToSchema)]
struct MenuCategoryRes {
    category: MenuCategoryEntity,
    items: Vec<MenuItemEntity>,
}

/// Fetch the menu: active categories in display order, each with its
/// available items.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Menu"],
    responses(
        (status = 200, description = "Get menu successfully", body = StdResponse<Vec<MenuCategoryRes>, String>)
    )
)]
async fn get_menu(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let categories: Vec<MenuCategoryEntity> = menu_categories::table
        .filter(menu_categories::is_active.eq(true))
        .order_by(menu_categories::display_order.asc())
        .get_results(conn)
        .await
        .context("Failed to get menu categories")?;

    let category_ids: Vec<Uuid> = categories.iter().map(|category| category.id).collect();
    let items: Vec<MenuItemEntity> = menu_items::table
        .filter(menu_items::category_id.eq_any(&category_ids))
        .filter(menu_items::is_available.eq(true))
        .order_by(menu_items::display_order.asc())
        .get_results(conn)
        .await
        .context("Failed to get menu items")?;

    let mut items_by_category: HashMap<Uuid, Vec<MenuItemEntity>> = HashMap::new();
    for item in items {
        items_by_category
            .entry(item.category_id)
            .or_default()
            .push(item);
    }

    let menu: Vec<MenuCategoryRes> = categories
        .into_iter()
        .map(|category| MenuCategoryRes {
            items: items_by_category.remove(&category.id).unwrap_or_default(),
            category,
        })
        .collect();

    Ok(StdResponse {
        data: Some(menu),
        message: Some("Get menu successfully"),
    })
}

/// Fetch a single available menu item.
#[utoipa::path(
    get,
    path = "/items/{id}",
    tags = ["Menu"],
    params(
        ("id" = Uuid, Path, description = "Menu item ID to fetch")
    ),
    responses(
        (status = 200, description = "Get menu item successfully", body = StdResponse<MenuItemEntity, String>)
    )
)]
async fn get_menu_item(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let item: MenuItemEntity = menu_items::table
        .find(id)
        .filter(menu_items::is_available.eq(true))
        .get_result(conn)
        .await
        .map_err(|_| AppError::NotFound)?;

    Ok(StdResponse {
        data: Some(item),
        message: Some("Get menu item successfully"),
    })
}
