use anyhow::Context;
use axum::{
    Extension, Json,
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
    audit,
    middleware::{self, CurrentUser},
    outbox,
};
use crate::models::{
    CreateMenuCategoryEntity, CreateMenuItemEntity, MenuCategoryEntity, MenuItemEntity,
    UpdateMenuCategoryEntity, UpdateMenuItemEntity,
};
use crate::realtime::{ChangeEvent, ChangeTable};
use crate::schema::{menu_categories, menu_items};

/// Defines the staff menu management routes (category and item CRUD).
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/staff/menu",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(list_categories))
            .routes(utoipa_axum::routes!(create_category))
            .routes(utoipa_axum::routes!(update_category))
            .routes(utoipa_axum::routes!(delete_category))
            .routes(utoipa_axum::routes!(list_items))
            .routes(utoipa_axum::routes!(create_item))
            .routes(utoipa_axum::routes!(update_item))
            .routes(utoipa_axum::routes!(delete_item))
            .route_layer(axum::middleware::from_fn(middleware::staff_authorization)),
    )
}

/// Fetch all menu categories, including inactive ones.
#[utoipa::path(
    get,
    path = "/categories",
    tags = ["Menu"],
    responses(
        (status = 200, description = "List menu categories", body = StdResponse<Vec<MenuCategoryEntity>, String>)
    )
)]
async fn list_categories(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let categories: Vec<MenuCategoryEntity> = menu_categories::table
        .order_by(menu_categories::display_order.asc())
        .get_results(conn)
        .await
        .context("Failed to get menu categories")?;

    Ok(StdResponse {
        data: Some(categories),
        message: Some("Get menu categories successfully"),
    })
}

/// Create a menu category.
#[utoipa::path(
    post,
    path = "/categories",
    tags = ["Menu"],
    request_body = CreateMenuCategoryEntity,
    responses(
        (status = 200, description = "Created menu category", body = StdResponse<MenuCategoryEntity, String>)
    )
)]
async fn create_category(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateMenuCategoryEntity>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let created = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let created: MenuCategoryEntity = diesel::insert_into(menu_categories::table)
                    .values(body)
                    .returning(MenuCategoryEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to create menu category")?;

                audit::record(
                    conn,
                    Some(user.id),
                    "INSERT",
                    "menu_categories",
                    Some(created.id),
                    None,
                    Some(serde_json::to_value(&created).context("Failed to serialize category")?),
                )
                .await?;

                Ok::<MenuCategoryEntity, AppError>(created)
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(created),
        message: Some("Created menu category successfully"),
    })
}

/// Update a menu category. Only the supplied fields change.
#[utoipa::path(
    patch,
    path = "/categories/{id}",
    tags = ["Menu"],
    params(
        ("id" = Uuid, Path, description = "Category ID to update")
    ),
    request_body = UpdateMenuCategoryEntity,
    responses(
        (status = 200, description = "Updated menu category", body = StdResponse<MenuCategoryEntity, String>)
    )
)]
async fn update_category(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<UpdateMenuCategoryEntity>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let updated = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let old: MenuCategoryEntity = menu_categories::table
                    .find(id)
                    .get_result(conn)
                    .await
                    .map_err(|_| AppError::NotFound)?;

                let updated: MenuCategoryEntity =
                    diesel::update(menu_categories::table.find(id))
                        .set(body)
                        .returning(MenuCategoryEntity::as_returning())
                        .get_result(conn)
                        .await
                        .context("Failed to update menu category")?;

                audit::record(
                    conn,
                    Some(user.id),
                    "UPDATE",
                    "menu_categories",
                    Some(id),
                    Some(serde_json::to_value(&old).context("Failed to serialize category")?),
                    Some(serde_json::to_value(&updated).context("Failed to serialize category")?),
                )
                .await?;

                Ok::<MenuCategoryEntity, AppError>(updated)
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Updated menu category successfully"),
    })
}

/// Delete a menu category. Fails with a conflict while items still
/// reference it.
#[utoipa::path(
    delete,
    path = "/categories/{id}",
    tags = ["Menu"],
    params(
        ("id" = Uuid, Path, description = "Category ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted menu category", body = StdResponse<MenuCategoryEntity, String>)
    )
)]
async fn delete_category(
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
                let deleted: MenuCategoryEntity =
                    diesel::delete(menu_categories::table.find(id))
                        .returning(MenuCategoryEntity::as_returning())
                        .get_result(conn)
                        .await?;

                audit::record(
                    conn,
                    Some(user.id),
                    "DELETE",
                    "menu_categories",
                    Some(id),
                    Some(serde_json::to_value(&deleted).context("Failed to serialize category")?),
                    None,
                )
                .await?;

                Ok::<MenuCategoryEntity, AppError>(deleted)
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(deleted),
        message: Some("Deleted menu category successfully"),
    })
}

/// Fetch all menu items, including unavailable ones.
#[utoipa::path(
    get,
    path = "/items",
    tags = ["Menu"],
    responses(
        (status = 200, description = "List menu items", body = StdResponse<Vec<MenuItemEntity>, String>)
    )
)]
async fn list_items(
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let items: Vec<MenuItemEntity> = menu_items::table
        .order_by((menu_items::category_id.asc(), menu_items::display_order.asc()))
        .get_results(conn)
        .await
        .context("Failed to get menu items")?;

    Ok(StdResponse {
        data: Some(items),
        message: Some("Get menu items successfully"),
    })
}

/// Create a menu item.
#[utoipa::path(
    post,
    path = "/items",
    tags = ["Menu"],
    request_body = CreateMenuItemEntity,
    responses(
        (status = 200, description = "Created menu item", body = StdResponse<MenuItemEntity, String>)
    )
)]
async fn create_item(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateMenuItemEntity>,
) -> Result<impl IntoResponse, AppError> {
    if body.price < 0.0 {
        return Err(AppError::BadRequest("Price cannot be negative".to_string()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let created = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let created: MenuItemEntity = diesel::insert_into(menu_items::table)
                    .values(body)
                    .returning(MenuItemEntity::as_returning())
                    .get_result(conn)
                    .await?;

                let created_json =
                    serde_json::to_value(&created).context("Failed to serialize menu item")?;
                let event = ChangeEvent::created(
                    ChangeTable::MenuItems,
                    created.id,
                    None,
                    created_json.clone(),
                );
                outbox::publish(conn, event.key(), &event).await?;

                audit::record(
                    conn,
                    Some(user.id),
                    "INSERT",
                    "menu_items",
                    Some(created.id),
                    None,
                    Some(created_json),
                )
                .await?;

                Ok::<MenuItemEntity, AppError>(created)
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(created),
        message: Some("Created menu item successfully"),
    })
}

/// Update a menu item, including price and availability. Orders keep the
/// prices they were created with.
#[utoipa::path(
    patch,
    path = "/items/{id}",
    tags = ["Menu"],
    params(
        ("id" = Uuid, Path, description = "Menu item ID to update")
    ),
    request_body = UpdateMenuItemEntity,
    responses(
        (status = 200, description = "Updated menu item", body = StdResponse<MenuItemEntity, String>)
    )
)]
async fn update_item(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<UpdateMenuItemEntity>,
) -> Result<impl IntoResponse, AppError> {
    if matches!(body.price, Some(price) if price < 0.0) {
        return Err(AppError::BadRequest("Price cannot be negative".to_string()));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let updated = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let old: MenuItemEntity = menu_items::table
                    .find(id)
                    .get_result(conn)
                    .await
                    .map_err(|_| AppError::NotFound)?;

                let updated: MenuItemEntity = diesel::update(menu_items::table.find(id))
                    .set(body)
                    .returning(MenuItemEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to update menu item")?;

                let old_json =
                    serde_json::to_value(&old).context("Failed to serialize menu item")?;
                let updated_json =
                    serde_json::to_value(&updated).context("Failed to serialize menu item")?;
                let event = ChangeEvent::updated(
                    ChangeTable::MenuItems,
                    updated.id,
                    None,
                    old_json.clone(),
                    updated_json.clone(),
                );
                outbox::publish(conn, event.key(), &event).await?;

                audit::record(
                    conn,
                    Some(user.id),
                    "UPDATE",
                    "menu_items",
                    Some(id),
                    Some(old_json),
                    Some(updated_json),
                )
                .await?;

                Ok::<MenuItemEntity, AppError>(updated)
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(updated),
        message: Some("Updated menu item successfully"),
    })
}

/// Delete a menu item. Fails with a conflict once the item has been
/// ordered, since order history references it.
#[utoipa::path(
    delete,
    path = "/items/{id}",
    tags = ["Menu"],
    params(
        ("id" = Uuid, Path, description = "Menu item ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted menu item", body = StdResponse<MenuItemEntity, String>)
    )
)]
async fn delete_item(
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
                let deleted: MenuItemEntity = diesel::delete(menu_items::table.find(id))
                    .returning(MenuItemEntity::as_returning())
                    .get_result(conn)
                    .await?;

                let deleted_json =
                    serde_json::to_value(&deleted).context("Failed to serialize menu item")?;
                let event =
                    ChangeEvent::deleted(ChangeTable::MenuItems, deleted.id, None, deleted_json.clone());
                outbox::publish(conn, event.key(), &event).await?;

                audit::record(
                    conn,
                    Some(user.id),
                    "DELETE",
                    "menu_items",
                    Some(id),
                    Some(deleted_json),
                    None,
                )
                .await?;

                Ok::<MenuItemEntity, AppError>(deleted)
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(deleted),
        message: Some("Deleted menu item successfully"),
    })
}
