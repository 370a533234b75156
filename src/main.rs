use anyhow::Result;
use axum::Router;
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use smartserve_orderservice::{
    consumers,
    core::{
        bootstrap::{self, bootstrap},
        config, db, swagger,
    },
    routes,
};

/// Migrations embedded into the binary which helps with streamlining image building process
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_tracing();
    bootstrap::init_env();

    let routes = routes::customers::orders::routes_with_openapi()
        .merge(routes::customers::menu::routes_with_openapi())
        .merge(routes::customers::notifications::routes_with_openapi())
        .merge(routes::customers::feedback::routes_with_openapi())
        .merge(routes::kitchen::orders::routes_with_openapi())
        .merge(routes::staff::orders::routes_with_openapi())
        .merge(routes::staff::menu::routes_with_openapi())
        .merge(routes::staff::payments::routes_with_openapi())
        .merge(routes::staff::feedback::routes_with_openapi())
        .merge(routes::staff::audit_logs::routes_with_openapi())
        .merge(routes::staff::users::routes_with_openapi())
        .merge(routes::payments::routes_with_openapi())
        .merge(routes::tables::routes_with_openapi())
        .merge(routes::realtime::routes_with_openapi())
        .merge(routes::chat::routes_with_openapi());

    let mut openapi = routes.get_openapi().clone();
    openapi.info = utoipa::openapi::InfoBuilder::new()
        .title("SmartServe OrderService API")
        .version("1.0.0")
        .build();
    let swagger_ui = swagger::create_swagger_ui(openapi)?;

    let app = Router::new().merge(routes).merge(swagger_ui);

    tracing::info!("Running migrations...");
    let config = config::load()?;
    let migrations_count = db::run_migrations_blocking(MIGRATIONS, &config.database.url).await?;
    tracing::info!("Run {} new migrations successfully", migrations_count);

    tracing::info!("Bootstrapping...");
    bootstrap(
        "OrderService",
        app,
        &[
            ("orders.created", consumers::orders::order_created),
            ("orders.updated", consumers::orders::order_status_changed),
            ("payments.updated", consumers::payments::payment_status_changed),
        ],
    )
    .await?;
    Ok(())
}
