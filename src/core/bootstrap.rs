use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use futures::future::BoxFuture;
use tokio::sync::broadcast::error::RecvError;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::realtime::{ChangeEvent, RealtimeHub};

use super::{app_state::AppState, audit, config, db, outbox};

/// A change-feed consumer, registered against a routing key such as
/// `orders.created`. Failures are logged and never reach the writer that
/// produced the event.
pub type ChangeConsumer = fn(ChangeEvent, Arc<AppState>) -> BoxFuture<'static, Result<()>>;

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

pub fn init_env() {
    if dotenvy::dotenv().is_ok() {
        tracing::debug!("Loaded environment from .env");
    }
}

/// Wires state, background workers, and consumers, then serves the app.
pub async fn bootstrap(
    service_name: &str,
    app: Router<AppState>,
    consumers: &[(&str, ChangeConsumer)],
) -> Result<()> {
    let config = config::load()?;
    let db_pool = db::create_pool(&config.database).await?;
    let realtime = RealtimeHub::new(config.realtime.channel_capacity);

    let state = AppState {
        db_pool,
        http_client: reqwest::Client::new(),
        realtime,
        config: Arc::new(config),
    };
    let shared = Arc::new(state.clone());

    outbox::spawn_dispatcher(shared.clone());
    audit::spawn_retention_task(shared.clone());
    spawn_consumers(shared, consumers);

    let addr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    );
    let app = app.layer(TraceLayer::new_for_http()).with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("{service_name} listening on {addr}");
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

fn spawn_consumers(state: Arc<AppState>, consumers: &[(&str, ChangeConsumer)]) {
    if consumers.is_empty() {
        return;
    }

    let mut routes: HashMap<String, Vec<ChangeConsumer>> = HashMap::new();
    for (key, consumer) in consumers {
        routes.entry((*key).to_string()).or_default().push(*consumer);
    }

    let mut rx = state.realtime.subscribe();
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Consumer loop lagged behind by {skipped} events");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let Some(handlers) = routes.get(&event.key()) else {
                continue;
            };
            for handler in handlers {
                let handler = *handler;
                let event = event.clone();
                let state = state.clone();
                tokio::spawn(async move {
                    let key = event.key();
                    if let Err(err) = handler(event, state).await {
                        tracing::warn!("Consumer for {key} failed: {err:#}");
                    }
                });
            }
        }
    });
}
