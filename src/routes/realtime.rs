use std::convert::Infallible;

use axum::{
    Extension,
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use utoipa::IntoParams;
use utoipa_axum::router::OpenApiRouter;

use crate::core::{
    app_error::AppError,
    app_state::AppState,
    middleware::{self, CurrentUser, UserRole},
};
use crate::realtime::{ChangeTable, SubscriptionFilter, SubscriptionScope};

/// The change-feed subscription endpoint. One SSE stream per consumer;
/// dropping the connection is the only cancellation, and reconnection is
/// the consumer's responsibility.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/realtime",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(subscribe))
            .route_layer(axum::middleware::from_fn(
                middleware::customers_authorization,
            )),
    )
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct SubscribeQuery {
    /// mine (default), all, or kitchen.
    scope: Option<String>,
}

/// Subscribe to row-change events for one table. Events are delivered
/// at-least-once as they commit; treat each one as "replace by id" or as a
/// trigger to refetch, never as a diff.
#[utoipa::path(
    get,
    path = "/{table}",
    tags = ["Realtime"],
    params(
        ("table" = String, Path, description = "orders, order_items, payments, notifications, menu_items or feedback"),
        SubscribeQuery
    ),
    responses(
        (status = 200, description = "SSE stream of row-change events")
    )
)]
async fn subscribe(
    Path(table): Path<String>,
    Query(query): Query<SubscribeQuery>,
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let table = ChangeTable::parse(&table)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown table {table}")))?;

    let is_staff = matches!(user.role, UserRole::Staff | UserRole::Admin);
    let scope = match query.scope.as_deref().unwrap_or("mine") {
        "mine" => {
            // These tables carry no owner; per-user scoping is meaningless.
            if matches!(table, ChangeTable::OrderItems | ChangeTable::MenuItems) {
                return Err(AppError::BadRequest(format!(
                    "{} cannot be scoped to a user",
                    table.as_str()
                )));
            }
            SubscriptionScope::Mine(user.id)
        }
        "all" => {
            if !is_staff {
                return Err(AppError::ForbiddenResource(
                    "Staff access required for unfiltered subscriptions".to_string(),
                ));
            }
            SubscriptionScope::All
        }
        "kitchen" => {
            if !is_staff {
                return Err(AppError::ForbiddenResource(
                    "Staff access required for the kitchen feed".to_string(),
                ));
            }
            if table != ChangeTable::Orders {
                return Err(AppError::BadRequest(
                    "The kitchen scope only applies to orders".to_string(),
                ));
            }
            SubscriptionScope::Kitchen
        }
        other => {
            return Err(AppError::BadRequest(format!("Unknown scope {other}")));
        }
    };

    let filter = SubscriptionFilter::new(table, scope);
    let rx = state.realtime.subscribe();

    let stream = futures::stream::unfold((rx, filter), |(mut rx, filter)| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if !filter.matches(&event) {
                        continue;
                    }
                    let Ok(payload) = serde_json::to_string(&event) else {
                        continue;
                    };
                    let sse_event = Event::default().event(event.key()).data(payload);
                    return Some((Ok(sse_event), (rx, filter)));
                }
                Err(RecvError::Lagged(skipped)) => {
                    // The subscriber fell behind and skips ahead; it must
                    // refetch current row state rather than trust event
                    // order.
                    tracing::debug!("Realtime subscriber lagged by {skipped} events");
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
