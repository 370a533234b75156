//! Transactional outbox: mutating handlers write change events here inside
//! their transaction; the dispatcher relays committed rows to the realtime
//! hub, so an event is only ever visible after its row change is.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;

use crate::realtime::ChangeEvent;
use crate::schema::outbox;

use super::app_state::AppState;

pub const STATUS_PENDING: &str = "PENDING";
pub const STATUS_SENT: &str = "SENT";
pub const STATUS_FAILED: &str = "FAILED";

pub async fn publish<T: Serialize>(
    conn: &mut AsyncPgConnection,
    event_type: String,
    payload: T,
) -> Result<()> {
    let payload = serde_json::to_string(&payload).context("Failed to serialize outbox payload")?;
    diesel::insert_into(outbox::table)
        .values((
            outbox::event_type.eq(event_type),
            outbox::payload.eq(payload),
            outbox::status.eq(STATUS_PENDING),
        ))
        .execute(conn)
        .await
        .context("Failed to insert outbox event")?;
    Ok(())
}

pub fn spawn_dispatcher(state: Arc<AppState>) {
    let interval = Duration::from_millis(state.config.realtime.dispatch_interval_ms);
    tokio::spawn(async move {
        loop {
            if let Err(err) = dispatch_pending(&state).await {
                tracing::warn!("Outbox dispatch failed: {err:#}");
            }
            tokio::time::sleep(interval).await;
        }
    });
}

async fn dispatch_pending(state: &AppState) -> Result<()> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let pending: Vec<(i32, String)> = outbox::table
        .filter(outbox::status.eq(STATUS_PENDING))
        .order_by(outbox::id.asc())
        .limit(100)
        .select((outbox::id, outbox::payload))
        .get_results(conn)
        .await
        .context("Failed to fetch pending outbox events")?;

    for (id, payload) in pending {
        match serde_json::from_str::<ChangeEvent>(&payload) {
            Ok(event) => {
                let receivers = state.realtime.publish(event);
                tracing::debug!("Dispatched outbox event #{id} to {receivers} subscribers");
                mark(conn, id, STATUS_SENT).await?;
            }
            Err(err) => {
                tracing::error!("Dropping malformed outbox payload #{id}: {err}");
                mark(conn, id, STATUS_FAILED).await?;
            }
        }
    }
    Ok(())
}

async fn mark(conn: &mut AsyncPgConnection, id: i32, status: &str) -> Result<()> {
    diesel::update(outbox::table.find(id))
        .set((
            outbox::status.eq(status),
            outbox::updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)
        .await
        .with_context(|| format!("Failed to mark outbox event #{id} as {status}"))?;
    Ok(())
}
