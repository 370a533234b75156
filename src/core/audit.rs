use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde_json::Value;
use uuid::Uuid;

use crate::models::CreateAuditLogEntity;
use crate::schema::{audit_logs, outbox};

use super::app_state::AppState;

/// Records one audit trail entry. Called inside the mutating transaction so
/// the entry commits (or rolls back) together with the change it describes.
pub async fn record(
    conn: &mut AsyncPgConnection,
    user_id: Option<Uuid>,
    action: &str,
    table_name: &str,
    record_id: Option<Uuid>,
    old_data: Option<Value>,
    new_data: Option<Value>,
) -> Result<()> {
    diesel::insert_into(audit_logs::table)
        .values(CreateAuditLogEntity {
            user_id,
            action: action.to_string(),
            table_name: table_name.to_string(),
            record_id,
            old_data,
            new_data,
        })
        .execute(conn)
        .await
        .context("Failed to record audit log entry")?;
    Ok(())
}

/// Periodically purges audit entries past the retention window and sweeps
/// dispatched outbox rows.
pub fn spawn_retention_task(state: Arc<AppState>) {
    let interval = Duration::from_secs(state.config.audit.purge_interval_secs);
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            if let Err(err) = purge_expired(&state).await {
                tracing::warn!("Retention purge failed: {err:#}");
            }
        }
    });
}

async fn purge_expired(state: &AppState) -> Result<()> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let retention_days = state.config.audit.retention_days;
    let cutoff = Utc::now() - chrono::Duration::days(retention_days);
    let purged = diesel::delete(audit_logs::table.filter(audit_logs::created_at.lt(cutoff)))
        .execute(conn)
        .await
        .context("Failed to purge audit logs")?;
    if purged > 0 {
        tracing::info!("Purged {purged} audit log entries older than {retention_days} days");
    }

    let outbox_cutoff = Utc::now() - chrono::Duration::days(1);
    let swept = diesel::delete(
        outbox::table
            .filter(outbox::status.ne(super::outbox::STATUS_PENDING))
            .filter(outbox::created_at.lt(outbox_cutoff)),
    )
    .execute(conn)
    .await
    .context("Failed to sweep dispatched outbox events")?;
    if swept > 0 {
        tracing::debug!("Swept {swept} dispatched outbox events");
    }

    Ok(())
}
