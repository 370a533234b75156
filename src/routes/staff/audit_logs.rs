use std::collections::HashMap;

use anyhow::Context;
use axum::{
    Extension,
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::core::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    middleware::{self, CurrentUser},
};
use crate::models::AuditLogEntity;
use crate::schema::audit_logs;

/// Defines the staff audit-trail viewer routes.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/staff/audit-logs",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_audit_logs))
            .routes(utoipa_axum::routes!(get_audit_statistics))
            .route_layer(axum::middleware::from_fn(middleware::staff_authorization)),
    )
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct AuditLogsQuery {
    user_id: Option<Uuid>,
    /// INSERT, UPDATE or DELETE.
    action: Option<String>,
    table_name: Option<String>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    limit: Option<i64>,
}

/// Fetch audit log entries, newest first, with optional filters.
#[utoipa::path(
    get,
    path = "/",
    tags = ["AuditLogs"],
    params(AuditLogsQuery),
    responses(
        (status = 200, description = "List audit logs", body = StdResponse<Vec<AuditLogEntity>, String>)
    )
)]
async fn get_audit_logs(
    Query(query): Query<AuditLogsQuery>,
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut logs_query = audit_logs::table
        .order_by(audit_logs::created_at.desc())
        .into_boxed();
    if let Some(user_id) = query.user_id {
        logs_query = logs_query.filter(audit_logs::user_id.eq(user_id));
    }
    if let Some(action) = query.action {
        logs_query = logs_query.filter(audit_logs::action.eq(action));
    }
    if let Some(table_name) = query.table_name {
        logs_query = logs_query.filter(audit_logs::table_name.eq(table_name));
    }
    if let Some(start) = query.start_date {
        logs_query = logs_query.filter(audit_logs::created_at.ge(start));
    }
    if let Some(end) = query.end_date {
        logs_query = logs_query.filter(audit_logs::created_at.le(end));
    }
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);

    let rows: Vec<AuditLogEntity> = logs_query
        .limit(limit)
        .get_results(conn)
        .await
        .context("Failed to get audit logs")?;

    Ok(StdResponse {
        data: Some(rows),
        message: Some("Get audit logs successfully"),
    })
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct AuditStatisticsQuery {
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
}

#[derive(Serialize, Debug, PartialEq, ToSchema)]
struct AuditStatisticsRes {
    total_logs: i64,
    insert_count: i64,
    update_count: i64,
    delete_count: i64,
    /// Entries per table within the range.
    table_activity: HashMap<String, i64>,
}

/// Activity rollup over the audit trail for a date range.
#[utoipa::path(
    get,
    path = "/statistics",
    tags = ["AuditLogs"],
    params(AuditStatisticsQuery),
    responses(
        (status = 200, description = "Audit statistics", body = StdResponse<AuditStatisticsRes, String>)
    )
)]
async fn get_audit_statistics(
    Query(query): Query<AuditStatisticsQuery>,
    State(state): State<AppState>,
    Extension(_user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut rows_query = audit_logs::table
        .select((audit_logs::action, audit_logs::table_name))
        .into_boxed();
    if let Some(start) = query.start_date {
        rows_query = rows_query.filter(audit_logs::created_at.ge(start));
    }
    if let Some(end) = query.end_date {
        rows_query = rows_query.filter(audit_logs::created_at.le(end));
    }

    let rows: Vec<(String, String)> = rows_query
        .get_results(conn)
        .await
        .context("Failed to get audit logs for statistics")?;

    Ok(StdResponse {
        data: Some(compute_audit_statistics(&rows)),
        message: Some("Get audit statistics successfully"),
    })
}

fn compute_audit_statistics(rows: &[(String, String)]) -> AuditStatisticsRes {
    let mut stats = AuditStatisticsRes {
        total_logs: rows.len() as i64,
        insert_count: 0,
        update_count: 0,
        delete_count: 0,
        table_activity: HashMap::new(),
    };

    for (action, table_name) in rows {
        match action.as_str() {
            "INSERT" => stats.insert_count += 1,
            "UPDATE" => stats.update_count += 1,
            "DELETE" => stats.delete_count += 1,
            _ => {}
        }
        *stats.table_activity.entry(table_name.clone()).or_insert(0) += 1;
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statistics_count_actions_and_tables() {
        let rows = vec![
            ("INSERT".to_string(), "orders".to_string()),
            ("UPDATE".to_string(), "orders".to_string()),
            ("UPDATE".to_string(), "payments".to_string()),
            ("DELETE".to_string(), "menu_items".to_string()),
        ];
        let stats = compute_audit_statistics(&rows);

        assert_eq!(stats.total_logs, 4);
        assert_eq!(stats.insert_count, 1);
        assert_eq!(stats.update_count, 2);
        assert_eq!(stats.delete_count, 1);
        assert_eq!(stats.table_activity["orders"], 2);
        assert_eq!(stats.table_activity["payments"], 1);
    }
}
