use anyhow::{Context, Result};
use diesel::SelectableHelper;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde_json::Value;
use uuid::Uuid;

use crate::core::outbox;
use crate::domain::types::NotificationType;
use crate::models::{CreateNotificationEntity, NotificationEntity};
use crate::realtime::{ChangeEvent, ChangeTable};
use crate::schema::notifications;

/// Inserts a notification row and queues its change event so the
/// recipient's notification bell picks it up.
pub async fn create(
    conn: &mut AsyncPgConnection,
    user_id: Uuid,
    title: &str,
    message: String,
    notification_type: NotificationType,
    data: Option<Value>,
) -> Result<NotificationEntity> {
    let notification: NotificationEntity = diesel::insert_into(notifications::table)
        .values(CreateNotificationEntity {
            user_id,
            title: title.to_string(),
            message,
            notification_type: notification_type.as_str().to_string(),
            data,
        })
        .returning(NotificationEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create notification")?;

    let event = ChangeEvent::created(
        ChangeTable::Notifications,
        notification.id,
        Some(notification.user_id),
        serde_json::to_value(&notification).context("Failed to serialize notification")?,
    );
    outbox::publish(conn, event.key(), &event).await?;

    Ok(notification)
}
