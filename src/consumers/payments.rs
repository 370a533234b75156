use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use serde_json::json;
use tracing::info;

use crate::core::app_state::AppState;
use crate::domain::types::{NotificationType, PaymentStatus};
use crate::models::PaymentEntity;
use crate::realtime::ChangeEvent;
use crate::services::notifications;

/// Tells the paying user how their settlement went.
pub fn payment_status_changed(
    event: ChangeEvent,
    state: Arc<AppState>,
) -> BoxFuture<'static, Result<()>> {
    Box::pin(async move {
        let payment: PaymentEntity =
            serde_json::from_value(event.row).context("Malformed payment row in change event")?;
        let old: Option<PaymentEntity> = event
            .old_row
            .filter(|row| !row.is_null())
            .map(serde_json::from_value)
            .transpose()
            .context("Malformed old payment row in change event")?;

        if let Some(old) = &old {
            if old.payment_status == payment.payment_status {
                return Ok(());
            }
        }
        let Some(user_id) = payment.user_id else {
            return Ok(());
        };
        let Some(status) = PaymentStatus::parse(&payment.payment_status) else {
            return Ok(());
        };

        let (title, message) = match status {
            PaymentStatus::Completed => (
                "Payment Successful",
                format!("Payment of ₹{:.2} completed successfully!", payment.amount),
            ),
            PaymentStatus::Failed => (
                "Payment Failed",
                "Payment failed. Please try again.".to_string(),
            ),
            PaymentStatus::Refunded => (
                "Payment Refunded",
                format!("₹{:.2} has been refunded to you.", payment.refund_amount),
            ),
            PaymentStatus::Pending => (
                "Payment Pending",
                "Payment is being processed...".to_string(),
            ),
        };

        let conn = &mut state.db_pool.get().await?;
        notifications::create(
            conn,
            user_id,
            title,
            message,
            NotificationType::Payment,
            Some(json!({
                "payment_id": payment.id,
                "order_id": payment.order_id,
                "status": payment.payment_status,
                "amount": payment.amount,
            })),
        )
        .await?;

        info!(
            "Payment {} for order #{} is now {}",
            payment.id, payment.order_id, payment.payment_status
        );
        Ok(())
    })
}
