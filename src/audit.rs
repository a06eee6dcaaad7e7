use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    CartUpdate,
    CartRemove,
    OrderCreated,
    OrderPaid,
    OrderPaymentFailed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CartUpdate => "cart_update",
            AuditAction::CartRemove => "cart_remove",
            AuditAction::OrderCreated => "order_created",
            AuditAction::OrderPaid => "order_paid",
            AuditAction::OrderPaymentFailed => "order_payment_failed",
        }
    }

    pub fn resource(&self) -> &'static str {
        match self {
            AuditAction::CartUpdate | AuditAction::CartRemove => "cart_items",
            AuditAction::OrderCreated
            | AuditAction::OrderPaid
            | AuditAction::OrderPaymentFailed => "orders",
        }
    }
}

pub async fn log_audit(
    pool: &DbPool,
    user_id: Option<Uuid>,
    action: AuditAction,
    metadata: Option<Value>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(action.as_str())
    .bind(action.resource())
    .bind(metadata)
    .execute(pool)
    .await?;

    Ok(())
}

/// Best-effort audit write. Runs after the mutation has committed, so a
/// failure here is logged and never reported to the caller.
pub async fn record(pool: &DbPool, user_id: Option<Uuid>, action: AuditAction, metadata: Value) {
    if let Err(err) = log_audit(pool, user_id, action, Some(metadata)).await {
        tracing::warn!(error = %err, action = action.as_str(), "audit log failed");
    }
}
