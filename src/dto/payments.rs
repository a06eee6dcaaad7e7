use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::PaymentStatus;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmPaymentRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Confirm,
    Fail,
}

/// Signal from the payment notifier. Delivered at least once, in any order.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentWebhook {
    pub order_id: Uuid,
    pub outcome: PaymentOutcome,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
    /// True when the order had already left `pending` and nothing changed.
    pub duplicate: bool,
    pub payment_status: Option<PaymentStatus>,
}
