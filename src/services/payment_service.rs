use chrono::Utc;
use sea_orm::entity::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    audit::{self, AuditAction},
    config::AppConfig,
    dto::payments::{ConfirmPaymentRequest, PaymentOutcome, PaymentWebhook, WebhookAck},
    entity::orders::{Column as OrderCol, Entity as Orders},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, PaymentStatus},
    response::{ApiResponse, Meta},
    services::order_service::{find_visible_order, order_from_entity},
    state::AppState,
};

/// Move a pending order to `paid`. Replays get `AlreadyPaid` and change nothing.
pub async fn mark_paid(
    state: &AppState,
    order_id: Uuid,
    expected_user: Option<Uuid>,
) -> AppResult<Order> {
    settle(state, order_id, expected_user, PaymentStatus::Paid).await
}

/// Move a pending order to `failed`.
pub async fn mark_failed(
    state: &AppState,
    order_id: Uuid,
    expected_user: Option<Uuid>,
) -> AppResult<Order> {
    settle(state, order_id, expected_user, PaymentStatus::Failed).await
}

/// Compare-and-set on `payment_status = 'pending'`. The read that follows only
/// classifies the outcome, so two racing signals can never both apply.
async fn settle(
    state: &AppState,
    order_id: Uuid,
    expected_user: Option<Uuid>,
    next: PaymentStatus,
) -> AppResult<Order> {
    let now: DateTimeWithTimeZone = Utc::now().into();

    let mut condition = Condition::all()
        .add(OrderCol::Id.eq(order_id))
        .add(OrderCol::PaymentStatus.eq(PaymentStatus::Pending.as_str()));
    if let Some(user_id) = expected_user {
        condition = condition.add(OrderCol::UserId.eq(user_id));
    }

    let mut update = Orders::update_many()
        .col_expr(OrderCol::PaymentStatus, Expr::value(next.as_str()))
        .col_expr(OrderCol::UpdatedAt, Expr::value(now));
    if next == PaymentStatus::Paid {
        update = update.col_expr(OrderCol::PaidAt, Expr::value(Some(now)));
    }
    let result = update.filter(condition).exec(&state.orm).await?;

    let order = find_visible_order(&state.orm, order_id, expected_user)
        .await?
        .ok_or(AppError::NotFound)?;
    let order = order_from_entity(order)?;

    if result.rows_affected == 0 {
        tracing::info!(
            order_id = %order_id,
            current = %order.payment_status,
            requested = %next,
            "payment signal ignored, order already settled"
        );
        return Err(settled_error(order.payment_status, next));
    }

    tracing::info!(order_id = %order.id, status = %next, "payment status updated");
    let action = match next {
        PaymentStatus::Failed => AuditAction::OrderPaymentFailed,
        _ => AuditAction::OrderPaid,
    };
    audit::record(
        &state.pool,
        Some(order.user_id),
        action,
        serde_json::json!({ "order_id": order.id, "total_price": order.total_price }),
    )
    .await;

    Ok(order)
}

fn settled_error(current: PaymentStatus, requested: PaymentStatus) -> AppError {
    if current.can_transition_to(requested) {
        // the conditional update missed a row that could still move
        return AppError::Internal(anyhow::anyhow!(
            "order in status {current} was not moved to {requested}"
        ));
    }
    match current {
        PaymentStatus::Paid => AppError::AlreadyPaid,
        _ => AppError::PaymentClosed,
    }
}

/// Simplified confirmation by the order's owner.
pub async fn confirm_payment(
    state: &AppState,
    user: &AuthUser,
    payload: ConfirmPaymentRequest,
) -> AppResult<ApiResponse<Order>> {
    let order = mark_paid(state, payload.order_id, Some(user.user_id)).await?;
    Ok(ApiResponse::success(
        "Payment recorded",
        order,
        Some(Meta::empty()),
    ))
}

/// Apply a notifier signal. Replays for settled orders are acknowledged as
/// duplicates so the notifier stops retrying.
pub async fn handle_webhook(
    state: &AppState,
    provided_secret: Option<&str>,
    payload: PaymentWebhook,
) -> AppResult<ApiResponse<WebhookAck>> {
    verify_webhook_secret(&state.config, provided_secret)?;

    let outcome = match payload.outcome {
        PaymentOutcome::Confirm => mark_paid(state, payload.order_id, None).await,
        PaymentOutcome::Fail => mark_failed(state, payload.order_id, None).await,
    };

    let ack = match outcome {
        Ok(order) => WebhookAck {
            received: true,
            duplicate: false,
            payment_status: Some(order.payment_status),
        },
        Err(err) if err.is_settled_payment() => WebhookAck {
            received: true,
            duplicate: true,
            payment_status: Some(match err {
                AppError::AlreadyPaid => PaymentStatus::Paid,
                _ => PaymentStatus::Failed,
            }),
        },
        Err(err) => return Err(err),
    };

    Ok(ApiResponse::success("Received", ack, Some(Meta::empty())))
}

pub fn verify_webhook_secret(config: &AppConfig, provided: Option<&str>) -> AppResult<()> {
    let expected = config
        .payment_webhook_secret
        .as_deref()
        .ok_or_else(|| AppError::Unauthorized("Payment webhook is not configured".into()))?;

    match provided {
        Some(secret) if constant_time_eq(secret.as_bytes(), expected.as_bytes()) => Ok(()),
        _ => Err(AppError::Unauthorized("Invalid webhook secret".into())),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
