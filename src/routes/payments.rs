use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    routing::post,
};

use crate::{
    dto::payments::{ConfirmPaymentRequest, PaymentWebhook, WebhookAck},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Order,
    response::ApiResponse,
    routes::extract::AppJson,
    services::payment_service,
    state::AppState,
};

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/confirm", post(confirm_payment))
        .route("/webhook", post(payment_webhook))
}

#[utoipa::path(
    post,
    path = "/api/pay/confirm",
    request_body = ConfirmPaymentRequest,
    responses(
        (status = 200, description = "Order marked as paid", body = ApiResponse<Order>),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order already paid or failed"),
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn confirm_payment(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<ConfirmPaymentRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let resp = payment_service::confirm_payment(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/pay/webhook",
    request_body = PaymentWebhook,
    params(
        ("x-webhook-secret" = String, Header, description = "Shared notifier secret")
    ),
    responses(
        (status = 200, description = "Signal applied or acknowledged as a duplicate", body = ApiResponse<WebhookAck>),
        (status = 401, description = "Bad or missing secret"),
        (status = 404, description = "Order not found"),
        (status = 503, description = "Storage failure, retry"),
    ),
    security(()),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(payload): AppJson<PaymentWebhook>,
) -> AppResult<Json<ApiResponse<WebhookAck>>> {
    let secret = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());
    let resp = payment_service::handle_webhook(&state, secret, payload).await?;
    Ok(Json(resp))
}
