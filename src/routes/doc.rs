use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{AddToCartRequest, CartList, RemovedLine},
        orders::{OrderList, OrderWithItems},
        payments::{ConfirmPaymentRequest, PaymentOutcome, PaymentWebhook, WebhookAck},
    },
    models::{CartItem, CartLine, Order, OrderLine, PaymentStatus},
    response::{ApiResponse, Meta},
    routes::{cart, health, orders, payments},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        health::readiness,
        cart::cart_list,
        cart::add_to_cart,
        cart::remove_from_cart,
        orders::list_orders,
        orders::create_order,
        orders::get_order,
        payments::confirm_payment,
        payments::payment_webhook
    ),
    components(
        schemas(
            CartItem,
            CartLine,
            Order,
            OrderLine,
            PaymentStatus,
            AddToCartRequest,
            CartList,
            RemovedLine,
            OrderList,
            OrderWithItems,
            ConfirmPaymentRequest,
            PaymentOutcome,
            PaymentWebhook,
            WebhookAck,
            health::HealthData,
            Meta,
            ApiResponse<CartList>,
            ApiResponse<CartItem>,
            ApiResponse<OrderList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<Order>,
            ApiResponse<WebhookAck>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Payments", description = "Payment reconciliation endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
