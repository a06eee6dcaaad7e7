use serde_json::Value;
use uuid::Uuid;

use crate::{
    audit::{self, AuditAction},
    dto::cart::{AddToCartRequest, CartList, RemovedLine},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartItem, CartLine},
    response::{ApiResponse, Meta},
    services::catalog_service,
    state::AppState,
};

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartList>> {
    let items = sqlx::query_as::<_, CartLine>(
        r#"
        SELECT ci.product_id, p.name, p.image_path, p.price AS unit_price, ci.quantity
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.user_id = $1
        ORDER BY ci.created_at DESC, ci.id
        "#,
    )
    .bind(user.user_id)
    .fetch_all(&state.pool)
    .await?;

    let meta = Meta::with_total(items.len());
    Ok(ApiResponse::success("OK", CartList { items }, Some(meta)))
}

/// Insert the line or overwrite its quantity. Re-adding a product replaces the
/// previous quantity, it does not add to it.
pub async fn upsert_line(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    let product_id = payload
        .product_id
        .ok_or_else(|| AppError::InvalidArgument("product_id is required".into()))?;
    let quantity = parse_quantity(payload.quantity.as_ref())?;

    catalog_service::unit_price(&state.orm, product_id).await?;

    let cart_item = sqlx::query_as::<_, CartItem>(
        r#"
        INSERT INTO cart_items (id, user_id, product_id, quantity)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, product_id)
        DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(product_id)
    .bind(quantity)
    .fetch_one(&state.pool)
    .await
    .map_err(|err| match &err {
        // product deleted (or user unknown) between the lookup and the write
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => AppError::NotFound,
        _ => AppError::from(err),
    })?;

    audit::record(
        &state.pool,
        Some(user.user_id),
        AuditAction::CartUpdate,
        serde_json::json!({ "product_id": product_id, "quantity": quantity }),
    )
    .await;

    Ok(ApiResponse::success("Cart updated", cart_item, None))
}

/// Removing a line that is not in the cart is not an error.
pub async fn remove_line(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<RemovedLine>> {
    let result = sqlx::query("DELETE FROM cart_items WHERE product_id = $1 AND user_id = $2")
        .bind(product_id)
        .bind(user.user_id)
        .execute(&state.pool)
        .await?;

    let removed = result.rows_affected() > 0;
    if removed {
        audit::record(
            &state.pool,
            Some(user.user_id),
            AuditAction::CartRemove,
            serde_json::json!({ "product_id": product_id }),
        )
        .await;
    }

    Ok(ApiResponse::success(
        "Removed from cart",
        RemovedLine {
            product_id,
            removed,
        },
        Some(Meta::empty()),
    ))
}

/// Upper bound for a single cart line.
pub const MAX_LINE_QUANTITY: i32 = 10_000;

/// Missing or null defaults to 1. Accepts a JSON integer or an integer string.
pub fn parse_quantity(raw: Option<&Value>) -> AppResult<i32> {
    let value = match raw {
        None | Some(Value::Null) => return Ok(1),
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };

    match value {
        Some(q) if q > i64::from(MAX_LINE_QUANTITY) => Err(AppError::InvalidArgument(format!(
            "quantity must not exceed {MAX_LINE_QUANTITY}"
        ))),
        Some(q) if q >= 1 => i32::try_from(q)
            .map_err(|_| AppError::InvalidArgument("quantity is too large".into())),
        Some(_) => Err(AppError::InvalidArgument(
            "quantity must be greater than 0".into(),
        )),
        None => Err(AppError::InvalidArgument(
            "quantity must be a whole number".into(),
        )),
    }
}
