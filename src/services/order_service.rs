use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbBackend, EntityTrait,
    FromQueryResult, JoinType, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
    Statement, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::{self, AuditAction},
    dto::orders::{OrderList, OrderWithItems},
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        order_items::{
            self, ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::Column as ProdCol,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderLine, PaymentStatus},
    response::{ApiResponse, Meta},
    state::AppState,
};

#[derive(Debug, FromQueryResult)]
struct CartSnapshotRow {
    cart_item_id: Uuid,
    product_id: Uuid,
    product_name: String,
    quantity: i32,
    unit_price: Decimal,
}

#[derive(Debug, FromQueryResult)]
struct OrderLineRow {
    product_id: Uuid,
    product_name: String,
    quantity: i32,
    item_price: Decimal,
}

/// Turn the caller's cart into a pending order.
///
/// The cart rows are read with `FOR UPDATE` inside the same transaction that
/// writes the order, its lines and deletes the snapshotted cart rows, so a
/// concurrent cart edit lands entirely before or entirely after the snapshot.
/// Only the rows that were priced are deleted; a line inserted for a new
/// product while checkout runs survives in the cart.
pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    let rows = CartSnapshotRow::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        r#"
        SELECT ci.id AS cart_item_id, ci.product_id, p.name AS product_name,
               ci.quantity, p.price AS unit_price
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.user_id = $1
        ORDER BY ci.created_at, ci.id
        FOR UPDATE OF ci
        "#,
        [user.user_id.into()],
    ))
    .all(&txn)
    .await?;

    if rows.is_empty() {
        return Err(AppError::EmptyCart);
    }
    if let Some(row) = rows.iter().find(|row| row.quantity < 1) {
        return Err(AppError::InvalidArgument(format!(
            "cart line for product {} has invalid quantity",
            row.product_id
        )));
    }

    for row in &rows {
        ensure_fits_money(row.unit_price * Decimal::from(row.quantity)).map_err(|_| {
            AppError::InvalidArgument(format!(
                "cart line for product {} exceeds the maximum order amount",
                row.product_id
            ))
        })?;
    }
    let total_price = order_total(rows.iter().map(|row| (row.unit_price, row.quantity)));
    ensure_fits_money(total_price)?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        total_price: Set(total_price),
        payment_status: Set(PaymentStatus::Pending.as_str().to_string()),
        paid_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in &rows {
        // the catalog price is frozen into the line here
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(row.product_id),
            quantity: Set(row.quantity),
            item_price: Set(row.unit_price),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;

        items.push(OrderLine {
            product_id: item.product_id,
            product_name: row.product_name.clone(),
            quantity: item.quantity,
            item_price: item.item_price,
        });
    }

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .filter(CartCol::Id.is_in(rows.iter().map(|row| row.cart_item_id)))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        user_id = %user.user_id,
        lines = items.len(),
        total = %order.total_price,
        "order created"
    );
    audit::record(
        &state.pool,
        Some(user.user_id),
        AuditAction::OrderCreated,
        serde_json::json!({ "order_id": order.id, "total_price": order.total_price }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order created",
        OrderWithItems {
            order: order_from_entity(order)?,
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<OrderList>> {
    let orders = Orders::find()
        .filter(OrderCol::UserId.eq(user.user_id))
        .order_by_desc(OrderCol::CreatedAt)
        .order_by_desc(OrderCol::Id)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::with_total(orders.len());
    Ok(ApiResponse::success(
        "Ok",
        OrderList { items: orders },
        Some(meta),
    ))
}

/// Another user's order is reported exactly like a missing one.
pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = find_visible_order(&state.orm, id, Some(user.user_id))
        .await?
        .ok_or(AppError::NotFound)?;

    let items = load_order_lines(&state.orm, order.id).await?;

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order_from_entity(order)?,
            items,
        },
        Some(Meta::empty()),
    ))
}

/// Look up an order, optionally restricted to its owner.
pub(crate) async fn find_visible_order<C>(
    conn: &C,
    id: Uuid,
    owner: Option<Uuid>,
) -> AppResult<Option<OrderModel>>
where
    C: ConnectionTrait,
{
    let mut condition = Condition::all().add(OrderCol::Id.eq(id));
    if let Some(user_id) = owner {
        condition = condition.add(OrderCol::UserId.eq(user_id));
    }
    Ok(Orders::find().filter(condition).one(conn).await?)
}

async fn load_order_lines<C>(conn: &C, order_id: Uuid) -> AppResult<Vec<OrderLine>>
where
    C: ConnectionTrait,
{
    let rows = OrderItems::find()
        .select_only()
        .column(OrderItemCol::ProductId)
        .column(OrderItemCol::Quantity)
        .column(OrderItemCol::ItemPrice)
        .column_as(ProdCol::Name, "product_name")
        .join(JoinType::InnerJoin, order_items::Relation::Products.def())
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .order_by_asc(OrderItemCol::Id)
        .into_model::<OrderLineRow>()
        .all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| OrderLine {
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            item_price: row.item_price,
        })
        .collect())
}

/// Exact sum of `price * quantity`.
pub fn order_total<I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = (Decimal, i32)>,
{
    lines
        .into_iter()
        .map(|(price, quantity)| price * Decimal::from(quantity))
        .sum()
}

/// Money columns are `NUMERIC(12,2)`, so amounts must stay below 10^10.
pub fn ensure_fits_money(amount: Decimal) -> AppResult<()> {
    if amount.abs() < Decimal::from(10_000_000_000_i64) {
        Ok(())
    } else {
        Err(AppError::InvalidArgument(format!(
            "order total {amount} exceeds the maximum order amount"
        )))
    }
}

pub(crate) fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        total_price: model.total_price,
        payment_status: model.payment_status.parse::<PaymentStatus>()?,
        paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}
