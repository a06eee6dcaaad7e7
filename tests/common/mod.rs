#![allow(dead_code)]

use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use storefront_orders::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::cart::AddToCartRequest,
    entity::{
        orders::{Column as OrderCol, Entity as Orders},
        products::{ActiveModel as ProductActive, Entity as Products},
        users::ActiveModel as UserActive,
    },
    middleware::auth::AuthUser,
    services::cart_service,
    state::AppState,
};
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "test-webhook-secret";

fn test_config(database_url: String) -> AppConfig {
    AppConfig {
        database_url,
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-jwt-secret".into(),
        payment_webhook_secret: Some(WEBHOOK_SECRET.into()),
        db_max_connections: 5,
        db_acquire_timeout_secs: 10,
        cors_origin: "http://localhost:5173".into(),
    }
}

/// State over a pool that never connects, for requests rejected before any query.
pub fn offline_state() -> anyhow::Result<AppState> {
    let config = test_config("postgres://localhost/unused".into());
    let pool = PgPoolOptions::new().connect_lazy(&config.database_url)?;
    let orm = create_orm_conn(&pool);
    Ok(AppState::new(pool, orm, config))
}

/// Returns `None` when no database is configured so the suite can run without one.
pub async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run database tests.");
            return Ok(None);
        }
    };

    let config = test_config(database_url);
    let pool = create_pool(&config).await?;
    run_migrations(&pool).await?;
    let orm = create_orm_conn(&pool);

    Ok(Some(AppState::new(pool, orm, config)))
}

// Every test works on its own users and products, so tests never truncate shared tables.
pub async fn create_user(state: &AppState) -> anyhow::Result<AuthUser> {
    let id = Uuid::new_v4();
    UserActive {
        id: Set(id),
        email: Set(format!("{id}@example.com")),
        password_hash: Set("!".into()),
        role: Set("user".into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: id,
        role: "user".into(),
    })
}

pub async fn create_product(state: &AppState, price: Decimal) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    ProductActive {
        id: Set(id),
        name: Set(format!("Test product {id}")),
        description: Set(Some("A product for testing".into())),
        price: Set(price),
        image_path: Set(None),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(id)
}

pub async fn set_price(state: &AppState, product_id: Uuid, price: Decimal) -> anyhow::Result<()> {
    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| anyhow::anyhow!("product {product_id} missing"))?;
    let mut active: ProductActive = product.into();
    active.price = Set(price);
    active.update(&state.orm).await?;
    Ok(())
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    quantity: i32,
) -> anyhow::Result<()> {
    cart_service::upsert_line(
        state,
        user,
        AddToCartRequest {
            product_id: Some(product_id),
            quantity: Some(json!(quantity)),
        },
    )
    .await?;
    Ok(())
}

pub async fn order_count(state: &AppState, user_id: Uuid) -> anyhow::Result<u64> {
    Ok(Orders::find()
        .filter(OrderCol::UserId.eq(user_id))
        .count(&state.orm)
        .await?)
}

pub fn price(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

pub async fn order_line_count(state: &AppState, user_id: Uuid) -> anyhow::Result<i64> {
    Ok(sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM order_items oi
        JOIN orders o ON o.id = oi.order_id
        WHERE o.user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(&state.pool)
    .await?)
}
