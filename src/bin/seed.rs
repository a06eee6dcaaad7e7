use chrono::Duration;
use rust_decimal::Decimal;
use storefront_orders::{
    config::AppConfig,
    db::{DbPool, create_pool, run_migrations},
    middleware::auth::issue_token,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config).await?;
    run_migrations(&pool).await?;

    let user_id = ensure_user(&pool, "user@example.com").await?;
    seed_products(&pool).await?;

    // Credentials are owned by the identity service; this token is for local use only.
    let token = issue_token(&config.jwt_secret, user_id, "user", Duration::hours(24))?;
    println!("Seed completed. User ID: {user_id}");
    println!("Development bearer token (24h): {token}");
    Ok(())
}

async fn ensure_user(pool: &DbPool, email: &str) -> anyhow::Result<Uuid> {
    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, role)
        VALUES ($1, $2, '!', 'user')
        ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email}");
    Ok(user_id)
}

async fn seed_products(pool: &DbPool) -> anyhow::Result<()> {
    let products = [
        ("iPhone 15 Pro Case", "Protective case with military-grade drop protection", 2999),
        ("Wireless Charging Pad", "Fast Qi wireless charging pad", 3999),
        ("USB-C to Lightning Cable", "Braided fast-charging cable", 1999),
        ("Bluetooth Headphones", "Over-ear headphones with premium sound", 12999),
        ("Mechanical Keyboard", "RGB backlit mechanical keyboard", 14999),
        ("Power Bank 20000mAh", "High-capacity power bank with fast charging", 4599),
        ("Screen Protector", "Tempered glass with anti-fingerprint coating", 1499),
        ("Smart Plug", "WiFi smart plug with energy monitoring", 1599),
    ];

    for (name, desc, cents) in products {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(desc)
        .bind(Decimal::new(cents, 2))
        .execute(pool)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
