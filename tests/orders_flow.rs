mod common;

use storefront_orders::{
    error::AppError,
    models::PaymentStatus,
    services::{cart_service, order_service},
};
use uuid::Uuid;

use common::{
    add_to_cart, create_product, create_user, order_count, order_line_count, price, set_price,
    setup_state,
};

// cart: 2 x 10.00 + 1 x 5.50 -> order total 25.50
#[tokio::test]
async fn checkout_prices_the_cart_and_clears_it() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state).await?;
    let p7 = create_product(&state, price(1000)).await?;
    let p9 = create_product(&state, price(550)).await?;
    add_to_cart(&state, &user, p7, 2).await?;
    add_to_cart(&state, &user, p9, 1).await?;

    let created = order_service::create_order(&state, &user).await?.data.unwrap();
    assert_eq!(created.order.total_price, price(2550));
    assert_eq!(created.order.payment_status, PaymentStatus::Pending);
    assert_eq!(created.order.user_id, user.user_id);
    assert_eq!(created.items.len(), 2);

    let cart = cart_service::get_cart(&state, &user).await?.data.unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(order_count(&state, user.user_id).await?, 1);

    let detail = order_service::get_order(&state, &user, created.order.id)
        .await?
        .data
        .unwrap();
    let line_sum = detail
        .items
        .iter()
        .map(|line| line.item_price * rust_decimal::Decimal::from(line.quantity))
        .sum::<rust_decimal::Decimal>();
    assert_eq!(line_sum, detail.order.total_price);
    Ok(())
}

#[tokio::test]
async fn empty_cart_creates_no_order() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state).await?;

    let result = order_service::create_order(&state, &user).await;
    assert!(matches!(result, Err(AppError::EmptyCart)));
    assert_eq!(order_count(&state, user.user_id).await?, 0);
    Ok(())
}

#[tokio::test]
async fn order_lines_keep_the_price_at_purchase() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state).await?;
    let product = create_product(&state, price(1999)).await?;
    add_to_cart(&state, &user, product, 3).await?;

    let created = order_service::create_order(&state, &user).await?.data.unwrap();
    set_price(&state, product, price(2999)).await?;

    let detail = order_service::get_order(&state, &user, created.order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].item_price, price(1999));
    assert_eq!(detail.items[0].quantity, 3);
    assert_eq!(detail.order.total_price, price(5997));
    assert!(detail.items[0].product_name.starts_with("Test product"));
    Ok(())
}

#[tokio::test]
async fn other_users_orders_are_not_found() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let owner = create_user(&state).await?;
    let stranger = create_user(&state).await?;
    let product = create_product(&state, price(1000)).await?;
    add_to_cart(&state, &owner, product, 1).await?;
    let created = order_service::create_order(&state, &owner).await?.data.unwrap();

    let foreign = order_service::get_order(&state, &stranger, created.order.id).await;
    assert!(matches!(foreign, Err(AppError::NotFound)));

    let missing = order_service::get_order(&state, &owner, Uuid::new_v4()).await;
    assert!(matches!(missing, Err(AppError::NotFound)));
    Ok(())
}

#[tokio::test]
async fn order_history_is_newest_first() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state).await?;
    let product = create_product(&state, price(100)).await?;

    let mut created = Vec::new();
    for quantity in [1, 2] {
        add_to_cart(&state, &user, product, quantity).await?;
        let order = order_service::create_order(&state, &user).await?.data.unwrap();
        created.push(order.order.id);
    }

    let list = order_service::list_orders(&state, &user).await?.data.unwrap();
    let ids: Vec<Uuid> = list.items.iter().map(|order| order.id).collect();
    assert_eq!(ids, vec![created[1], created[0]]);

    let newcomer = create_user(&state).await?;
    let empty = order_service::list_orders(&state, &newcomer).await?.data.unwrap();
    assert!(empty.items.is_empty());
    Ok(())
}

#[tokio::test]
async fn cart_edit_racing_checkout_is_never_lost() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state).await?;
    let product = create_product(&state, price(1000)).await?;
    add_to_cart(&state, &user, product, 1).await?;

    let (upserted, checkout) = tokio::join!(
        add_to_cart(&state, &user, product, 3),
        order_service::create_order(&state, &user),
    );
    upserted?;
    let order = checkout?.data.unwrap();
    assert_eq!(order.items.len(), 1);
    let ordered_quantity = order.items[0].quantity;
    assert_eq!(order.order.total_price, price(1000) * rust_decimal::Decimal::from(ordered_quantity));

    let cart = cart_service::get_cart(&state, &user).await?.data.unwrap();
    match ordered_quantity {
        // upsert landed before the snapshot
        3 => assert!(cart.items.is_empty()),
        // upsert landed after checkout and recreated the line
        1 => {
            assert_eq!(cart.items.len(), 1);
            assert_eq!(cart.items[0].quantity, 3);
        }
        other => panic!("unexpected ordered quantity {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn order_above_the_money_range_is_rejected_before_writing() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state).await?;
    let cheap = create_product(&state, price(1000)).await?;
    let expensive = create_product(&state, price(999_999_999_999)).await?;
    add_to_cart(&state, &user, cheap, 1).await?;
    add_to_cart(&state, &user, expensive, 2).await?;

    let result = order_service::create_order(&state, &user).await;
    assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    assert!(!result.is_err_and(|err| err.is_retryable()));

    assert_eq!(order_count(&state, user.user_id).await?, 0);
    let cart = cart_service::get_cart(&state, &user).await?.data.unwrap();
    assert_eq!(cart.items.len(), 2);
    Ok(())
}

// A trigger rejects the second order line, so the failure happens after the
// order row and the first line were written inside the transaction.
#[tokio::test]
async fn failure_mid_checkout_leaves_no_trace() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };
    let user = create_user(&state).await?;
    let first = create_product(&state, price(1000)).await?;
    let second = create_product(&state, price(550)).await?;
    add_to_cart(&state, &user, first, 2).await?;
    add_to_cart(&state, &user, second, 4).await?;

    let guard = format!("reject_line_{}", second.simple());
    sqlx::raw_sql(&format!(
        r#"
        CREATE FUNCTION {guard}() RETURNS trigger AS $$
        BEGIN
            IF NEW.product_id = '{second}'::uuid THEN
                RAISE EXCEPTION 'order line rejected for product %', NEW.product_id;
            END IF;
            RETURN NEW;
        END;
        $$ LANGUAGE plpgsql;
        CREATE TRIGGER {guard} BEFORE INSERT ON order_items
            FOR EACH ROW EXECUTE FUNCTION {guard}();
        "#
    ))
    .execute(&state.pool)
    .await?;

    let result = order_service::create_order(&state, &user).await;

    sqlx::raw_sql(&format!(
        "DROP TRIGGER {guard} ON order_items; DROP FUNCTION {guard}();"
    ))
    .execute(&state.pool)
    .await?;

    assert!(matches!(result, Err(ref err) if err.is_retryable()));
    assert_eq!(order_count(&state, user.user_id).await?, 0);
    assert_eq!(order_line_count(&state, user.user_id).await?, 0);

    let cart = cart_service::get_cart(&state, &user).await?.data.unwrap();
    let mut lines: Vec<(Uuid, i32)> = cart
        .items
        .iter()
        .map(|line| (line.product_id, line.quantity))
        .collect();
    lines.sort();
    let mut expected = vec![(first, 2), (second, 4)];
    expected.sort();
    assert_eq!(lines, expected);

    // same cart checks out once the failure is gone
    let created = order_service::create_order(&state, &user).await?.data.unwrap();
    assert_eq!(created.items.len(), 2);
    assert_eq!(created.order.total_price, price(4200));
    Ok(())
}
