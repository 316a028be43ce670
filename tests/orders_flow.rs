mod common;

use common::{
    add_to_cart, create_address, create_manager, create_pharmacy, create_product, create_user,
    ledger, order_request, setup, stock_product, total_stock,
};
use pharmacy_marketplace_api::{
    error::AppError,
    middleware::auth::AuthUser,
    repository::orders,
    routes::params::OrderListQuery,
    services::order_service,
    status::{OrderStatus, Role},
};

const LON: f64 = 106.8229;
const LAT: f64 = -6.2088;

async fn status_of(
    state: &pharmacy_marketplace_api::state::AppState,
    order_id: i64,
) -> anyhow::Result<Option<OrderStatus>> {
    let order = orders::get(&state.orm, order_id).await?;
    Ok(OrderStatus::from_id(order.order_status_id))
}

// Five single-unit orders drain a stock of five; a sixth is rejected.
#[tokio::test]
async fn concurrent_orders_exhaust_stock_exactly() -> anyhow::Result<()> {
    let Some(ctx) = setup().await? else {
        return Ok(());
    };
    let state = ctx.state.clone();
    let (_, manager_id) = create_manager(&state.pool, "manager@example.com").await?;
    let pharmacy_id = create_pharmacy(&state.pool, manager_id, "Apotek A", LON, LAT).await?;
    let product_id = create_product(&state.pool, "Paracetamol").await?;
    let pp = stock_product(&state.pool, pharmacy_id, product_id, 10_000, 5).await?;

    let mut buyers = Vec::new();
    for i in 0..6 {
        let user = create_user(&state.pool, &format!("buyer{i}@example.com"), Role::User).await?;
        let address = create_address(&state.pool, user.user_id, LON, LAT).await?;
        let cart_item = add_to_cart(&state, &user, pp, 1).await?;
        buyers.push((user, address, cart_item));
    }

    let mut handles = Vec::new();
    for (user, address, cart_item) in buyers {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            order_service::place_order(
                &state,
                &user,
                order_request(vec![cart_item], 10_000, 5_000, address),
            )
            .await
        }));
    }

    let mut placed = Vec::new();
    let mut rejected = 0;
    for handle in handles {
        match handle.await? {
            Ok(resp) => placed.push(resp.data.expect("order").order_id),
            Err(AppError::NotEnoughStock(_)) => rejected += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(placed.len(), 5);
    assert_eq!(rejected, 1);
    for order_id in placed {
        assert_eq!(status_of(&state, order_id).await?, Some(OrderStatus::Pending));
    }
    assert_eq!(total_stock(&state, pp).await?, 0);
    let entries = ledger(&state.pool, pp).await?;
    assert_eq!(entries.iter().filter(|q| **q < 0).sum::<i32>(), -5);
    assert_eq!(entries.iter().sum::<i32>(), 0);
    Ok(())
}

// Canceling a pending order gives every unit back with opposing ledger rows.
#[tokio::test]
async fn user_cancel_restores_stock_exactly() -> anyhow::Result<()> {
    let Some(ctx) = setup().await? else {
        return Ok(());
    };
    let state = &ctx.state;
    let (_, manager_id) = create_manager(&state.pool, "manager@example.com").await?;
    let pharmacy_id = create_pharmacy(&state.pool, manager_id, "Apotek A", LON, LAT).await?;
    let first = create_product(&state.pool, "Amoxicillin").await?;
    let second = create_product(&state.pool, "Vitamin C").await?;
    let pp10 = stock_product(&state.pool, pharmacy_id, first, 20_000, 7).await?;
    let pp11 = stock_product(&state.pool, pharmacy_id, second, 5_000, 4).await?;

    let user = create_user(&state.pool, "user@example.com", Role::User).await?;
    let address = create_address(&state.pool, user.user_id, LON, LAT).await?;
    let line10 = add_to_cart(state, &user, pp10, 3).await?;
    let line11 = add_to_cart(state, &user, pp11, 1).await?;

    let placed = order_service::place_order(
        state,
        &user,
        order_request(vec![line10, line11], 3 * 20_000 + 5_000, 10_000, address),
    )
    .await?
    .data
    .expect("order");
    assert_eq!(total_stock(state, pp10).await?, 4);
    assert_eq!(total_stock(state, pp11).await?, 3);

    let canceled =
        order_service::transition(state, &user, placed.order_id, OrderStatus::Canceled).await?;
    assert_eq!(
        canceled.data.expect("order").order_status,
        Some(OrderStatus::Canceled)
    );

    assert_eq!(total_stock(state, pp10).await?, 7);
    assert_eq!(total_stock(state, pp11).await?, 4);
    assert_eq!(ledger(&state.pool, pp10).await?, vec![7, -3, 3]);
    assert_eq!(ledger(&state.pool, pp11).await?, vec![4, -1, 1]);
    Ok(())
}

#[tokio::test]
async fn self_cancel_is_rejected_after_payment_proof() -> anyhow::Result<()> {
    let Some(ctx) = setup().await? else {
        return Ok(());
    };
    let state = &ctx.state;
    let (_, manager_id) = create_manager(&state.pool, "manager@example.com").await?;
    let pharmacy_id = create_pharmacy(&state.pool, manager_id, "Apotek A", LON, LAT).await?;
    let product_id = create_product(&state.pool, "Ibuprofen").await?;
    let pp = stock_product(&state.pool, pharmacy_id, product_id, 8_000, 10).await?;

    let user = create_user(&state.pool, "user@example.com", Role::User).await?;
    let address = create_address(&state.pool, user.user_id, LON, LAT).await?;
    let line = add_to_cart(state, &user, pp, 2).await?;
    let order_id = order_service::place_order(
        state,
        &user,
        order_request(vec![line], 16_000, 10_000, address),
    )
    .await?
    .data
    .expect("order")
    .order_id;

    let jpeg = vec![0u8; 200 * 1024];
    let uploaded =
        order_service::upload_payment_proof(state, &user, order_id, "proof.jpg", jpeg).await?;
    assert!(uploaded.data.expect("order").payment_proof.is_some());

    let err = order_service::transition(state, &user, order_id, OrderStatus::Canceled)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "bad-request");
    assert_eq!(status_of(state, order_id).await?, Some(OrderStatus::Pending));
    assert_eq!(total_stock(state, pp).await?, 8);
    Ok(())
}

#[tokio::test]
async fn oversized_or_foreign_payment_proofs_are_rejected() -> anyhow::Result<()> {
    let Some(ctx) = setup().await? else {
        return Ok(());
    };
    let state = &ctx.state;
    let (_, manager_id) = create_manager(&state.pool, "manager@example.com").await?;
    let pharmacy_id = create_pharmacy(&state.pool, manager_id, "Apotek A", LON, LAT).await?;
    let product_id = create_product(&state.pool, "Ibuprofen").await?;
    let pp = stock_product(&state.pool, pharmacy_id, product_id, 8_000, 10).await?;

    let user = create_user(&state.pool, "user@example.com", Role::User).await?;
    let other = create_user(&state.pool, "other@example.com", Role::User).await?;
    let address = create_address(&state.pool, user.user_id, LON, LAT).await?;
    let line = add_to_cart(state, &user, pp, 1).await?;
    let order_id =
        order_service::place_order(state, &user, order_request(vec![line], 8_000, 0, address))
            .await?
            .data
            .expect("order")
            .order_id;

    let too_big = vec![0u8; 501 * 1024];
    let err = order_service::upload_payment_proof(state, &user, order_id, "proof.png", too_big)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "payload-too-large");

    let err = order_service::upload_payment_proof(state, &user, order_id, "proof.gif", vec![1])
        .await
        .unwrap_err();
    assert_eq!(err.code(), "unsupported-media-type");

    let err = order_service::upload_payment_proof(state, &other, order_id, "proof.png", vec![1])
        .await
        .unwrap_err();
    assert_eq!(err.code(), "bad-request");
    Ok(())
}

// A manager cannot reach another manager's order: not-found, nothing changes.
#[tokio::test]
async fn manager_cannot_ship_another_managers_order() -> anyhow::Result<()> {
    let Some(ctx) = setup().await? else {
        return Ok(());
    };
    let state = &ctx.state;
    let (manager_a, _) = create_manager(&state.pool, "a@example.com").await?;
    let (manager_b, manager_b_id) = create_manager(&state.pool, "b@example.com").await?;
    let admin = create_user(&state.pool, "admin@example.com", Role::Admin).await?;
    let pharmacy_b = create_pharmacy(&state.pool, manager_b_id, "Apotek B", LON, LAT).await?;
    let product_id = create_product(&state.pool, "Cetirizine").await?;
    let pp = stock_product(&state.pool, pharmacy_b, product_id, 4_000, 3).await?;

    let user = create_user(&state.pool, "user@example.com", Role::User).await?;
    let address = create_address(&state.pool, user.user_id, LON, LAT).await?;
    let line = add_to_cart(state, &user, pp, 1).await?;
    let order_id =
        order_service::place_order(state, &user, order_request(vec![line], 4_000, 0, address))
            .await?
            .data
            .expect("order")
            .order_id;

    order_service::transition(state, &admin, order_id, OrderStatus::Processing).await?;

    let err = order_service::transition(state, &manager_a, order_id, OrderStatus::Shipped)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "not-found");
    assert_eq!(status_of(state, order_id).await?, Some(OrderStatus::Processing));

    order_service::transition(state, &manager_b, order_id, OrderStatus::Shipped).await?;
    order_service::transition(state, &user, order_id, OrderStatus::Completed).await?;
    assert_eq!(status_of(state, order_id).await?, Some(OrderStatus::Completed));

    // Completed orders never move back.
    let err = order_service::transition(state, &admin, order_id, OrderStatus::Processing)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "bad-request");
    Ok(())
}

// A later item without stock cancels the order and returns what was taken.
#[tokio::test]
async fn failed_placement_is_compensated() -> anyhow::Result<()> {
    let Some(ctx) = setup().await? else {
        return Ok(());
    };
    let state = &ctx.state;
    let (_, manager_id) = create_manager(&state.pool, "manager@example.com").await?;
    let pharmacy_id = create_pharmacy(&state.pool, manager_id, "Apotek A", LON, LAT).await?;
    let plenty = create_product(&state.pool, "Plenty").await?;
    let scarce = create_product(&state.pool, "Scarce").await?;
    let pp_plenty = stock_product(&state.pool, pharmacy_id, plenty, 1_000, 10).await?;
    let pp_scarce = stock_product(&state.pool, pharmacy_id, scarce, 1_000, 2).await?;

    let user = create_user(&state.pool, "user@example.com", Role::User).await?;
    let rival = create_user(&state.pool, "rival@example.com", Role::User).await?;
    let address = create_address(&state.pool, user.user_id, LON, LAT).await?;
    let rival_address = create_address(&state.pool, rival.user_id, LON, LAT).await?;

    let line_plenty = add_to_cart(state, &user, pp_plenty, 4).await?;
    let line_scarce = add_to_cart(state, &user, pp_scarce, 2).await?;
    let rival_line = add_to_cart(state, &rival, pp_scarce, 1).await?;
    order_service::place_order(
        state,
        &rival,
        order_request(vec![rival_line], 1_000, 0, rival_address),
    )
    .await?;

    let err = order_service::place_order(
        state,
        &user,
        order_request(vec![line_plenty, line_scarce], 6_000, 0, address),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), "not-enough-stock");

    assert_eq!(total_stock(state, pp_plenty).await?, 10);
    assert_eq!(total_stock(state, pp_scarce).await?, 1);
    assert_eq!(ledger(&state.pool, pp_plenty).await?, vec![10, -4, 4]);

    let canceled = order_service::list(
        state,
        &user,
        OrderListQuery {
            status: Some("canceled".into()),
            ..Default::default()
        },
    )
    .await?;
    assert_eq!(canceled.data.expect("orders").items.len(), 1);
    Ok(())
}

#[tokio::test]
async fn totals_are_checked_and_listing_is_scoped() -> anyhow::Result<()> {
    let Some(ctx) = setup().await? else {
        return Ok(());
    };
    let state = &ctx.state;
    let (manager, manager_id) = create_manager(&state.pool, "manager@example.com").await?;
    let (stranger, _) = create_manager(&state.pool, "stranger@example.com").await?;
    let pharmacy_id = create_pharmacy(&state.pool, manager_id, "Apotek A", LON, LAT).await?;
    let product_id = create_product(&state.pool, "Antacid").await?;
    let pp = stock_product(&state.pool, pharmacy_id, product_id, 7_500, 10).await?;

    let user = create_user(&state.pool, "user@example.com", Role::User).await?;
    let address = create_address(&state.pool, user.user_id, LON, LAT).await?;
    let line = add_to_cart(state, &user, pp, 2).await?;

    let err = order_service::place_order(state, &user, order_request(vec![line], 1, 0, address))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "bad-request");

    let placed =
        order_service::place_order(state, &user, order_request(vec![line], 15_000, 2_000, address))
            .await?
            .data
            .expect("order");

    let own = order_service::get(state, &user, placed.order_id).await?;
    let detail = own.data.expect("detail");
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].quantity, 2);

    let visible = order_service::list(state, &manager, OrderListQuery::default()).await?;
    assert_eq!(visible.data.expect("orders").items.len(), 1);
    let hidden = order_service::list(state, &stranger, OrderListQuery::default()).await?;
    assert!(hidden.data.expect("orders").items.is_empty());

    let err = order_service::get(state, &stranger, placed.order_id)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "not-found");

    let doctor = AuthUser {
        user_id: user.user_id,
        role: Role::Doctor,
    };
    assert!(matches!(
        order_service::list(state, &doctor, OrderListQuery::default()).await,
        Err(AppError::Forbidden)
    ));
    Ok(())
}

// An admin moves the order on between commit and stock taking; the failed
// item is dropped and a later cancel gives back only what was taken.
#[tokio::test]
async fn placement_interrupted_by_processing_keeps_only_taken_items() -> anyhow::Result<()> {
    let Some(ctx) = setup().await? else {
        return Ok(());
    };
    let state = &ctx.state;
    let (manager, manager_id) = create_manager(&state.pool, "manager@example.com").await?;
    let admin = create_user(&state.pool, "admin@example.com", Role::Admin).await?;
    let pharmacy_id = create_pharmacy(&state.pool, manager_id, "Apotek A", LON, LAT).await?;
    let plenty = create_product(&state.pool, "Plenty").await?;
    let scarce = create_product(&state.pool, "Scarce").await?;
    let pp_plenty = stock_product(&state.pool, pharmacy_id, plenty, 1_000, 10).await?;
    let pp_scarce = stock_product(&state.pool, pharmacy_id, scarce, 1_000, 2).await?;

    let user = create_user(&state.pool, "user@example.com", Role::User).await?;
    let rival = create_user(&state.pool, "rival@example.com", Role::User).await?;
    let address = create_address(&state.pool, user.user_id, LON, LAT).await?;
    let rival_address = create_address(&state.pool, rival.user_id, LON, LAT).await?;

    let line_plenty = add_to_cart(state, &user, pp_plenty, 4).await?;
    let line_scarce = add_to_cart(state, &user, pp_scarce, 2).await?;
    let rival_line = add_to_cart(state, &rival, pp_scarce, 1).await?;
    order_service::place_order(
        state,
        &rival,
        order_request(vec![rival_line], 1_000, 0, rival_address),
    )
    .await?;

    let order = order_service::open_order(
        state,
        &user,
        order_request(vec![line_plenty, line_scarce], 6_000, 0, address),
    )
    .await?;
    assert_eq!(total_stock(state, pp_plenty).await?, 10);

    order_service::transition(state, &admin, order.id, OrderStatus::Processing).await?;

    let err = order_service::take_order_stock(state, order.id)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "not-enough-stock");
    assert_eq!(status_of(state, order.id).await?, Some(OrderStatus::Processing));
    assert_eq!(total_stock(state, pp_plenty).await?, 6);
    assert_eq!(total_stock(state, pp_scarce).await?, 1);

    let items = orders::items_of(&state.orm, order.id).await?;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].pharmacy_product_id, pp_plenty);

    order_service::transition(state, &manager, order.id, OrderStatus::Canceled).await?;
    assert_eq!(total_stock(state, pp_plenty).await?, 10);
    assert_eq!(total_stock(state, pp_scarce).await?, 1);
    assert_eq!(ledger(&state.pool, pp_plenty).await?, vec![10, -4, 4]);
    assert_eq!(ledger(&state.pool, pp_scarce).await?, vec![2, -1]);
    Ok(())
}

// A self-cancel lands before any stock is taken: nothing is taken afterwards
// and nothing is given back.
#[tokio::test]
async fn order_canceled_before_stock_is_taken_moves_no_stock() -> anyhow::Result<()> {
    let Some(ctx) = setup().await? else {
        return Ok(());
    };
    let state = &ctx.state;
    let (_, manager_id) = create_manager(&state.pool, "manager@example.com").await?;
    let pharmacy_id = create_pharmacy(&state.pool, manager_id, "Apotek A", LON, LAT).await?;
    let first = create_product(&state.pool, "Amoxicillin").await?;
    let second = create_product(&state.pool, "Vitamin C").await?;
    let pp_first = stock_product(&state.pool, pharmacy_id, first, 2_000, 5).await?;
    let pp_second = stock_product(&state.pool, pharmacy_id, second, 1_000, 5).await?;

    let user = create_user(&state.pool, "user@example.com", Role::User).await?;
    let address = create_address(&state.pool, user.user_id, LON, LAT).await?;
    let line_first = add_to_cart(state, &user, pp_first, 2).await?;
    let line_second = add_to_cart(state, &user, pp_second, 3).await?;

    let order = order_service::open_order(
        state,
        &user,
        order_request(vec![line_first, line_second], 7_000, 0, address),
    )
    .await?;
    order_service::transition(state, &user, order.id, OrderStatus::Canceled).await?;

    let err = order_service::take_order_stock(state, order.id)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "bad-request");
    assert_eq!(status_of(state, order.id).await?, Some(OrderStatus::Canceled));
    assert_eq!(total_stock(state, pp_first).await?, 5);
    assert_eq!(total_stock(state, pp_second).await?, 5);
    assert_eq!(ledger(&state.pool, pp_first).await?, vec![5]);
    assert_eq!(ledger(&state.pool, pp_second).await?, vec![5]);
    Ok(())
}

#[tokio::test]
async fn manager_cancel_of_processing_order_restores_stock() -> anyhow::Result<()> {
    let Some(ctx) = setup().await? else {
        return Ok(());
    };
    let state = &ctx.state;
    let (manager, manager_id) = create_manager(&state.pool, "manager@example.com").await?;
    let admin = create_user(&state.pool, "admin@example.com", Role::Admin).await?;
    let pharmacy_id = create_pharmacy(&state.pool, manager_id, "Apotek A", LON, LAT).await?;
    let product_id = create_product(&state.pool, "Salbutamol").await?;
    let pp = stock_product(&state.pool, pharmacy_id, product_id, 12_000, 5).await?;

    let user = create_user(&state.pool, "user@example.com", Role::User).await?;
    let address = create_address(&state.pool, user.user_id, LON, LAT).await?;
    let line = add_to_cart(state, &user, pp, 2).await?;
    let order_id =
        order_service::place_order(state, &user, order_request(vec![line], 24_000, 0, address))
            .await?
            .data
            .expect("order")
            .order_id;
    order_service::transition(state, &admin, order_id, OrderStatus::Processing).await?;
    assert_eq!(total_stock(state, pp).await?, 3);

    // Users may only cancel pending orders.
    let err = order_service::transition(state, &user, order_id, OrderStatus::Canceled)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "bad-request");

    order_service::transition(state, &manager, order_id, OrderStatus::Canceled).await?;
    assert_eq!(status_of(state, order_id).await?, Some(OrderStatus::Canceled));
    assert_eq!(total_stock(state, pp).await?, 5);
    assert_eq!(ledger(&state.pool, pp).await?, vec![5, -2, 2]);

    let err = order_service::transition(state, &manager, order_id, OrderStatus::Canceled)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "bad-request");
    assert_eq!(total_stock(state, pp).await?, 5);
    Ok(())
}

// One item cannot be given back; the others still are and the error surfaces.
#[tokio::test]
async fn cancel_restores_remaining_items_when_one_fails() -> anyhow::Result<()> {
    let Some(ctx) = setup().await? else {
        return Ok(());
    };
    let state = &ctx.state;
    let (_, manager_id) = create_manager(&state.pool, "manager@example.com").await?;
    let pharmacy_id = create_pharmacy(&state.pool, manager_id, "Apotek A", LON, LAT).await?;
    let delisted = create_product(&state.pool, "Delisted").await?;
    let kept = create_product(&state.pool, "Kept").await?;
    let pp_delisted = stock_product(&state.pool, pharmacy_id, delisted, 1_000, 6).await?;
    let pp_kept = stock_product(&state.pool, pharmacy_id, kept, 1_000, 6).await?;

    let user = create_user(&state.pool, "user@example.com", Role::User).await?;
    let address = create_address(&state.pool, user.user_id, LON, LAT).await?;
    let line_delisted = add_to_cart(state, &user, pp_delisted, 1).await?;
    let line_kept = add_to_cart(state, &user, pp_kept, 2).await?;
    let order_id = order_service::place_order(
        state,
        &user,
        order_request(vec![line_delisted, line_kept], 3_000, 0, address),
    )
    .await?
    .data
    .expect("order")
    .order_id;

    sqlx::query("UPDATE pharmacy_products SET deleted_at = NOW() WHERE id = $1")
        .bind(pp_delisted)
        .execute(&state.pool)
        .await?;

    let err = order_service::transition(state, &user, order_id, OrderStatus::Canceled)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "not-found");
    assert_eq!(status_of(state, order_id).await?, Some(OrderStatus::Canceled));
    assert_eq!(total_stock(state, pp_kept).await?, 6);
    assert_eq!(ledger(&state.pool, pp_kept).await?, vec![6, -2, 2]);
    assert_eq!(ledger(&state.pool, pp_delisted).await?, vec![6, -1]);
    Ok(())
}
