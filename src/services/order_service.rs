use std::collections::{HashMap, HashSet};

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    audit,
    db::UnitOfWork,
    dto::orders::{OrderList, OrderWithItems, PlaceOrderRequest, PlaceOrderResponse},
    entity::{order_items::Model as OrderItemModel, orders::Model as OrderModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_role},
    models::Order,
    repository::{
        accounts, cart_items,
        orders::{self, NewOrder, OrderFilter, OrderScope},
        pharmacy_products, stock_histories,
    },
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    state::AppState,
    status::{OrderStatus, Role},
    storage::{MAX_PAYMENT_PROOF_KB, validate_image},
};

const PAYMENT_WINDOW_HOURS: i64 = 1;

/// Places an order from cart lines of a single pharmacy: [`open_order`]
/// followed by [`take_order_stock`].
pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
    payload: PlaceOrderRequest,
) -> AppResult<ApiResponse<PlaceOrderResponse>> {
    let order = open_order(state, user, payload).await?;
    let items = take_order_stock(state, order.id).await?;

    tracing::info!(
        order_id = order.id,
        order_number = %order.order_number,
        items,
        "order placed"
    );
    audit::record(
        &state.pool,
        user.user_id,
        "order_place",
        "orders",
        serde_json::json!({ "order_id": order.id, "total_price": order.total_price }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order created",
        PlaceOrderResponse {
            order_id: order.id,
            order_number: order.order_number,
            payment_deadline: order.payment_deadline.with_timezone(&Utc),
        },
        None,
    ))
}

/// Commits a pending order with its items and clears the cart lines, all in
/// one transaction. No stock is taken yet.
pub async fn open_order(
    state: &AppState,
    user: &AuthUser,
    payload: PlaceOrderRequest,
) -> AppResult<OrderModel> {
    ensure_role(user, Role::User)?;
    validate_place_order(&payload)?;

    if !accounts::user_address_belongs_to(&state.pool, payload.user_address_id, user.user_id)
        .await?
    {
        return Err(AppError::not_found("user address"));
    }

    let user_id = user.user_id;
    state
        .orm
        .within(move |txn| {
            Box::pin(async move {
                let lines = cart_items::checkout_lines(txn, &payload.cart_item_ids, user_id).await?;
                if lines.len() != payload.cart_item_ids.len() {
                    return Err(AppError::not_found("cart item"));
                }
                let pharmacy_id = lines[0].pharmacy_id;
                if lines.iter().any(|l| l.pharmacy_id != pharmacy_id) {
                    return Err(AppError::BadRequest(
                        "all cart items must come from the same pharmacy".into(),
                    ));
                }

                let expected = order_total(
                    lines.iter().map(|l| (l.price, l.quantity)),
                    payload.shipping_fee,
                );
                if expected != payload.total_price {
                    return Err(AppError::BadRequest(format!(
                        "total price does not match, expected {expected}"
                    )));
                }

                let order = orders::insert(
                    txn,
                    NewOrder {
                        order_number: Uuid::new_v4(),
                        total_price: expected,
                        payment_deadline: Utc::now() + Duration::hours(PAYMENT_WINDOW_HOURS),
                        shipping_fee: payload.shipping_fee,
                        shipping_method: payload.shipping_method,
                        user_address_id: payload.user_address_id,
                        pharmacy_id,
                    },
                )
                .await?;

                for line in &lines {
                    orders::insert_item(
                        txn,
                        order.id,
                        line.pharmacy_product_id,
                        line.quantity,
                        line.price,
                    )
                    .await?;
                }
                cart_items::soft_delete(txn, &payload.cart_item_ids, user_id).await?;
                Ok(order)
            })
        })
        .await
}

/// Takes stock for every item of an opened order, one item per transaction
/// under the pharmacy-product row lock, each decrement paired with its ledger
/// row and the item's taken flag. If an item cannot be covered the order is
/// canceled, whatever was taken is given back and the stock error returned.
/// Returns the number of items.
pub async fn take_order_stock(state: &AppState, order_id: i64) -> AppResult<usize> {
    let items = orders::items_of(&state.orm, order_id).await?;
    for item in &items {
        if let Err(err) = take_stock(state, item).await {
            tracing::warn!(
                order_id,
                pharmacy_product_id = item.pharmacy_product_id,
                error = %err,
                "stock decrement failed, canceling order"
            );
            compensate(state, order_id).await;
            return Err(err);
        }
    }
    Ok(items.len())
}

/// Moves an order to `target` if the caller's role may perform that step and
/// the order is within the caller's reach. Cancellation gives the stock back.
pub async fn transition(
    state: &AppState,
    user: &AuthUser,
    order_id: i64,
    target: OrderStatus,
) -> AppResult<ApiResponse<Order>> {
    let source = OrderStatus::transition_source(target, user.role).ok_or_else(|| {
        AppError::BadRequest(format!("{} cannot move an order to {target}", user.role))
    })?;
    let scope = scope_for(user)?;
    let self_cancel = target == OrderStatus::Canceled && user.role == Role::User;

    let affected =
        orders::transition(&state.orm, order_id, source, target, scope, self_cancel).await?;
    if affected == 0 {
        return Err(explain_rejected_transition(state, order_id, scope, source, self_cancel).await);
    }

    tracing::info!(order_id, from = %source, to = %target, role = %user.role, "order status changed");

    if target == OrderStatus::Canceled {
        let restored = restore_items(state, order_id).await?;
        tracing::info!(order_id, items = restored, "order stock restored");
    }

    audit::record(
        &state.pool,
        user.user_id,
        "order_transition",
        "orders",
        serde_json::json!({ "order_id": order_id, "from": source.name(), "to": target.name() }),
    )
    .await;

    let order = orders::get(&state.orm, order_id).await?;
    Ok(ApiResponse::success(
        format!("Order {}", target.name().to_lowercase()),
        Order::from(order),
        None,
    ))
}

/// The guarded update matched nothing: hidden orders are not-found, visible
/// ones failed a state or payment guard.
async fn explain_rejected_transition(
    state: &AppState,
    order_id: i64,
    scope: OrderScope,
    source: OrderStatus,
    self_cancel: bool,
) -> AppError {
    let order = match orders::find_visible(&state.orm, order_id, scope).await {
        Ok(Some(order)) => order,
        Ok(None) => return AppError::not_found("order"),
        Err(err) => return err,
    };
    let current = OrderStatus::from_id(order.order_status_id);
    if current != Some(source) {
        let current = current.map(|s| s.name()).unwrap_or("unknown");
        return AppError::BadRequest(format!("order is {current}, expected {source}"));
    }
    if self_cancel && order.payment_proof.is_some() {
        return AppError::BadRequest("order with a payment proof can no longer be canceled".into());
    }
    AppError::BadRequest("order was modified concurrently, try again".into())
}

pub async fn upload_payment_proof(
    state: &AppState,
    user: &AuthUser,
    order_id: i64,
    file_name: &str,
    bytes: Vec<u8>,
) -> AppResult<ApiResponse<Order>> {
    ensure_role(user, Role::User)?;
    validate_image(file_name, bytes.len(), MAX_PAYMENT_PROOF_KB)?;

    let pending = orders::find_visible(&state.orm, order_id, OrderScope::User(user.user_id))
        .await?
        .is_some_and(|o| o.order_status_id == OrderStatus::Pending.id());
    if !pending {
        return Err(AppError::BadRequest(
            "payment proof can only be added to your own pending order".into(),
        ));
    }

    let url = state.uploader.upload("payment-proofs", file_name, bytes).await?;
    let affected = orders::set_payment_proof(&state.orm, order_id, user.user_id, &url).await?;
    if affected == 0 {
        if let Err(err) = state.uploader.remove(&url).await {
            tracing::warn!(order_id, url = %url, error = %err, "failed to remove unused payment proof");
        }
        return Err(AppError::BadRequest("order is no longer pending".into()));
    }

    audit::record(
        &state.pool,
        user.user_id,
        "order_payment_proof",
        "orders",
        serde_json::json!({ "order_id": order_id, "url": url }),
    )
    .await;

    let order = orders::get(&state.orm, order_id).await?;
    Ok(ApiResponse::success("Payment proof uploaded", Order::from(order), None))
}

pub async fn list(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(name) => OrderStatus::from_name(name)
            .ok_or_else(|| AppError::BadRequest(format!("unknown order status {name}")))?,
        None => OrderStatus::Pending,
    };
    let filter = OrderFilter {
        scope: scope_for(user)?,
        status: Some(status),
        pharmacy_id: query.pharmacy_id,
    };

    let (rows, total) = orders::list(&state.pool, &filter, limit, offset).await?;
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let mut items_by_order: HashMap<i64, Vec<_>> = HashMap::new();
    for item in orders::items_for_orders(&state.pool, &ids).await? {
        items_by_order.entry(item.order_id).or_default().push(item);
    }

    let items = rows
        .into_iter()
        .map(|order| OrderWithItems {
            items: items_by_order.remove(&order.id).unwrap_or_default(),
            order,
        })
        .collect();

    Ok(ApiResponse::success(
        "Ok",
        OrderList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get(
    state: &AppState,
    user: &AuthUser,
    order_id: i64,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = orders::find_row(&state.pool, order_id, scope_for(user)?)
        .await?
        .ok_or_else(|| AppError::not_found("order"))?;
    let items = orders::items_for_orders(&state.pool, &[order.id]).await?;
    Ok(ApiResponse::success(
        "OK",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

fn scope_for(user: &AuthUser) -> AppResult<OrderScope> {
    match user.role {
        Role::User => Ok(OrderScope::User(user.user_id)),
        Role::PharmacyManager => Ok(OrderScope::Manager(user.user_id)),
        Role::Admin => Ok(OrderScope::Admin),
        Role::Doctor => Err(AppError::Forbidden),
    }
}

fn validate_place_order(payload: &PlaceOrderRequest) -> AppResult<()> {
    if payload.cart_item_ids.is_empty() {
        return Err(AppError::BadRequest("cartItemIds must not be empty".into()));
    }
    let unique: HashSet<i64> = payload.cart_item_ids.iter().copied().collect();
    if unique.len() != payload.cart_item_ids.len() {
        return Err(AppError::BadRequest("cartItemIds must not repeat".into()));
    }
    if payload.shipping_fee.is_sign_negative() {
        return Err(AppError::BadRequest("shippingFee must not be negative".into()));
    }
    if payload.shipping_method.trim().is_empty() {
        return Err(AppError::BadRequest("shippingMethod is required".into()));
    }
    Ok(())
}

fn order_total(lines: impl Iterator<Item = (Decimal, i32)>, shipping_fee: Decimal) -> Decimal {
    lines.fold(shipping_fee, |acc, (price, qty)| acc + price * Decimal::from(qty))
}

async fn take_stock(state: &AppState, item: &OrderItemModel) -> AppResult<()> {
    let order_id = item.order_id;
    let item_id = item.id;
    let pharmacy_product_id = item.pharmacy_product_id;
    let quantity = item.quantity;
    state
        .orm
        .within(move |txn| {
            Box::pin(async move {
                let order = orders::lock_shared(txn, order_id).await?;
                if order.order_status_id == OrderStatus::Canceled.id() {
                    return Err(AppError::BadRequest(
                        "order was canceled while it was being placed".into(),
                    ));
                }
                if orders::mark_stock_taken(txn, item_id).await? == 0 {
                    return Ok(());
                }

                let product = pharmacy_products::lock(txn, pharmacy_product_id).await?;
                if quantity > product.total_stock {
                    return Err(AppError::NotEnoughStock(format!(
                        "not enough stock for pharmacy product {pharmacy_product_id}, {} left",
                        product.total_stock
                    )));
                }
                pharmacy_products::decrease(txn, product.id, quantity).await?;
                stock_histories::append(
                    txn,
                    product.id,
                    product.pharmacy_id,
                    -quantity,
                    stock_histories::DESC_SELLING,
                )
                .await?;
                Ok(())
            })
        })
        .await
}

/// Gives back one item's stock if it was taken. `false` when there was
/// nothing to give back.
async fn restore_stock(state: &AppState, item: &OrderItemModel) -> AppResult<bool> {
    let item_id = item.id;
    let pharmacy_product_id = item.pharmacy_product_id;
    let quantity = item.quantity;
    state
        .orm
        .within(move |txn| {
            Box::pin(async move {
                if orders::release_stock_taken(txn, item_id).await? == 0 {
                    return Ok(false);
                }
                let product = pharmacy_products::lock(txn, pharmacy_product_id).await?;
                pharmacy_products::increase(txn, product.id, quantity).await?;
                stock_histories::append(
                    txn,
                    product.id,
                    product.pharmacy_id,
                    quantity,
                    stock_histories::DESC_CANCEL_ORDER,
                )
                .await?;
                Ok(true)
            })
        })
        .await
}

/// Restores every taken item of the order. A failed item does not stop the
/// rest; each failure is logged and the first one returned.
async fn restore_items(state: &AppState, order_id: i64) -> AppResult<usize> {
    let items = orders::items_of(&state.orm, order_id).await?;
    let mut restored = 0;
    let mut first_err = None;
    for item in &items {
        match restore_stock(state, item).await {
            Ok(true) => restored += 1,
            Ok(false) => {}
            Err(err) => {
                tracing::error!(
                    order_id,
                    pharmacy_product_id = item.pharmacy_product_id,
                    error = %err,
                    "failed to restore order item stock"
                );
                first_err.get_or_insert(err);
            }
        }
    }
    match first_err {
        Some(err) => Err(err),
        None => Ok(restored),
    }
}

/// Unwinds a half-placed order. When it is still pending it is canceled and
/// its taken stock given back. When someone else already moved it, it keeps
/// only the items that got their stock, so a later cancellation restores
/// exactly those. Failures are logged; the caller reports the stock error.
async fn compensate(state: &AppState, order_id: i64) {
    let canceled =
        orders::force_status(&state.orm, order_id, OrderStatus::Pending, OrderStatus::Canceled)
            .await;
    match canceled {
        Ok(1) => {
            if let Err(err) = restore_items(state, order_id).await {
                tracing::error!(order_id, error = %err, "failed to restore half-placed order");
            }
        }
        Ok(_) => {
            let dropped = state
                .orm
                .within(move |txn| {
                    Box::pin(async move { orders::drop_untaken_items(txn, order_id).await })
                })
                .await;
            match dropped {
                Ok(dropped) => tracing::warn!(
                    order_id,
                    dropped,
                    "half-placed order changed status, dropped items without stock"
                ),
                Err(err) => {
                    tracing::error!(order_id, error = %err, "failed to drop items without stock")
                }
            }
        }
        Err(err) => tracing::error!(order_id, error = %err, "failed to cancel half-placed order"),
    }
}
