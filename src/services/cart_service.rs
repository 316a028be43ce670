use std::collections::HashMap;

use sea_orm::ConnectionTrait;

use crate::{
    audit,
    db::UnitOfWork,
    dto::cart::{
        AddToCartRequest, BulkDeleteCartRequest, CartLine, CartLineQuantity, CartList,
        PharmacyCart, PrescriptionCartResult, PrescriptionToCartRequest,
    },
    entity::{cart_items::Model as CartItemModel, pharmacy_products::Model as PharmacyProductModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_role},
    models::CartItem,
    repository::{accounts, cart_items, geo, pharmacies, pharmacy_products},
    response::{ApiResponse, Meta},
    routes::params::validate_coordinates,
    state::AppState,
    status::Role,
};

pub async fn create(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    ensure_role(user, Role::User)?;
    let qty = positive_quantity(Some(payload.quantity))?;

    let line = match add_line(&state.orm, user.user_id, payload.pharmacy_product_id, qty).await {
        // A concurrent create won the insert; fold into its line instead.
        Err(AppError::Conflict(_)) => {
            add_line(&state.orm, user.user_id, payload.pharmacy_product_id, qty).await?
        }
        other => other?,
    };

    audit::record(
        &state.pool,
        user.user_id,
        "cart_add",
        "cart_items",
        serde_json::json!({ "cart_item_id": line.id, "quantity": qty }),
    )
    .await;

    Ok(ApiResponse::success("Added to cart", CartItem::from(line), None))
}

pub async fn increase(
    state: &AppState,
    user: &AuthUser,
    cart_item_id: i64,
    quantity: Option<i32>,
) -> AppResult<ApiResponse<CartItem>> {
    ensure_role(user, Role::User)?;
    let qty = positive_quantity(quantity)?;
    let line = cart_items::find_owned(&state.orm, cart_item_id, user.user_id).await?;
    let line = increase_line(&state.orm, line, qty).await?;
    Ok(ApiResponse::success("Cart updated", CartItem::from(line), None))
}

pub async fn decrease(
    state: &AppState,
    user: &AuthUser,
    cart_item_id: i64,
    quantity: Option<i32>,
) -> AppResult<ApiResponse<CartLineQuantity>> {
    ensure_role(user, Role::User)?;
    let qty = positive_quantity(quantity)?;
    let remaining = cart_items::decrease(&state.orm, cart_item_id, user.user_id, qty).await?;

    let removed = remaining.quantity <= 0;
    if removed {
        cart_items::soft_delete(&state.orm, &[remaining.id], user.user_id).await?;
    }

    Ok(ApiResponse::success(
        "Cart updated",
        CartLineQuantity {
            id: remaining.id,
            quantity: remaining.quantity.max(0),
            removed,
        },
        None,
    ))
}

pub async fn delete(
    state: &AppState,
    user: &AuthUser,
    cart_item_id: i64,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_role(user, Role::User)?;
    let affected = cart_items::soft_delete(&state.orm, &[cart_item_id], user.user_id).await?;
    if affected == 0 {
        return Err(AppError::not_found("cart item"));
    }
    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn bulk_delete(
    state: &AppState,
    user: &AuthUser,
    payload: BulkDeleteCartRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_role(user, Role::User)?;
    if payload.cart_item_ids.is_empty() {
        return Err(AppError::BadRequest("cartItemIds must not be empty".into()));
    }
    let affected =
        cart_items::soft_delete(&state.orm, &payload.cart_item_ids, user.user_id).await?;
    if affected == 0 {
        return Err(AppError::not_found("cart item"));
    }
    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({ "removed": affected }),
        Some(Meta::empty()),
    ))
}

/// Cart lines grouped per pharmacy with the shipping methods each pharmacy offers.
pub async fn list(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartList>> {
    ensure_role(user, Role::User)?;
    let rows = cart_items::list_for_user(&state.pool, user.user_id).await?;

    let mut groups: Vec<PharmacyCart> = Vec::new();
    for row in rows {
        let line = CartLine {
            id: row.id,
            pharmacy_product_id: row.pharmacy_product_id,
            product_id: row.product_id,
            product_name: row.product_name,
            picture_url: row.picture_url,
            price: row.price,
            quantity: row.quantity,
            total_stock: row.total_stock,
            weight: row.weight,
        };
        match groups.last_mut() {
            Some(group) if group.pharmacy_id == row.pharmacy_id => group.items.push(line),
            _ => groups.push(PharmacyCart {
                pharmacy_id: row.pharmacy_id,
                pharmacy_name: row.pharmacy_name,
                official_shipping_methods: Vec::new(),
                non_official_shipping_methods: Vec::new(),
                items: vec![line],
            }),
        }
    }

    let pharmacy_ids: Vec<i64> = groups.iter().map(|g| g.pharmacy_id).collect();
    if !pharmacy_ids.is_empty() {
        let mut official: HashMap<i64, Vec<_>> = HashMap::new();
        for method in pharmacies::official_shipping_methods(&state.pool, &pharmacy_ids).await? {
            official.entry(method.pharmacy_id).or_default().push(method);
        }
        let mut non_official: HashMap<i64, Vec<_>> = HashMap::new();
        for method in pharmacies::non_official_shipping_methods(&state.pool, &pharmacy_ids).await? {
            non_official.entry(method.pharmacy_id).or_default().push(method);
        }
        for group in &mut groups {
            group.official_shipping_methods = official.remove(&group.pharmacy_id).unwrap_or_default();
            group.non_official_shipping_methods =
                non_official.remove(&group.pharmacy_id).unwrap_or_default();
        }
    }

    Ok(ApiResponse::success(
        "OK",
        CartList { pharmacies: groups },
        Some(Meta::empty()),
    ))
}

/// Puts every prescribed product of a consultation into the caller's cart,
/// each from the nearest pharmacy that stocks it. All lines or none.
pub async fn add_prescription_to_cart(
    state: &AppState,
    user: &AuthUser,
    consultation_id: i64,
    payload: PrescriptionToCartRequest,
) -> AppResult<ApiResponse<PrescriptionCartResult>> {
    ensure_role(user, Role::User)?;
    validate_coordinates(payload.longitude, payload.latitude)?;

    let participants = accounts::consultation_participants(&state.pool, consultation_id)
        .await?
        .ok_or_else(|| AppError::not_found("consultation"))?;
    if participants.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    let prescribed = accounts::prescription_items(&state.pool, consultation_id).await?;
    if prescribed.is_empty() {
        return Err(AppError::BadRequest("consultation has no prescription".into()));
    }

    let mut resolved = Vec::with_capacity(prescribed.len());
    for item in prescribed {
        let pharmacy_product_id = geo::nearest_pharmacy_product_for(
            &state.pool,
            payload.longitude,
            payload.latitude,
            state.config.default_radius_meters,
            item.product_id,
        )
        .await?
        .ok_or_else(|| {
            AppError::BadRequest(format!("{} is not available near you", item.product_name))
        })?;
        resolved.push((pharmacy_product_id, item.quantity));
    }

    let user_id = user.user_id;
    let cart_item_ids = state
        .orm
        .within(move |txn| {
            Box::pin(async move {
                let mut ids = Vec::with_capacity(resolved.len());
                for (pharmacy_product_id, quantity) in resolved {
                    let line = add_line(txn, user_id, pharmacy_product_id, quantity).await?;
                    ids.push(line.id);
                }
                Ok(ids)
            })
        })
        .await?;

    audit::record(
        &state.pool,
        user.user_id,
        "cart_add_prescription",
        "cart_items",
        serde_json::json!({ "consultation_id": consultation_id, "cart_item_ids": cart_item_ids }),
    )
    .await;

    Ok(ApiResponse::success(
        "Prescription added to cart",
        PrescriptionCartResult { cart_item_ids },
        None,
    ))
}

/// Inserts a new line or grows the existing one. Stock is checked without a
/// lock; placement re-checks under the row lock.
async fn add_line<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    pharmacy_product_id: i64,
    qty: i32,
) -> AppResult<CartItemModel> {
    match cart_items::find_active(db, user_id, pharmacy_product_id).await? {
        Some(line) => increase_line(db, line, qty).await,
        None => {
            let product = pharmacy_products::get(db, pharmacy_product_id).await?;
            ensure_stock(&product, qty)?;
            cart_items::insert(db, user_id, pharmacy_product_id, qty).await
        }
    }
}

async fn increase_line<C: ConnectionTrait>(
    db: &C,
    line: CartItemModel,
    qty: i32,
) -> AppResult<CartItemModel> {
    let product = pharmacy_products::get(db, line.pharmacy_product_id).await?;
    let wanted = line
        .quantity
        .checked_add(qty)
        .ok_or_else(|| AppError::BadRequest("quantity is too large".into()))?;
    ensure_stock(&product, wanted)?;
    cart_items::set_quantity(db, line.id, wanted).await
}

fn ensure_stock(product: &PharmacyProductModel, wanted: i32) -> AppResult<()> {
    if !product.is_available {
        return Err(AppError::NotEnoughStock("product is not available".into()));
    }
    if wanted > product.total_stock {
        return Err(AppError::NotEnoughStock(format!(
            "only {} left in stock",
            product.total_stock
        )));
    }
    Ok(())
}

fn positive_quantity(quantity: Option<i32>) -> AppResult<i32> {
    let qty = quantity.unwrap_or(1);
    if qty <= 0 {
        return Err(AppError::BadRequest("quantity must be greater than 0".into()));
    }
    Ok(qty)
}
