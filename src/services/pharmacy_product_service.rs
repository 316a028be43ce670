use crate::{
    audit,
    db::UnitOfWork,
    dto::inventory::{AdjustStockRequest, CreatePharmacyProductRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_any},
    models::PharmacyProduct,
    repository::{
        geo::{self, NearestFilter, NearestProductRow},
        pharmacies, pharmacy_products, stock_histories,
    },
    response::{ApiResponse, Meta},
    routes::params::{NearestProductsQuery, SortOrder},
    state::AppState,
    status::Role,
};

const STOCK_ROLES: [Role; 2] = [Role::PharmacyManager, Role::Admin];

pub async fn create(
    state: &AppState,
    user: &AuthUser,
    payload: CreatePharmacyProductRequest,
) -> AppResult<ApiResponse<PharmacyProduct>> {
    ensure_any(user, &STOCK_ROLES)?;
    if payload.price.is_sign_negative() {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }
    if payload.total_stock < 0 {
        return Err(AppError::BadRequest("totalStock must not be negative".into()));
    }
    pharmacies::get(&state.orm, payload.pharmacy_id).await?;
    ensure_manages(state, user, payload.pharmacy_id).await?;

    let created = state
        .orm
        .within(move |txn| {
            Box::pin(async move {
                let row = pharmacy_products::insert(
                    txn,
                    payload.pharmacy_id,
                    payload.product_id,
                    payload.price,
                    payload.total_stock,
                    payload.is_available.unwrap_or(true),
                )
                .await?;
                if row.total_stock > 0 {
                    stock_histories::append(
                        txn,
                        row.id,
                        row.pharmacy_id,
                        row.total_stock,
                        stock_histories::DESC_INITIAL_STOCK,
                    )
                    .await?;
                }
                Ok(row)
            })
        })
        .await?;

    audit::record(
        &state.pool,
        user.user_id,
        "pharmacy_product_create",
        "pharmacy_products",
        serde_json::json!({ "pharmacy_product_id": created.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Pharmacy product created",
        PharmacyProduct::from(created),
        None,
    ))
}

/// Applies a signed stock change under the row lock and records it.
pub async fn adjust_stock(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    payload: AdjustStockRequest,
) -> AppResult<ApiResponse<PharmacyProduct>> {
    ensure_any(user, &STOCK_ROLES)?;
    if payload.delta == 0 {
        return Err(AppError::BadRequest("delta must not be 0".into()));
    }
    let current = pharmacy_products::get(&state.orm, id).await?;
    ensure_manages(state, user, current.pharmacy_id).await?;

    let delta = payload.delta;
    let description = payload
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| stock_histories::DESC_STOCK_ADJUSTMENT.to_string());

    let updated = state
        .orm
        .within(move |txn| {
            Box::pin(async move {
                let row = pharmacy_products::lock(txn, id).await?;
                let next = row.total_stock.checked_add(delta).unwrap_or(-1);
                if next < 0 {
                    return Err(AppError::NotEnoughStock(format!(
                        "only {} left in stock",
                        row.total_stock
                    )));
                }
                if delta > 0 {
                    pharmacy_products::increase(txn, row.id, delta).await?;
                } else {
                    pharmacy_products::decrease(txn, row.id, -delta).await?;
                }
                stock_histories::append(txn, row.id, row.pharmacy_id, delta, &description).await?;
                pharmacy_products::get(txn, row.id).await
            })
        })
        .await?;

    tracing::info!(pharmacy_product_id = id, delta, "stock adjusted");
    audit::record(
        &state.pool,
        user.user_id,
        "pharmacy_product_adjust_stock",
        "pharmacy_products",
        serde_json::json!({ "pharmacy_product_id": id, "delta": delta }),
    )
    .await;

    Ok(ApiResponse::success(
        "Stock updated",
        PharmacyProduct::from(updated),
        None,
    ))
}

pub async fn get(state: &AppState, id: i64) -> AppResult<ApiResponse<PharmacyProduct>> {
    let row = pharmacy_products::get(&state.orm, id).await?;
    Ok(ApiResponse::success("OK", PharmacyProduct::from(row), None))
}

pub async fn list_nearest(
    state: &AppState,
    query: NearestProductsQuery,
) -> AppResult<ApiResponse<Vec<NearestProductRow>>> {
    let (longitude, latitude, radius) = query.geo().validate(state.config.default_radius_meters)?;
    let (page, limit, offset) = query.pagination().normalize();
    let filter = NearestFilter {
        longitude,
        latitude,
        radius,
        category_id: query.category_id,
        keyword: query.keyword,
        sort_by: query.sort_by.unwrap_or_default(),
        sort: query.sort.unwrap_or(SortOrder::Asc),
    };
    let (rows, total) = geo::list_nearest(&state.pool, &filter, limit, offset).await?;
    Ok(ApiResponse::success("OK", rows, Some(Meta::new(page, limit, total))))
}

/// Managers may only touch pharmacies they run; admins may touch any.
async fn ensure_manages(state: &AppState, user: &AuthUser, pharmacy_id: i64) -> AppResult<()> {
    if user.role == Role::PharmacyManager
        && !pharmacies::is_owned_by_manager_user(&state.pool, pharmacy_id, user.user_id).await?
    {
        return Err(AppError::Forbidden);
    }
    Ok(())
}
