//! Pharmacy-product stock, stock transfers and the stock ledger.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, patch, post, put},
};

use crate::{
    dto::inventory::{
        AdjustStockRequest, CreatePharmacyProductRequest, CreateStockTransferRequest,
        UpdateStockTransferStatusRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{PharmacyProduct, StockTransfer},
    repository::{
        geo::NearestProductRow,
        stock_histories::{MonthlyStockRow, StockHistoryRow},
        stock_transfers::StockTransferRow,
    },
    response::ApiResponse,
    routes::params::{NearestProductsQuery, StockHistoryQuery, StockTransferListQuery},
    services::{pharmacy_product_service, stock_history_service, stock_transfer_service},
    state::AppState,
};

pub fn pharmacy_products_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_pharmacy_product))
        .route("/nearest", get(nearest_products))
        .route("/{id}", get(get_pharmacy_product))
        .route("/{id}/stock", patch(adjust_stock))
}

pub fn stock_transfers_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_stock_transfers).post(create_stock_transfer))
        .route("/status", put(update_stock_transfer_status))
}

pub fn stock_histories_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_stock_histories))
        .route("/report", get(stock_report))
}

#[utoipa::path(
    post,
    path = "/api/pharmacy-products",
    request_body = CreatePharmacyProductRequest,
    responses(
        (status = 200, description = "Pharmacy product created with opening stock", body = ApiResponse<PharmacyProduct>),
        (status = 400, description = "Invalid payload or product already in this pharmacy"),
        (status = 403, description = "Pharmacy belongs to another manager")
    ),
    security(("bearer_auth" = [])),
    tag = "Inventory"
)]
pub async fn create_pharmacy_product(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreatePharmacyProductRequest>,
) -> AppResult<Json<ApiResponse<PharmacyProduct>>> {
    Ok(Json(pharmacy_product_service::create(&state, &user, payload).await?))
}

#[utoipa::path(
    get,
    path = "/api/pharmacy-products/{id}",
    params(("id" = i64, Path, description = "Pharmacy product id")),
    responses(
        (status = 200, description = "Pharmacy product", body = ApiResponse<PharmacyProduct>),
        (status = 404, description = "Pharmacy product not found")
    ),
    tag = "Inventory"
)]
pub async fn get_pharmacy_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<PharmacyProduct>>> {
    Ok(Json(pharmacy_product_service::get(&state, id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/pharmacy-products/{id}/stock",
    params(("id" = i64, Path, description = "Pharmacy product id")),
    request_body = AdjustStockRequest,
    responses(
        (status = 200, description = "Stock adjusted", body = ApiResponse<PharmacyProduct>),
        (status = 400, description = "Stock would go below zero")
    ),
    security(("bearer_auth" = [])),
    tag = "Inventory"
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<AdjustStockRequest>,
) -> AppResult<Json<ApiResponse<PharmacyProduct>>> {
    Ok(Json(
        pharmacy_product_service::adjust_stock(&state, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/pharmacy-products/nearest",
    params(
        ("longitude" = f64, Query, description = "Buyer longitude"),
        ("latitude" = f64, Query, description = "Buyer latitude"),
        ("radius" = Option<f64>, Query, description = "Search radius in meters"),
        ("categoryId" = Option<i64>, Query, description = "Category filter"),
        ("keyword" = Option<String>, Query, description = "Product name contains"),
        ("sortBy" = Option<String>, Query, description = "name, price or distance"),
        ("sort" = Option<String>, Query, description = "ASC or DESC"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("limit" = Option<i64>, Query, description = "Items per page, default 10")
    ),
    responses(
        (status = 200, description = "Available products near the buyer", body = ApiResponse<Vec<NearestProductRow>>),
        (status = 400, description = "Invalid coordinates")
    ),
    tag = "Inventory"
)]
pub async fn nearest_products(
    State(state): State<AppState>,
    Query(query): Query<NearestProductsQuery>,
) -> AppResult<Json<ApiResponse<Vec<NearestProductRow>>>> {
    Ok(Json(pharmacy_product_service::list_nearest(&state, query).await?))
}

#[utoipa::path(
    post,
    path = "/api/stock-transfers",
    request_body = CreateStockTransferRequest,
    responses(
        (status = 200, description = "Transfer requested", body = ApiResponse<StockTransfer>),
        (status = 400, description = "Invalid pharmacies or not enough stock at the sender")
    ),
    security(("bearer_auth" = [])),
    tag = "Inventory"
)]
pub async fn create_stock_transfer(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateStockTransferRequest>,
) -> AppResult<Json<ApiResponse<StockTransfer>>> {
    Ok(Json(stock_transfer_service::create(&state, &user, payload).await?))
}

#[utoipa::path(
    get,
    path = "/api/stock-transfers",
    params(
        ("status" = Option<String>, Query, description = "Pending, Processed or Canceled"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("limit" = Option<i64>, Query, description = "Items per page, default 10")
    ),
    responses(
        (status = 200, description = "Stock transfer requests", body = ApiResponse<Vec<StockTransferRow>>)
    ),
    security(("bearer_auth" = [])),
    tag = "Inventory"
)]
pub async fn list_stock_transfers(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<StockTransferListQuery>,
) -> AppResult<Json<ApiResponse<Vec<StockTransferRow>>>> {
    Ok(Json(stock_transfer_service::list(&state, &user, query).await?))
}

#[utoipa::path(
    put,
    path = "/api/stock-transfers/status",
    request_body = UpdateStockTransferStatusRequest,
    responses(
        (status = 200, description = "Transfer status updated", body = ApiResponse<StockTransfer>),
        (status = 400, description = "Transfer is no longer pending or sender lacks stock")
    ),
    security(("bearer_auth" = [])),
    tag = "Inventory"
)]
pub async fn update_stock_transfer_status(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateStockTransferStatusRequest>,
) -> AppResult<Json<ApiResponse<StockTransfer>>> {
    Ok(Json(
        stock_transfer_service::update_status(&state, &user, payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/stock-histories",
    params(
        ("pharmacyId" = Option<i64>, Query, description = "Pharmacy filter"),
        ("keyword" = Option<String>, Query, description = "Product name contains"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("limit" = Option<i64>, Query, description = "Items per page, default 10")
    ),
    responses(
        (status = 200, description = "Stock ledger rows, newest first", body = ApiResponse<Vec<StockHistoryRow>>)
    ),
    security(("bearer_auth" = [])),
    tag = "Inventory"
)]
pub async fn list_stock_histories(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<StockHistoryQuery>,
) -> AppResult<Json<ApiResponse<Vec<StockHistoryRow>>>> {
    Ok(Json(stock_history_service::list(&state, &user, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/stock-histories/report",
    params(
        ("pharmacyId" = Option<i64>, Query, description = "Pharmacy filter"),
        ("keyword" = Option<String>, Query, description = "Product name contains"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("limit" = Option<i64>, Query, description = "Items per page, default 10")
    ),
    responses(
        (status = 200, description = "Monthly additions, deductions and closing stock", body = ApiResponse<Vec<MonthlyStockRow>>)
    ),
    security(("bearer_auth" = [])),
    tag = "Inventory"
)]
pub async fn stock_report(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<StockHistoryQuery>,
) -> AppResult<Json<ApiResponse<Vec<MonthlyStockRow>>>> {
    Ok(Json(
        stock_history_service::monthly_report(&state, &user, query).await?,
    ))
}
