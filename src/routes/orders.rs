use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    routing::{get, post},
};

use crate::{
    dto::orders::{OrderList, OrderWithItems, PlaceOrderRequest, PlaceOrderResponse},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Order,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::order_service,
    state::AppState,
    status::OrderStatus,
};

pub const PAYMENT_PROOF_FIELD: &str = "payment_proof";

pub fn route() -> Router<AppState> {
    Router::new()
        .route("/", get(list_order).post(place_order))
        .route("/{id}", get(get_order))
        .route("/{id}/payment-proof", post(upload_payment_proof))
        .route("/{id}/processing", post(mark_processing))
        .route("/{id}/shipped", post(mark_shipped))
        .route("/{id}/completed", post(mark_completed))
        .route("/{id}/canceled", post(cancel_order))
}

#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("status" = Option<String>, Query, description = "Order status name, default Pending"),
        ("pharmacyId" = Option<i64>, Query, description = "Only orders of this pharmacy"),
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("limit" = Option<i64>, Query, description = "Items per page, default 10")
    ),
    responses(
        (status = 200, description = "Orders visible to the caller", body = ApiResponse<OrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_order(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    Ok(Json(order_service::list(&state, &user, query).await?))
}

#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = PlaceOrderRequest,
    responses(
        (status = 200, description = "Order placed", body = ApiResponse<PlaceOrderResponse>),
        (status = 400, description = "Invalid payload or not enough stock")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn place_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<PlaceOrderRequest>,
) -> AppResult<Json<ApiResponse<PlaceOrderResponse>>> {
    Ok(Json(order_service::place_order(&state, &user, payload).await?))
}

#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with its items", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    Ok(Json(order_service::get(&state, &user, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/payment-proof",
    params(("id" = i64, Path, description = "Order id")),
    request_body(content_type = "multipart/form-data", description = "payment_proof: png, jpg or jpeg up to 500 KB"),
    responses(
        (status = 200, description = "Payment proof stored", body = ApiResponse<Order>),
        (status = 400, description = "Invalid file or order is not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn upload_payment_proof(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<Order>>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some(PAYMENT_PROOF_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("invalid file: {e}")))?;
        let resp =
            order_service::upload_payment_proof(&state, &user, id, &file_name, bytes.to_vec())
                .await?;
        return Ok(Json(resp));
    }
    Err(AppError::BadRequest(format!(
        "{PAYMENT_PROOF_FIELD} is required"
    )))
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/processing",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order is processing", body = ApiResponse<Order>),
        (status = 404, description = "Order not found or not in the required state")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn mark_processing(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Order>>> {
    transition(&state, &user, id, OrderStatus::Processing).await
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/shipped",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order shipped", body = ApiResponse<Order>),
        (status = 404, description = "Order not found or not in the required state")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn mark_shipped(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Order>>> {
    transition(&state, &user, id, OrderStatus::Shipped).await
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/completed",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order completed", body = ApiResponse<Order>),
        (status = 404, description = "Order not found or not in the required state")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn mark_completed(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Order>>> {
    transition(&state, &user, id, OrderStatus::Completed).await
}

#[utoipa::path(
    post,
    path = "/api/orders/{id}/canceled",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order canceled and stock restored", body = ApiResponse<Order>),
        (status = 400, description = "Order already has a payment proof"),
        (status = 404, description = "Order not found or not in the required state")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Order>>> {
    transition(&state, &user, id, OrderStatus::Canceled).await
}

async fn transition(
    state: &AppState,
    user: &AuthUser,
    id: i64,
    target: OrderStatus,
) -> AppResult<Json<ApiResponse<Order>>> {
    Ok(Json(order_service::transition(state, user, id, target).await?))
}
