use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};

use crate::{
    dto::cart::{
        AddToCartRequest, BulkDeleteCartRequest, CartLineQuantity, CartList, CartQuantityRequest,
        PrescriptionCartResult, PrescriptionToCartRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::CartItem,
    response::ApiResponse,
    services::cart_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(cart_list).post(add_to_cart).delete(bulk_delete))
        .route("/{id}", delete(remove_from_cart))
        .route("/{id}/increase", post(increase))
        .route("/{id}/decrease", post(decrease))
        .route("/prescriptions/{consultation_id}", post(add_prescription))
}

#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Cart lines grouped by pharmacy", body = ApiResponse<CartList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn cart_list(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<CartList>>> {
    Ok(Json(cart_service::list(&state, &user).await?))
}

#[utoipa::path(
    post,
    path = "/api/cart",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Line created or incremented", body = ApiResponse<CartItem>),
        (status = 400, description = "Invalid quantity or not enough stock")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToCartRequest>,
) -> AppResult<Json<ApiResponse<CartItem>>> {
    Ok(Json(cart_service::create(&state, &user, payload).await?))
}

#[utoipa::path(
    post,
    path = "/api/cart/{id}/increase",
    params(("id" = i64, Path, description = "Cart item id")),
    request_body(content = CartQuantityRequest, description = "Step, default 1"),
    responses(
        (status = 200, description = "Quantity increased", body = ApiResponse<CartItem>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn increase(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    payload: Option<Json<CartQuantityRequest>>,
) -> AppResult<Json<ApiResponse<CartItem>>> {
    let quantity = payload.and_then(|Json(p)| p.quantity);
    Ok(Json(cart_service::increase(&state, &user, id, quantity).await?))
}

#[utoipa::path(
    post,
    path = "/api/cart/{id}/decrease",
    params(("id" = i64, Path, description = "Cart item id")),
    request_body(content = CartQuantityRequest, description = "Step, default 1"),
    responses(
        (status = 200, description = "Quantity decreased; removed at zero", body = ApiResponse<CartLineQuantity>)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn decrease(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    payload: Option<Json<CartQuantityRequest>>,
) -> AppResult<Json<ApiResponse<CartLineQuantity>>> {
    let quantity = payload.and_then(|Json(p)| p.quantity);
    Ok(Json(cart_service::decrease(&state, &user, id, quantity).await?))
}

#[utoipa::path(
    delete,
    path = "/api/cart/{id}",
    params(("id" = i64, Path, description = "Cart item id")),
    responses(
        (status = 200, description = "Removed from cart"),
        (status = 404, description = "Cart item not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_from_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(cart_service::delete(&state, &user, id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/cart",
    request_body = BulkDeleteCartRequest,
    responses(
        (status = 200, description = "Removed from cart"),
        (status = 404, description = "No matching cart items")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn bulk_delete(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<BulkDeleteCartRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(cart_service::bulk_delete(&state, &user, payload).await?))
}

#[utoipa::path(
    post,
    path = "/api/cart/prescriptions/{consultation_id}",
    params(("consultation_id" = i64, Path, description = "Consultation id")),
    request_body = PrescriptionToCartRequest,
    responses(
        (status = 200, description = "Prescribed products added", body = ApiResponse<PrescriptionCartResult>),
        (status = 400, description = "A prescribed product is not available nearby")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_prescription(
    State(state): State<AppState>,
    user: AuthUser,
    Path(consultation_id): Path<i64>,
    Json(payload): Json<PrescriptionToCartRequest>,
) -> AppResult<Json<ApiResponse<PrescriptionCartResult>>> {
    let resp =
        cart_service::add_prescription_to_cart(&state, &user, consultation_id, payload).await?;
    Ok(Json(resp))
}
