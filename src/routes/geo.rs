use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};

use crate::{
    dto::{
        inventory::{NearestPharmacy, PharmacyDistanceList},
        shipping::{ShippingFeeList, ShippingFeeRequest},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::{GeoQuery, NearestPharmacyQuery},
    services::{geo_service, shipping_service},
    state::AppState,
};

pub fn pharmacies_router() -> Router<AppState> {
    Router::new().route("/nearest", get(nearest_pharmacy))
}

pub fn products_router() -> Router<AppState> {
    Router::new().route("/{id}/pharmacies", get(pharmacies_for_product))
}

pub fn shipping_router() -> Router<AppState> {
    Router::new().route("/", post(shipping_fees))
}

#[utoipa::path(
    get,
    path = "/api/pharmacies/nearest",
    params(
        ("longitude" = f64, Query, description = "Buyer longitude"),
        ("latitude" = f64, Query, description = "Buyer latitude"),
        ("radius" = Option<f64>, Query, description = "Search radius in meters"),
        ("rank" = Option<String>, Query, description = "stock (default) or sales")
    ),
    responses(
        (status = 200, description = "Nearest pharmacy id, null when none is in range", body = ApiResponse<NearestPharmacy>),
        (status = 400, description = "Invalid coordinates")
    ),
    tag = "Geo"
)]
pub async fn nearest_pharmacy(
    State(state): State<AppState>,
    Query(query): Query<NearestPharmacyQuery>,
) -> AppResult<Json<ApiResponse<NearestPharmacy>>> {
    Ok(Json(geo_service::nearest_pharmacy(&state, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}/pharmacies",
    params(
        ("id" = i64, Path, description = "Catalog product id"),
        ("longitude" = f64, Query, description = "Buyer longitude"),
        ("latitude" = f64, Query, description = "Buyer latitude"),
        ("radius" = Option<f64>, Query, description = "Search radius in meters")
    ),
    responses(
        (status = 200, description = "Pharmacies stocking the product, nearest first", body = ApiResponse<PharmacyDistanceList>)
    ),
    tag = "Geo"
)]
pub async fn pharmacies_for_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<GeoQuery>,
) -> AppResult<Json<ApiResponse<PharmacyDistanceList>>> {
    Ok(Json(geo_service::pharmacies_for_product(&state, id, query).await?))
}

#[utoipa::path(
    post,
    path = "/api/shipping-fees",
    request_body = ShippingFeeRequest,
    responses(
        (status = 200, description = "One fee per shipping method of the pharmacy", body = ApiResponse<ShippingFeeList>),
        (status = 404, description = "Address or pharmacy not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Geo"
)]
pub async fn shipping_fees(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ShippingFeeRequest>,
) -> AppResult<Json<ApiResponse<ShippingFeeList>>> {
    Ok(Json(shipping_service::fees(&state, &user, payload).await?))
}
