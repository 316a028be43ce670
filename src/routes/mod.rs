use axum::Router;

use crate::state::AppState;

pub mod auth;
pub mod cart;
pub mod chat;
pub mod doc;
pub mod geo;
pub mod health;
pub mod inventory;
pub mod orders;
pub mod params;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/cart", cart::router())
        .nest("/orders", orders::route())
        .nest("/pharmacy-products", inventory::pharmacy_products_router())
        .nest("/stock-transfers", inventory::stock_transfers_router())
        .nest("/stock-histories", inventory::stock_histories_router())
        .nest("/pharmacies", geo::pharmacies_router())
        .nest("/products", geo::products_router())
        .nest("/shipping-fees", geo::shipping_router())
}
