pub mod auth_service;
pub mod cart_service;
pub mod geo_service;
pub mod order_service;
pub mod pharmacy_product_service;
pub mod shipping_service;
pub mod stock_history_service;
pub mod stock_transfer_service;
