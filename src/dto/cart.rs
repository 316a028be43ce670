use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::repository::pharmacies::{NonOfficialShippingMethod, OfficialShippingMethod};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub pharmacy_product_id: i64,
    pub quantity: i32,
}

/// Body of increase/decrease; the step defaults to one.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CartQuantityRequest {
    pub quantity: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkDeleteCartRequest {
    pub cart_item_ids: Vec<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PrescriptionToCartRequest {
    pub longitude: f64,
    pub latitude: f64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: i64,
    pub pharmacy_product_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub picture_url: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
    pub total_stock: i32,
    pub weight: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PharmacyCart {
    pub pharmacy_id: i64,
    pub pharmacy_name: String,
    pub official_shipping_methods: Vec<OfficialShippingMethod>,
    pub non_official_shipping_methods: Vec<NonOfficialShippingMethod>,
    pub items: Vec<CartLine>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartList {
    pub pharmacies: Vec<PharmacyCart>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionCartResult {
    pub cart_item_ids: Vec<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartLineQuantity {
    pub id: i64,
    pub quantity: i32,
    pub removed: bool,
}
