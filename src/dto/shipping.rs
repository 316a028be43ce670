use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShippingFeeRequest {
    pub pharmacy_id: i64,
    pub user_address_id: i64,
    /// Grams.
    pub weight: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ShippingKind {
    Official,
    NonOfficial,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShippingOption {
    pub kind: ShippingKind,
    pub shipping_method_id: i64,
    pub name: String,
    pub fee: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShippingFeeList {
    pub distance_km: f64,
    pub options: Vec<ShippingOption>,
}
