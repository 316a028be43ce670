use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{status::MutationStatus, repository::geo::PharmacyDistanceRow};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePharmacyProductRequest {
    pub pharmacy_id: i64,
    pub product_id: i64,
    pub price: Decimal,
    pub total_stock: i32,
    pub is_available: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdjustStockRequest {
    /// Signed change applied to the current stock.
    pub delta: i32,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateStockTransferRequest {
    pub pharmacy_sender_id: i64,
    pub pharmacy_receiver_id: i64,
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStockTransferStatusRequest {
    pub id: i64,
    pub mutation_status: MutationStatus,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NearestPharmacy {
    pub pharmacy_id: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PharmacyDistanceList {
    pub items: Vec<PharmacyDistanceRow>,
}
