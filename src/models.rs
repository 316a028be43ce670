use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entity::{
        cart_items::Model as CartItemModel, order_items::Model as OrderItemModel,
        orders::Model as OrderModel, pharmacy_products::Model as PharmacyProductModel,
        stock_histories::Model as StockHistoryModel,
        stock_transfer_requests::Model as StockTransferModel,
    },
    status::{MutationStatus, OrderStatus, Role},
};

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PharmacyProduct {
    pub id: i64,
    pub pharmacy_id: i64,
    pub product_id: i64,
    pub price: Decimal,
    pub total_stock: i32,
    pub is_available: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<PharmacyProductModel> for PharmacyProduct {
    fn from(model: PharmacyProductModel) -> Self {
        Self {
            id: model.id,
            pharmacy_id: model.pharmacy_id,
            product_id: model.product_id,
            price: model.price,
            total_stock: model.total_stock,
            is_available: model.is_available,
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: i64,
    pub user_id: i64,
    pub pharmacy_product_id: i64,
    pub quantity: i32,
    pub updated_at: DateTime<Utc>,
}

impl From<CartItemModel> for CartItem {
    fn from(model: CartItemModel) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            pharmacy_product_id: model.pharmacy_product_id,
            quantity: model.quantity,
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub order_number: Uuid,
    pub total_price: Decimal,
    pub payment_proof: Option<String>,
    pub payment_deadline: DateTime<Utc>,
    pub shipping_fee: Decimal,
    pub shipping_method: String,
    pub user_address_id: i64,
    pub pharmacy_id: i64,
    pub order_status: Option<OrderStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderModel> for Order {
    fn from(model: OrderModel) -> Self {
        Self {
            id: model.id,
            order_number: model.order_number,
            total_price: model.total_price,
            payment_proof: model.payment_proof,
            payment_deadline: model.payment_deadline.with_timezone(&Utc),
            shipping_fee: model.shipping_fee,
            shipping_method: model.shipping_method,
            user_address_id: model.user_address_id,
            pharmacy_id: model.pharmacy_id,
            order_status: OrderStatus::from_id(model.order_status_id),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub pharmacy_product_id: i64,
    pub quantity: i32,
    pub price: Decimal,
}

impl From<OrderItemModel> for OrderItem {
    fn from(model: OrderItemModel) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            pharmacy_product_id: model.pharmacy_product_id,
            quantity: model.quantity,
            price: model.price,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockHistory {
    pub id: i64,
    pub pharmacy_product_id: i64,
    pub pharmacy_id: i64,
    pub quantity: i32,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<StockHistoryModel> for StockHistory {
    fn from(model: StockHistoryModel) -> Self {
        Self {
            id: model.id,
            pharmacy_product_id: model.pharmacy_product_id,
            pharmacy_id: model.pharmacy_id,
            quantity: model.quantity,
            description: model.description,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockTransfer {
    pub id: i64,
    pub pharmacy_sender_id: i64,
    pub pharmacy_receiver_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub mutation_status: Option<MutationStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StockTransferModel> for StockTransfer {
    fn from(model: StockTransferModel) -> Self {
        Self {
            id: model.id,
            pharmacy_sender_id: model.pharmacy_sender_id,
            pharmacy_receiver_id: model.pharmacy_receiver_id,
            product_id: model.product_id,
            quantity: model.quantity,
            mutation_status: MutationStatus::from_id(model.mutation_status_id),
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        }
    }
}
