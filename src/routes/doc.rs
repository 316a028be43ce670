use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    chat::ChatMessage,
    dto::{
        auth::{LoginRequest, RefreshRequest, RegisterRequest, TokenPair},
        cart::{
            AddToCartRequest, BulkDeleteCartRequest, CartLine, CartLineQuantity, CartList,
            CartQuantityRequest, PharmacyCart, PrescriptionCartResult, PrescriptionToCartRequest,
        },
        inventory::{
            AdjustStockRequest, CreatePharmacyProductRequest, CreateStockTransferRequest,
            NearestPharmacy, PharmacyDistanceList, UpdateStockTransferStatusRequest,
        },
        orders::{OrderList, OrderWithItems, PlaceOrderRequest, PlaceOrderResponse},
        shipping::{ShippingFeeList, ShippingFeeRequest, ShippingKind, ShippingOption},
    },
    models::{CartItem, Order, OrderItem, PharmacyProduct, StockHistory, StockTransfer, User},
    repository::{
        geo::{NearestProductRow, NearestSortBy, PharmacyDistanceRow},
        orders::{OrderItemRow, OrderRow},
        pharmacies::{NonOfficialShippingMethod, OfficialShippingMethod},
        stock_histories::{MonthlyStockRow, StockHistoryRow},
        stock_transfers::StockTransferRow,
    },
    response::{ApiResponse, Meta},
    routes::{auth, cart, geo, health, inventory, orders, params},
    status::{MutationStatus, OrderStatus, Role},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::refresh_token,
        cart::cart_list,
        cart::add_to_cart,
        cart::increase,
        cart::decrease,
        cart::remove_from_cart,
        cart::bulk_delete,
        cart::add_prescription,
        orders::list_order,
        orders::place_order,
        orders::get_order,
        orders::upload_payment_proof,
        orders::mark_processing,
        orders::mark_shipped,
        orders::mark_completed,
        orders::cancel_order,
        inventory::create_pharmacy_product,
        inventory::get_pharmacy_product,
        inventory::adjust_stock,
        inventory::nearest_products,
        inventory::create_stock_transfer,
        inventory::list_stock_transfers,
        inventory::update_stock_transfer_status,
        inventory::list_stock_histories,
        inventory::stock_report,
        geo::nearest_pharmacy,
        geo::pharmacies_for_product,
        geo::shipping_fees
    ),
    components(
        schemas(
            User,
            Role,
            OrderStatus,
            MutationStatus,
            CartItem,
            Order,
            OrderItem,
            PharmacyProduct,
            StockHistory,
            StockTransfer,
            ChatMessage,
            RegisterRequest,
            LoginRequest,
            RefreshRequest,
            TokenPair,
            AddToCartRequest,
            CartQuantityRequest,
            BulkDeleteCartRequest,
            PrescriptionToCartRequest,
            CartLine,
            PharmacyCart,
            CartList,
            CartLineQuantity,
            PrescriptionCartResult,
            OfficialShippingMethod,
            NonOfficialShippingMethod,
            PlaceOrderRequest,
            PlaceOrderResponse,
            OrderRow,
            OrderItemRow,
            OrderWithItems,
            OrderList,
            CreatePharmacyProductRequest,
            AdjustStockRequest,
            CreateStockTransferRequest,
            UpdateStockTransferStatusRequest,
            StockTransferRow,
            StockHistoryRow,
            MonthlyStockRow,
            NearestPharmacy,
            NearestProductRow,
            NearestSortBy,
            PharmacyDistanceRow,
            PharmacyDistanceList,
            ShippingFeeRequest,
            ShippingKind,
            ShippingOption,
            ShippingFeeList,
            params::Pagination,
            params::SortOrder,
            params::GeoQuery,
            params::PharmacyRank,
            params::OrderListQuery,
            params::StockTransferListQuery,
            params::StockHistoryQuery,
            Meta
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order placement and fulfilment"),
        (name = "Inventory", description = "Pharmacy stock, transfers and the stock ledger"),
        (name = "Geo", description = "Proximity lookups and shipping fees"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_core_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/cart",
            "/api/orders",
            "/api/orders/{id}/payment-proof",
            "/api/orders/{id}/canceled",
            "/api/stock-transfers/status",
            "/api/stock-histories/report",
            "/api/shipping-fees",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing");
        }
        assert!(
            doc.components
                .as_ref()
                .is_some_and(|c| c.security_schemes.contains_key("bearer_auth"))
        );
    }
}
