pub mod cart_items;
pub mod order_items;
pub mod orders;
pub mod pharmacies;
pub mod pharmacy_products;
pub mod products;
pub mod stock_histories;
pub mod stock_transfer_requests;
pub mod users;

pub use cart_items::Entity as CartItems;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use pharmacies::Entity as Pharmacies;
pub use pharmacy_products::Entity as PharmacyProducts;
pub use products::Entity as Products;
pub use stock_histories::Entity as StockHistories;
pub use stock_transfer_requests::Entity as StockTransferRequests;
pub use users::Entity as Users;
