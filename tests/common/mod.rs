#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use pharmacy_marketplace_api::{
    carrier::{CostRequest, ShippingCarrier},
    chat::ChatHub,
    config::AppConfig,
    db::{DbPool, create_orm_conn, create_pool, run_migrations},
    dto::{cart::AddToCartRequest, orders::PlaceOrderRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    repository::pharmacy_products,
    services::cart_service,
    state::AppState,
    status::Role,
    storage::FileUploader,
};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, MutexGuard};

pub const COURIER_FEE: i64 = 15_000;
pub const BASE_FEE: i64 = 10_000;

/// Tests of one binary share a database; they take turns.
static DB_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub struct TestCtx {
    pub state: AppState,
    _guard: MutexGuard<'static, ()>,
}

pub struct StubUploader;

#[async_trait]
impl FileUploader for StubUploader {
    async fn upload(&self, folder: &str, file_name: &str, _bytes: Vec<u8>) -> AppResult<String> {
        Ok(format!("https://files.test/{folder}/{file_name}"))
    }

    async fn remove(&self, _url: &str) -> AppResult<()> {
        Ok(())
    }
}

pub struct StubCarrier;

#[async_trait]
impl ShippingCarrier for StubCarrier {
    async fn cost(&self, _request: &CostRequest, _service: &str) -> AppResult<Decimal> {
        Ok(Decimal::from(COURIER_FEE))
    }
}

/// `None` when no database is configured; the caller should return early.
pub async fn setup() -> anyhow::Result<Option<TestCtx>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests."
            );
            return Ok(None);
        }
    };

    let guard = DB_LOCK.get_or_init(|| Mutex::new(())).lock().await;
    let pool = create_pool(&database_url).await?;
    run_migrations(&pool).await?;

    // Clean tables between runs
    sqlx::query(
        "TRUNCATE TABLE audit_logs, prescription_items, consultations, stock_transfer_requests, \
         stock_histories, order_items, orders, cart_items, user_addresses, pharmacy_products, \
         pharmacy_official_shipping_methods, pharmacy_non_official_shipping_methods, \
         official_shipping_methods, non_official_shipping_methods, pharmacy_addresses, pharmacies, \
         product_categories, categories, products, pharmacy_managers, users RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await?;

    let config = AppConfig {
        database_url,
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-secret".into(),
        access_token_ttl_minutes: 60,
        refresh_token_ttl_hours: 24,
        default_radius_meters: 25_000.0,
        official_shipping_base_fee: Decimal::from(BASE_FEE),
        shipping_api_url: "http://localhost/cost".into(),
        shipping_api_key: None,
        upload_dir: std::env::temp_dir().to_string_lossy().into_owned(),
        public_base_url: "http://localhost".into(),
    };

    let state = AppState {
        orm: create_orm_conn(&pool),
        pool,
        config: Arc::new(config),
        uploader: Arc::new(StubUploader),
        carrier: Arc::new(StubCarrier),
        chat: ChatHub::spawn(),
    };
    Ok(Some(TestCtx {
        state,
        _guard: guard,
    }))
}

pub async fn create_user(pool: &DbPool, email: &str, role: Role) -> anyhow::Result<AuthUser> {
    let (user_id,): (i64,) = sqlx::query_as(
        "INSERT INTO users (email, password_hash, role) VALUES ($1, 'x', $2) RETURNING id",
    )
    .bind(email)
    .bind(role.as_str())
    .fetch_one(pool)
    .await?;
    Ok(AuthUser { user_id, role })
}

/// A pharmacy-manager account and its `pharmacy_managers.id`.
pub async fn create_manager(pool: &DbPool, email: &str) -> anyhow::Result<(AuthUser, i64)> {
    let user = create_user(pool, email, Role::PharmacyManager).await?;
    let (manager_id,): (i64,) = sqlx::query_as(
        "INSERT INTO pharmacy_managers (user_id, name) VALUES ($1, $2) RETURNING id",
    )
    .bind(user.user_id)
    .bind(email)
    .fetch_one(pool)
    .await?;
    Ok((user, manager_id))
}

pub async fn create_pharmacy(
    pool: &DbPool,
    manager_id: i64,
    name: &str,
    longitude: f64,
    latitude: f64,
) -> anyhow::Result<i64> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO pharmacies (pharmacy_manager_id, name) VALUES ($1, $2) RETURNING id",
    )
    .bind(manager_id)
    .bind(name)
    .fetch_one(pool)
    .await?;
    sqlx::query(
        "INSERT INTO pharmacy_addresses (pharmacy_id, city, city_id, province, district, \
         sub_district, postal_code, coordinate) \
         VALUES ($1, 'Jakarta', 152, 'DKI Jakarta', '-', '-', '00000', \
         ST_SetSRID(ST_MakePoint($2, $3), 4326)::geography)",
    )
    .bind(id)
    .bind(longitude)
    .bind(latitude)
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn create_product(pool: &DbPool, name: &str) -> anyhow::Result<i64> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO products (name, slug, weight) VALUES ($1, $2, 100) RETURNING id",
    )
    .bind(name)
    .bind(name.to_lowercase().replace(' ', "-"))
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Pharmacy product with opening stock recorded in the ledger.
pub async fn stock_product(
    pool: &DbPool,
    pharmacy_id: i64,
    product_id: i64,
    price: i64,
    stock: i32,
) -> anyhow::Result<i64> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO pharmacy_products (pharmacy_id, product_id, price, total_stock, is_available) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(pharmacy_id)
    .bind(product_id)
    .bind(Decimal::from(price))
    .bind(stock)
    .bind(stock > 0)
    .fetch_one(pool)
    .await?;
    if stock > 0 {
        sqlx::query(
            "INSERT INTO stock_histories (pharmacy_product_id, pharmacy_id, quantity, description) \
             VALUES ($1, $2, $3, 'initial stock')",
        )
        .bind(id)
        .bind(pharmacy_id)
        .bind(stock)
        .execute(pool)
        .await?;
    }
    Ok(id)
}

pub async fn create_address(
    pool: &DbPool,
    user_id: i64,
    longitude: f64,
    latitude: f64,
) -> anyhow::Result<i64> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO user_addresses (user_id, city, city_id, province, district, sub_district, \
         postal_code, coordinate) \
         VALUES ($1, 'Jakarta', 153, 'DKI Jakarta', '-', '-', '00000', \
         ST_SetSRID(ST_MakePoint($2, $3), 4326)::geography) RETURNING id",
    )
    .bind(user_id)
    .bind(longitude)
    .bind(latitude)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn total_stock(state: &AppState, pharmacy_product_id: i64) -> anyhow::Result<i32> {
    Ok(pharmacy_products::get(&state.orm, pharmacy_product_id)
        .await?
        .total_stock)
}

/// Signed ledger quantities of a pharmacy product, oldest first.
pub async fn ledger(pool: &DbPool, pharmacy_product_id: i64) -> anyhow::Result<Vec<i32>> {
    let rows: Vec<(i32,)> = sqlx::query_as(
        "SELECT quantity FROM stock_histories WHERE pharmacy_product_id = $1 ORDER BY id",
    )
    .bind(pharmacy_product_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|r| r.0).collect())
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    pharmacy_product_id: i64,
    quantity: i32,
) -> anyhow::Result<i64> {
    let resp = cart_service::create(
        state,
        user,
        AddToCartRequest {
            pharmacy_product_id,
            quantity,
        },
    )
    .await?;
    Ok(resp.data.expect("cart item").id)
}

pub fn order_request(
    cart_item_ids: Vec<i64>,
    items_total: i64,
    shipping_fee: i64,
    user_address_id: i64,
) -> PlaceOrderRequest {
    PlaceOrderRequest {
        cart_item_ids,
        total_price: Decimal::from(items_total + shipping_fee),
        shipping_fee: Decimal::from(shipping_fee),
        shipping_method: "Instant".into(),
        user_address_id,
    }
}
