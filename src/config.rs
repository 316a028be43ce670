use std::env;

use rust_decimal::Decimal;

pub const DEFAULT_SHIPPING_API_URL: &str = "https://api.rajaongkir.com/starter/cost";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_hours: i64,
    pub default_radius_meters: f64,
    pub official_shipping_base_fee: Decimal,
    pub shipping_api_url: String,
    pub shipping_api_key: Option<String>,
    pub upload_dir: String,
    pub public_base_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or("APP_PORT", 3000);
        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{host}:{port}"));

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            access_token_ttl_minutes: parse_or("ACCESS_TOKEN_TTL_MINUTES", 60),
            refresh_token_ttl_hours: parse_or("REFRESH_TOKEN_TTL_HOURS", 720),
            default_radius_meters: parse_or("DEFAULT_RADIUS_METERS", 25_000.0),
            official_shipping_base_fee: parse_or(
                "OFFICIAL_SHIPPING_BASE_FEE",
                Decimal::from(10_000),
            ),
            shipping_api_url: env::var("SHIPPING_API_URL")
                .unwrap_or_else(|_| DEFAULT_SHIPPING_API_URL.to_string()),
            shipping_api_key: env::var("SHIPPING_API_KEY").ok().filter(|k| !k.is_empty()),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            public_base_url,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
