use pharmacy_marketplace_api::{
    config::AppConfig,
    db::{create_pool, run_migrations},
    repository::stock_histories::DESC_INITIAL_STOCK,
    services::auth_service::hash_password,
    status::Role,
};
use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};

struct SeedPharmacy {
    name: &'static str,
    city: &'static str,
    city_id: i64,
    longitude: f64,
    latitude: f64,
}

const PHARMACIES: [SeedPharmacy; 2] = [
    SeedPharmacy {
        name: "Apotek Sehat Menteng",
        city: "Jakarta Pusat",
        city_id: 152,
        longitude: 106.8321,
        latitude: -6.1964,
    },
    SeedPharmacy {
        name: "Apotek Sehat Kemang",
        city: "Jakarta Selatan",
        city_id: 153,
        longitude: 106.8136,
        latitude: -6.2607,
    },
];

/// Name, slug, price, opening stock at each pharmacy.
const PRODUCTS: [(&str, &str, i64, [i32; 2]); 3] = [
    ("Paracetamol 500 mg", "paracetamol-500-mg", 12_000, [40, 15]),
    ("Amoxicillin 500 mg", "amoxicillin-500-mg", 35_000, [10, 0]),
    ("Vitamin C 1000 mg", "vitamin-c-1000-mg", 25_000, [25, 30]),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&pool).await?;

    let mut tx = pool.begin().await?;
    let admin_id = ensure_user(&mut tx, "admin@example.com", "admin12345", Role::Admin).await?;
    let user_id = ensure_user(&mut tx, "user@example.com", "user12345", Role::User).await?;
    ensure_user(&mut tx, "doctor@example.com", "doctor12345", Role::Doctor).await?;
    let manager_user_id =
        ensure_user(&mut tx, "manager@example.com", "manager12345", Role::PharmacyManager).await?;

    let seeded: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pharmacies")
        .fetch_one(&mut *tx)
        .await?;
    if seeded.0 > 0 {
        tx.commit().await?;
        println!("Catalog already seeded. Admin ID: {admin_id}, User ID: {user_id}");
        return Ok(());
    }

    let (manager_id,): (i64,) = sqlx::query_as(
        "INSERT INTO pharmacy_managers (user_id, name) VALUES ($1, 'Demo Manager') RETURNING id",
    )
    .bind(manager_user_id)
    .fetch_one(&mut *tx)
    .await?;

    let (official_id,): (i64,) = sqlx::query_as(
        "INSERT INTO official_shipping_methods (name, price) VALUES ('Instant', NULL) RETURNING id",
    )
    .fetch_one(&mut *tx)
    .await?;
    let (courier_id,): (i64,) = sqlx::query_as(
        "INSERT INTO non_official_shipping_methods (name, courier, service) \
         VALUES ('JNE Regular', 'jne', 'REG') RETURNING id",
    )
    .fetch_one(&mut *tx)
    .await?;

    let mut pharmacy_ids = Vec::with_capacity(PHARMACIES.len());
    for pharmacy in &PHARMACIES {
        let id = seed_pharmacy(&mut tx, manager_id, pharmacy, official_id, courier_id).await?;
        pharmacy_ids.push(id);
    }

    for (name, slug, price, stocks) in PRODUCTS {
        let (product_id,): (i64,) = sqlx::query_as(
            "INSERT INTO products (name, slug, weight) VALUES ($1, $2, 100) RETURNING id",
        )
        .bind(name)
        .bind(slug)
        .fetch_one(&mut *tx)
        .await?;

        for (pharmacy_id, stock) in pharmacy_ids.iter().zip(stocks) {
            let (pp_id,): (i64,) = sqlx::query_as(
                "INSERT INTO pharmacy_products (pharmacy_id, product_id, price, total_stock, is_available) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING id",
            )
            .bind(pharmacy_id)
            .bind(product_id)
            .bind(Decimal::from(price))
            .bind(stock)
            .bind(stock > 0)
            .fetch_one(&mut *tx)
            .await?;
            if stock > 0 {
                sqlx::query(
                    "INSERT INTO stock_histories (pharmacy_product_id, pharmacy_id, quantity, description) \
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(pp_id)
                .bind(pharmacy_id)
                .bind(stock)
                .bind(DESC_INITIAL_STOCK)
                .execute(&mut *tx)
                .await?;
            }
        }
    }

    sqlx::query(
        "INSERT INTO user_addresses (user_id, name, address, city, city_id, province, district, \
         sub_district, postal_code, coordinate, is_main) \
         VALUES ($1, 'Home', 'Jl. Sudirman 1', 'Jakarta Pusat', 152, 'DKI Jakarta', 'Tanah Abang', \
         'Karet Tengsin', '10220', ST_SetSRID(ST_MakePoint($2, $3), 4326)::geography, TRUE)",
    )
    .bind(user_id)
    .bind(106.8229_f64)
    .bind(-6.2088_f64)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    tx: &mut Transaction<'_, Postgres>,
    email: &str,
    password: &str,
    role: Role,
) -> anyhow::Result<i64> {
    let password_hash = hash_password(password)?;
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO users (email, password_hash, role)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) WHERE deleted_at IS NULL DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(email)
    .bind(password_hash)
    .bind(role.as_str())
    .fetch_one(&mut **tx)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(id)
}

async fn seed_pharmacy(
    tx: &mut Transaction<'_, Postgres>,
    manager_id: i64,
    pharmacy: &SeedPharmacy,
    official_id: i64,
    courier_id: i64,
) -> anyhow::Result<i64> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO pharmacies (pharmacy_manager_id, name, pharmacist_name, operational_hours) \
         VALUES ($1, $2, 'apt. Demo', '08:00-21:00') RETURNING id",
    )
    .bind(manager_id)
    .bind(pharmacy.name)
    .fetch_one(&mut **tx)
    .await?;

    sqlx::query(
        "INSERT INTO pharmacy_addresses (pharmacy_id, city, city_id, province, district, \
         sub_district, postal_code, coordinate) \
         VALUES ($1, $2, $3, 'DKI Jakarta', '-', '-', '00000', \
         ST_SetSRID(ST_MakePoint($4, $5), 4326)::geography)",
    )
    .bind(id)
    .bind(pharmacy.city)
    .bind(pharmacy.city_id)
    .bind(pharmacy.longitude)
    .bind(pharmacy.latitude)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        "INSERT INTO pharmacy_official_shipping_methods (pharmacy_id, official_shipping_method_id) \
         VALUES ($1, $2)",
    )
    .bind(id)
    .bind(official_id)
    .execute(&mut **tx)
    .await?;
    sqlx::query(
        "INSERT INTO pharmacy_non_official_shipping_methods \
         (pharmacy_id, non_official_shipping_method_id) VALUES ($1, $2)",
    )
    .bind(id)
    .bind(courier_id)
    .execute(&mut **tx)
    .await?;

    Ok(id)
}
