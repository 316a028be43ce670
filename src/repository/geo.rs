//! PostGIS-backed proximity queries. Radii are meters; reported distances are
//! kilometers rounded to two decimals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Postgres, QueryBuilder};
use utoipa::ToSchema;

use super::BUYER_POINT;
use crate::{db::DbPool, error::AppResult, routes::params::SortOrder, status::OrderStatus};

/// Within `radius` of the buyer, the pharmacy holding the most stock across
/// all its products; nearer wins a tie.
pub async fn nearest_pharmacy(
    pool: &DbPool,
    longitude: f64,
    latitude: f64,
    radius: f64,
) -> AppResult<Option<i64>> {
    let sql = format!(
        r#"
        SELECT p.id
        FROM pharmacies p
        JOIN pharmacy_addresses pa ON pa.pharmacy_id = p.id AND pa.deleted_at IS NULL
        LEFT JOIN pharmacy_products pp ON pp.pharmacy_id = p.id AND pp.deleted_at IS NULL
        WHERE p.deleted_at IS NULL
          AND ST_DWithin(pa.coordinate, {BUYER_POINT}, $3)
        GROUP BY p.id, pa.id
        ORDER BY COALESCE(SUM(pp.total_stock), 0) DESC,
                 ST_Distance(pa.coordinate, {BUYER_POINT}) ASC,
                 p.id ASC
        LIMIT 1
        "#
    );
    let row: Option<(i64,)> = sqlx::query_as(&sql)
        .bind(longitude)
        .bind(latitude)
        .bind(radius)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.0))
}

/// As [`nearest_pharmacy`], ranked by units sold on orders that were not canceled.
pub async fn nearest_pharmacy_most_bought(
    pool: &DbPool,
    longitude: f64,
    latitude: f64,
    radius: f64,
) -> AppResult<Option<i64>> {
    let sql = format!(
        r#"
        SELECT p.id
        FROM pharmacies p
        JOIN pharmacy_addresses pa ON pa.pharmacy_id = p.id AND pa.deleted_at IS NULL
        LEFT JOIN (
            SELECT o.pharmacy_id, SUM(oi.quantity) AS sold
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            WHERE o.deleted_at IS NULL AND oi.deleted_at IS NULL AND o.order_status_id <> $4
            GROUP BY o.pharmacy_id
        ) s ON s.pharmacy_id = p.id
        WHERE p.deleted_at IS NULL
          AND ST_DWithin(pa.coordinate, {BUYER_POINT}, $3)
        ORDER BY COALESCE(s.sold, 0) DESC,
                 ST_Distance(pa.coordinate, {BUYER_POINT}) ASC,
                 p.id ASC
        LIMIT 1
        "#
    );
    let row: Option<(i64,)> = sqlx::query_as(&sql)
        .bind(longitude)
        .bind(latitude)
        .bind(radius)
        .bind(OrderStatus::Canceled.id())
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.0))
}

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PharmacyDistanceRow {
    pub pharmacy_id: i64,
    pub pharmacy_name: String,
    pub pharmacy_product_id: i64,
    pub price: Decimal,
    pub total_stock: i32,
    pub distance_km: Decimal,
}

pub async fn pharmacies_selling_product(
    pool: &DbPool,
    longitude: f64,
    latitude: f64,
    radius: f64,
    product_id: i64,
) -> AppResult<Vec<PharmacyDistanceRow>> {
    let sql = format!(
        r#"
        SELECT p.id AS pharmacy_id, p.name AS pharmacy_name, pp.id AS pharmacy_product_id,
               pp.price, pp.total_stock,
               ROUND((ST_Distance(pa.coordinate, {BUYER_POINT}) / 1000)::numeric, 2) AS distance_km
        FROM pharmacy_products pp
        JOIN pharmacies p ON p.id = pp.pharmacy_id AND p.deleted_at IS NULL
        JOIN pharmacy_addresses pa ON pa.pharmacy_id = p.id AND pa.deleted_at IS NULL
        WHERE pp.product_id = $4 AND pp.deleted_at IS NULL
          AND pp.is_available AND pp.total_stock > 0
          AND ST_DWithin(pa.coordinate, {BUYER_POINT}, $3)
        ORDER BY distance_km ASC, p.id ASC
        "#
    );
    let rows = sqlx::query_as::<_, PharmacyDistanceRow>(&sql)
        .bind(longitude)
        .bind(latitude)
        .bind(radius)
        .bind(product_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// The in-stock pharmacy product of `product_id` closest to the buyer; on a
/// distance tie the pharmacy with the larger total stock wins.
pub async fn nearest_pharmacy_product_for(
    pool: &DbPool,
    longitude: f64,
    latitude: f64,
    radius: f64,
    product_id: i64,
) -> AppResult<Option<i64>> {
    let sql = format!(
        r#"
        SELECT pp.id
        FROM pharmacy_products pp
        JOIN pharmacies p ON p.id = pp.pharmacy_id AND p.deleted_at IS NULL
        JOIN pharmacy_addresses pa ON pa.pharmacy_id = p.id AND pa.deleted_at IS NULL
        WHERE pp.product_id = $4 AND pp.deleted_at IS NULL
          AND pp.is_available AND pp.total_stock > 0
          AND ST_DWithin(pa.coordinate, {BUYER_POINT}, $3)
        ORDER BY ST_Distance(pa.coordinate, {BUYER_POINT}) ASC,
                 (SELECT COALESCE(SUM(s.total_stock), 0)
                  FROM pharmacy_products s
                  WHERE s.pharmacy_id = p.id AND s.deleted_at IS NULL) DESC,
                 pp.id ASC
        LIMIT 1
        "#
    );
    let row: Option<(i64,)> = sqlx::query_as(&sql)
        .bind(longitude)
        .bind(latitude)
        .bind(radius)
        .bind(product_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.0))
}

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NearestSortBy {
    Name,
    Price,
    #[default]
    Distance,
}

impl NearestSortBy {
    fn as_sql(&self) -> &'static str {
        match self {
            NearestSortBy::Name => "pr.name",
            NearestSortBy::Price => "pp.price",
            NearestSortBy::Distance => "distance_km",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NearestFilter {
    pub longitude: f64,
    pub latitude: f64,
    pub radius: f64,
    pub category_id: Option<i64>,
    pub keyword: Option<String>,
    pub sort_by: NearestSortBy,
    pub sort: SortOrder,
}

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NearestProductRow {
    pub pharmacy_product_id: i64,
    pub pharmacy_id: i64,
    pub pharmacy_name: String,
    pub product_id: i64,
    pub product_name: String,
    pub picture_url: Option<String>,
    pub price: Decimal,
    pub total_stock: i32,
    pub distance_km: Decimal,
}

fn push_nearest_query(qb: &mut QueryBuilder<'_, Postgres>, filter: &NearestFilter, select: &str) {
    qb.push("WITH buyer AS (SELECT ST_SetSRID(ST_MakePoint(")
        .push_bind(filter.longitude)
        .push(", ")
        .push_bind(filter.latitude)
        .push("), 4326)::geography AS point) SELECT ")
        .push(select)
        .push(
            " FROM pharmacy_products pp \
              JOIN pharmacies p ON p.id = pp.pharmacy_id AND p.deleted_at IS NULL \
              JOIN pharmacy_addresses pa ON pa.pharmacy_id = p.id AND pa.deleted_at IS NULL \
              JOIN products pr ON pr.id = pp.product_id AND pr.deleted_at IS NULL \
              CROSS JOIN buyer b \
              WHERE pp.deleted_at IS NULL AND pp.is_available \
              AND ST_DWithin(pa.coordinate, b.point, ",
        )
        .push_bind(filter.radius)
        .push(")");
    if let Some(category_id) = filter.category_id {
        qb.push(
            " AND EXISTS (SELECT 1 FROM product_categories pc \
              WHERE pc.product_id = pr.id AND pc.deleted_at IS NULL AND pc.category_id = ",
        )
        .push_bind(category_id)
        .push(")");
    }
    if let Some(keyword) = filter.keyword.as_ref().filter(|k| !k.is_empty()) {
        qb.push(" AND pr.name ILIKE ").push_bind(format!("%{keyword}%"));
    }
}

pub async fn list_nearest(
    pool: &DbPool,
    filter: &NearestFilter,
    limit: i64,
    offset: i64,
) -> AppResult<(Vec<NearestProductRow>, i64)> {
    let mut qb = QueryBuilder::<Postgres>::new("");
    push_nearest_query(
        &mut qb,
        filter,
        "pp.id AS pharmacy_product_id, p.id AS pharmacy_id, p.name AS pharmacy_name, \
         pr.id AS product_id, pr.name AS product_name, pr.picture_url, pp.price, pp.total_stock, \
         ROUND((ST_Distance(pa.coordinate, b.point) / 1000)::numeric, 2) AS distance_km",
    );
    qb.push(" ORDER BY ")
        .push(filter.sort_by.as_sql())
        .push(" ")
        .push(filter.sort.as_sql())
        .push(", pp.id ASC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let rows = qb.build_query_as::<NearestProductRow>().fetch_all(pool).await?;

    let mut count = QueryBuilder::<Postgres>::new("");
    push_nearest_query(&mut count, filter, "COUNT(*)");
    let (total,): (i64,) = count.build_query_as().fetch_one(pool).await?;

    Ok((rows, total))
}

#[derive(Debug, Clone, FromRow)]
pub struct Route {
    pub origin_city_id: i64,
    pub destination_city_id: i64,
    pub distance_km: f64,
}

/// Pharmacy to a user-owned address; `None` if either end is missing or the
/// address belongs to someone else.
pub async fn route(
    pool: &DbPool,
    pharmacy_id: i64,
    user_address_id: i64,
    user_id: i64,
) -> AppResult<Option<Route>> {
    let row = sqlx::query_as::<_, Route>(
        r#"
        SELECT pa.city_id AS origin_city_id, ua.city_id AS destination_city_id,
               ST_Distance(pa.coordinate, ua.coordinate) / 1000 AS distance_km
        FROM pharmacy_addresses pa, user_addresses ua
        WHERE pa.pharmacy_id = $1 AND pa.deleted_at IS NULL
          AND ua.id = $2 AND ua.user_id = $3 AND ua.deleted_at IS NULL
        "#,
    )
    .bind(pharmacy_id)
    .bind(user_address_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
