use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::{
    db::DbPool,
    entity::pharmacies::{Column, Entity as Pharmacies, Model},
    error::{AppError, AppResult},
};

pub async fn get<C: ConnectionTrait>(db: &C, id: i64) -> AppResult<Model> {
    Pharmacies::find_by_id(id)
        .filter(Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("pharmacy"))
}

/// `pharmacy_managers.id` of the manager account behind `user_id`.
pub async fn manager_id_for_user(pool: &DbPool, user_id: i64) -> AppResult<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT id FROM pharmacy_managers WHERE user_id = $1 AND deleted_at IS NULL",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| r.0))
}

pub async fn is_owned_by_manager_user(
    pool: &DbPool,
    pharmacy_id: i64,
    user_id: i64,
) -> AppResult<bool> {
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        SELECT p.id
        FROM pharmacies p
        JOIN pharmacy_managers pm ON pm.id = p.pharmacy_manager_id AND pm.deleted_at IS NULL
        WHERE p.id = $1 AND pm.user_id = $2 AND p.deleted_at IS NULL
        "#,
    )
    .bind(pharmacy_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OfficialShippingMethod {
    #[serde(skip)]
    pub pharmacy_id: i64,
    pub id: i64,
    pub name: String,
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NonOfficialShippingMethod {
    #[serde(skip)]
    pub pharmacy_id: i64,
    pub id: i64,
    pub name: String,
    pub courier: String,
    pub service: String,
}

pub async fn official_shipping_methods(
    pool: &DbPool,
    pharmacy_ids: &[i64],
) -> AppResult<Vec<OfficialShippingMethod>> {
    let rows = sqlx::query_as::<_, OfficialShippingMethod>(
        r#"
        SELECT posm.pharmacy_id, osm.id, osm.name, osm.price
        FROM pharmacy_official_shipping_methods posm
        JOIN official_shipping_methods osm ON osm.id = posm.official_shipping_method_id
        WHERE posm.pharmacy_id = ANY($1)
          AND posm.deleted_at IS NULL AND osm.deleted_at IS NULL
        ORDER BY osm.id
        "#,
    )
    .bind(pharmacy_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn non_official_shipping_methods(
    pool: &DbPool,
    pharmacy_ids: &[i64],
) -> AppResult<Vec<NonOfficialShippingMethod>> {
    let rows = sqlx::query_as::<_, NonOfficialShippingMethod>(
        r#"
        SELECT pnsm.pharmacy_id, nsm.id, nsm.name, nsm.courier, nsm.service
        FROM pharmacy_non_official_shipping_methods pnsm
        JOIN non_official_shipping_methods nsm ON nsm.id = pnsm.non_official_shipping_method_id
        WHERE pnsm.pharmacy_id = ANY($1)
          AND pnsm.deleted_at IS NULL AND nsm.deleted_at IS NULL
        ORDER BY nsm.id
        "#,
    )
    .bind(pharmacy_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
