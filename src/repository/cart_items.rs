use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, FromQueryResult,
    JoinType, QueryFilter, QuerySelect, RelationTrait, Statement,
    sea_query::Expr,
};
use sea_orm::ActiveValue::{NotSet, Set};
use sqlx::FromRow;

use crate::{
    db::DbPool,
    entity::{
        cart_items::{ActiveModel, Column, Entity as CartItems, Model, Relation},
        pharmacy_products::Column as PpCol,
    },
    error::{AppError, AppResult},
};

pub async fn find_active<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    pharmacy_product_id: i64,
) -> AppResult<Option<Model>> {
    let row = CartItems::find()
        .filter(Column::UserId.eq(user_id))
        .filter(Column::PharmacyProductId.eq(pharmacy_product_id))
        .filter(Column::DeletedAt.is_null())
        .one(db)
        .await?;
    Ok(row)
}

/// A live cart line owned by `user_id`; anything else is not-found.
pub async fn find_owned<C: ConnectionTrait>(db: &C, id: i64, user_id: i64) -> AppResult<Model> {
    CartItems::find_by_id(id)
        .filter(Column::UserId.eq(user_id))
        .filter(Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("cart item"))
}

pub async fn insert<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    pharmacy_product_id: i64,
    quantity: i32,
) -> AppResult<Model> {
    let model = ActiveModel {
        id: NotSet,
        user_id: Set(user_id),
        pharmacy_product_id: Set(pharmacy_product_id),
        quantity: Set(quantity),
        created_at: NotSet,
        updated_at: NotSet,
        deleted_at: NotSet,
    }
    .insert(db)
    .await
    .map_err(|e| AppError::from(e).with_conflict_message("product is already in the cart"))?;
    Ok(model)
}

pub async fn set_quantity<C: ConnectionTrait>(
    db: &C,
    id: i64,
    quantity: i32,
) -> AppResult<Model> {
    let result = CartItems::update_many()
        .col_expr(Column::Quantity, Expr::value(quantity))
        .col_expr(Column::UpdatedAt, Expr::current_timestamp().into())
        .filter(Column::Id.eq(id))
        .filter(Column::DeletedAt.is_null())
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("cart item"));
    }
    CartItems::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("cart item"))
}

#[derive(Debug, FromQueryResult)]
pub struct RemainingQuantity {
    pub id: i64,
    pub quantity: i32,
}

/// Atomic decrement; returns the quantity left on the line.
pub async fn decrease<C: ConnectionTrait>(
    db: &C,
    id: i64,
    user_id: i64,
    qty: i32,
) -> AppResult<RemainingQuantity> {
    let stmt = Statement::from_sql_and_values(
        DbBackend::Postgres,
        r#"
        UPDATE cart_items
        SET quantity = quantity - $1, updated_at = NOW()
        WHERE id = $2 AND user_id = $3 AND deleted_at IS NULL
        RETURNING id, quantity
        "#,
        [qty.into(), id.into(), user_id.into()],
    );
    RemainingQuantity::find_by_statement(stmt)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("cart item"))
}

/// Soft-deletes the caller's lines among `ids` and zeroes their quantity.
pub async fn soft_delete<C: ConnectionTrait>(
    db: &C,
    ids: &[i64],
    user_id: i64,
) -> AppResult<u64> {
    let result = CartItems::update_many()
        .col_expr(Column::Quantity, Expr::value(0))
        .col_expr(Column::DeletedAt, Expr::current_timestamp().into())
        .col_expr(Column::UpdatedAt, Expr::current_timestamp().into())
        .filter(Column::Id.is_in(ids.iter().copied()))
        .filter(Column::UserId.eq(user_id))
        .filter(Column::DeletedAt.is_null())
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

#[derive(Debug, Clone, FromQueryResult)]
pub struct CheckoutLine {
    pub cart_item_id: i64,
    pub pharmacy_product_id: i64,
    pub pharmacy_id: i64,
    pub quantity: i32,
    pub price: Decimal,
}

/// Live lines among `ids` owned by `user_id`, joined to their unit price,
/// returned in the order the ids were given.
pub async fn checkout_lines<C: ConnectionTrait>(
    db: &C,
    ids: &[i64],
    user_id: i64,
) -> AppResult<Vec<CheckoutLine>> {
    let mut rows = CartItems::find()
        .select_only()
        .column_as(Column::Id, "cart_item_id")
        .column(Column::PharmacyProductId)
        .column(Column::Quantity)
        .column_as(PpCol::PharmacyId, "pharmacy_id")
        .column_as(PpCol::Price, "price")
        .join(JoinType::InnerJoin, Relation::PharmacyProducts.def())
        .filter(Column::Id.is_in(ids.iter().copied()))
        .filter(Column::UserId.eq(user_id))
        .filter(Column::DeletedAt.is_null())
        .filter(PpCol::DeletedAt.is_null())
        .into_model::<CheckoutLine>()
        .all(db)
        .await?;
    rows.sort_by_key(|row| ids.iter().position(|id| *id == row.cart_item_id));
    Ok(rows)
}

#[derive(Debug, Clone, FromRow)]
pub struct CartLineRow {
    pub id: i64,
    pub pharmacy_product_id: i64,
    pub pharmacy_id: i64,
    pub pharmacy_name: String,
    pub product_id: i64,
    pub product_name: String,
    pub picture_url: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
    pub total_stock: i32,
    pub weight: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// Pharmacies with the most recently touched line come first; lines of the
/// same pharmacy stay adjacent.
pub async fn list_for_user(pool: &DbPool, user_id: i64) -> AppResult<Vec<CartLineRow>> {
    let rows = sqlx::query_as::<_, CartLineRow>(
        r#"
        SELECT ci.id, ci.pharmacy_product_id, pp.pharmacy_id, p.name AS pharmacy_name,
               pr.id AS product_id, pr.name AS product_name, pr.picture_url,
               pp.price, ci.quantity, pp.total_stock, pr.weight, ci.updated_at
        FROM cart_items ci
        JOIN pharmacy_products pp ON pp.id = ci.pharmacy_product_id AND pp.deleted_at IS NULL
        JOIN pharmacies p ON p.id = pp.pharmacy_id AND p.deleted_at IS NULL
        JOIN products pr ON pr.id = pp.product_id AND pr.deleted_at IS NULL
        WHERE ci.user_id = $1 AND ci.deleted_at IS NULL
        ORDER BY MAX(ci.updated_at) OVER (PARTITION BY pp.pharmacy_id) DESC,
                 pp.pharmacy_id, ci.updated_at DESC, ci.id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
