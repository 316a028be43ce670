use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect,
    sea_query::{Expr, LockType, SimpleExpr},
};
use sea_orm::ActiveValue::{NotSet, Set};

use crate::{
    entity::pharmacy_products::{ActiveModel, Column, Entity as PharmacyProducts, Model},
    error::{AppError, AppResult},
};

/// Takes the row-level exclusive lock on a pharmacy product for the rest of
/// the current transaction and returns the row as read under that lock.
pub async fn lock<C: ConnectionTrait>(db: &C, id: i64) -> AppResult<Model> {
    PharmacyProducts::find_by_id(id)
        .filter(Column::DeletedAt.is_null())
        .lock(LockType::Update)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("pharmacy product"))
}

pub async fn get<C: ConnectionTrait>(db: &C, id: i64) -> AppResult<Model> {
    PharmacyProducts::find_by_id(id)
        .filter(Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("pharmacy product"))
}

pub async fn find_by_pharmacy_and_product<C: ConnectionTrait>(
    db: &C,
    pharmacy_id: i64,
    product_id: i64,
) -> AppResult<Option<Model>> {
    let row = PharmacyProducts::find()
        .filter(Column::PharmacyId.eq(pharmacy_id))
        .filter(Column::ProductId.eq(product_id))
        .filter(Column::DeletedAt.is_null())
        .one(db)
        .await?;
    Ok(row)
}

pub async fn insert<C: ConnectionTrait>(
    db: &C,
    pharmacy_id: i64,
    product_id: i64,
    price: Decimal,
    total_stock: i32,
    is_available: bool,
) -> AppResult<Model> {
    let model = ActiveModel {
        id: NotSet,
        pharmacy_id: Set(pharmacy_id),
        product_id: Set(product_id),
        price: Set(price),
        total_stock: Set(total_stock),
        is_available: Set(is_available && total_stock > 0),
        created_at: NotSet,
        updated_at: NotSet,
        deleted_at: NotSet,
    }
    .insert(db)
    .await
    .map_err(|e| AppError::from(e).with_conflict_message("product already exists in this pharmacy"))?;
    Ok(model)
}

/// Caller must hold the row lock and have checked `qty <= total_stock`.
pub async fn decrease<C: ConnectionTrait>(db: &C, id: i64, qty: i32) -> AppResult<()> {
    let result = PharmacyProducts::update_many()
        .col_expr(Column::TotalStock, Expr::col(Column::TotalStock).sub(qty))
        .col_expr(Column::IsAvailable, availability_after_delta(-qty))
        .col_expr(Column::UpdatedAt, Expr::current_timestamp().into())
        .filter(Column::Id.eq(id))
        .filter(Column::DeletedAt.is_null())
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("pharmacy product"));
    }
    Ok(())
}

/// Caller must hold the row lock.
pub async fn increase<C: ConnectionTrait>(db: &C, id: i64, qty: i32) -> AppResult<()> {
    let result = PharmacyProducts::update_many()
        .col_expr(Column::TotalStock, Expr::col(Column::TotalStock).add(qty))
        .col_expr(Column::UpdatedAt, Expr::current_timestamp().into())
        .filter(Column::Id.eq(id))
        .filter(Column::DeletedAt.is_null())
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("pharmacy product"));
    }
    Ok(())
}

pub async fn set_total_stock<C: ConnectionTrait>(
    db: &C,
    pharmacy_id: i64,
    product_id: i64,
    new_stock: i32,
) -> AppResult<()> {
    if new_stock < 0 {
        return Err(AppError::NotEnoughStock("stock cannot be negative".into()));
    }
    let mut update = PharmacyProducts::update_many()
        .col_expr(Column::TotalStock, Expr::value(new_stock))
        .col_expr(Column::UpdatedAt, Expr::current_timestamp().into());
    if new_stock == 0 {
        update = update.col_expr(Column::IsAvailable, Expr::value(false));
    }
    let result = update
        .filter(Column::PharmacyId.eq(pharmacy_id))
        .filter(Column::ProductId.eq(product_id))
        .filter(Column::DeletedAt.is_null())
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("pharmacy product"));
    }
    Ok(())
}

// Postgres evaluates SET expressions against the pre-update row.
fn availability_after_delta(delta: i32) -> SimpleExpr {
    Expr::cust_with_values(
        "CASE WHEN total_stock + $1 <= 0 THEN FALSE ELSE is_available END",
        [delta],
    )
}
