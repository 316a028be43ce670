use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect,
    sea_query::{Expr, LockType},
};
use sea_orm::ActiveValue::{NotSet, Set};
use serde::Serialize;
use sqlx::{FromRow, Postgres, QueryBuilder};
use utoipa::ToSchema;

use crate::{
    db::DbPool,
    entity::stock_transfer_requests::{ActiveModel, Column, Entity as StockTransfers, Model},
    error::{AppError, AppResult},
    status::MutationStatus,
};

pub async fn insert<C: ConnectionTrait>(
    db: &C,
    sender_id: i64,
    receiver_id: i64,
    product_id: i64,
    quantity: i32,
) -> AppResult<Model> {
    let model = ActiveModel {
        id: NotSet,
        pharmacy_sender_id: Set(sender_id),
        pharmacy_receiver_id: Set(receiver_id),
        product_id: Set(product_id),
        mutation_status_id: Set(MutationStatus::Pending.id()),
        quantity: Set(quantity),
        created_at: NotSet,
        updated_at: NotSet,
        deleted_at: NotSet,
    }
    .insert(db)
    .await?;
    Ok(model)
}

pub async fn get<C: ConnectionTrait>(db: &C, id: i64) -> AppResult<Model> {
    StockTransfers::find_by_id(id)
        .filter(Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("stock transfer"))
}

/// Serializes concurrent status changes on one request.
pub async fn lock<C: ConnectionTrait>(db: &C, id: i64) -> AppResult<Model> {
    StockTransfers::find_by_id(id)
        .filter(Column::DeletedAt.is_null())
        .lock(LockType::Update)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("stock transfer"))
}

pub async fn set_status<C: ConnectionTrait>(
    db: &C,
    id: i64,
    status: MutationStatus,
) -> AppResult<Model> {
    let result = StockTransfers::update_many()
        .col_expr(Column::MutationStatusId, Expr::value(status.id()))
        .col_expr(Column::UpdatedAt, Expr::current_timestamp().into())
        .filter(Column::Id.eq(id))
        .filter(Column::DeletedAt.is_null())
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("stock transfer"));
    }
    StockTransfers::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("stock transfer"))
}

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockTransferRow {
    pub id: i64,
    pub pharmacy_sender_id: i64,
    pub pharmacy_sender_name: String,
    pub pharmacy_receiver_id: i64,
    pub pharmacy_receiver_name: String,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i32,
    pub mutation_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct TransferFilter {
    /// Restricts to requests where this manager owns either side.
    pub manager_user_id: Option<i64>,
    pub status: Option<MutationStatus>,
}

fn push_transfer_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &TransferFilter) {
    qb.push(
        " FROM stock_transfer_requests str \
          JOIN pharmacies ps ON ps.id = str.pharmacy_sender_id \
          JOIN pharmacies pr ON pr.id = str.pharmacy_receiver_id \
          JOIN products pd ON pd.id = str.product_id \
          JOIN mutation_statuses ms ON ms.id = str.mutation_status_id \
          WHERE str.deleted_at IS NULL",
    );
    if let Some(user_id) = filter.manager_user_id {
        qb.push(
            " AND EXISTS (SELECT 1 FROM pharmacy_managers pm \
              WHERE pm.user_id = ",
        )
        .push_bind(user_id)
        .push(
            " AND pm.deleted_at IS NULL \
              AND pm.id IN (ps.pharmacy_manager_id, pr.pharmacy_manager_id))",
        );
    }
    if let Some(status) = filter.status {
        qb.push(" AND str.mutation_status_id = ").push_bind(status.id());
    }
}

pub async fn list(
    pool: &DbPool,
    filter: &TransferFilter,
    limit: i64,
    offset: i64,
) -> AppResult<(Vec<StockTransferRow>, i64)> {
    let mut qb = QueryBuilder::<Postgres>::new(
        "SELECT str.id, str.pharmacy_sender_id, ps.name AS pharmacy_sender_name, \
         str.pharmacy_receiver_id, pr.name AS pharmacy_receiver_name, \
         str.product_id, pd.name AS product_name, str.quantity, \
         ms.name AS mutation_status, str.created_at, str.updated_at",
    );
    push_transfer_filter(&mut qb, filter);
    qb.push(" ORDER BY str.created_at DESC, str.id DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let rows = qb.build_query_as::<StockTransferRow>().fetch_all(pool).await?;

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
    push_transfer_filter(&mut count, filter);
    let (total,): (i64,) = count.build_query_as().fetch_one(pool).await?;

    Ok((rows, total))
}
