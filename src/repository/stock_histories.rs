use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ConnectionTrait};
use sea_orm::ActiveValue::{NotSet, Set};
use serde::Serialize;
use sqlx::{FromRow, Postgres, QueryBuilder};
use utoipa::ToSchema;

use crate::{
    db::DbPool,
    entity::stock_histories::{ActiveModel, Model},
    error::AppResult,
};

pub const DESC_SELLING: &str = "selling";
pub const DESC_CANCEL_ORDER: &str = "cancel order";
pub const DESC_INITIAL_STOCK: &str = "initial stock";
pub const DESC_STOCK_ADJUSTMENT: &str = "stock adjustment";

/// The only write the ledger supports.
pub async fn append<C: ConnectionTrait>(
    db: &C,
    pharmacy_product_id: i64,
    pharmacy_id: i64,
    quantity: i32,
    description: &str,
) -> AppResult<Model> {
    let row = ActiveModel {
        id: NotSet,
        pharmacy_product_id: Set(pharmacy_product_id),
        pharmacy_id: Set(pharmacy_id),
        quantity: Set(quantity),
        description: Set(description.to_string()),
        created_at: NotSet,
        deleted_at: NotSet,
    }
    .insert(db)
    .await?;
    Ok(row)
}

#[derive(Debug, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockHistoryRow {
    pub id: i64,
    pub pharmacy_product_id: i64,
    pub pharmacy_id: i64,
    pub pharmacy_name: String,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i32,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyStockRow {
    pub pharmacy_product_id: i64,
    pub pharmacy_id: i64,
    pub product_name: String,
    pub month: DateTime<Utc>,
    pub total_addition: i64,
    pub total_deduction: i64,
    pub final_stock: i64,
}

#[derive(Debug, Clone, Default)]
pub struct LedgerFilter {
    pub pharmacy_id: Option<i64>,
    pub manager_user_id: Option<i64>,
    pub keyword: Option<String>,
}

fn push_ledger_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &LedgerFilter) {
    qb.push(
        " FROM stock_histories sh \
          JOIN pharmacy_products pp ON pp.id = sh.pharmacy_product_id \
          JOIN products pr ON pr.id = pp.product_id \
          JOIN pharmacies p ON p.id = sh.pharmacy_id \
          JOIN pharmacy_managers pm ON pm.id = p.pharmacy_manager_id \
          WHERE sh.deleted_at IS NULL",
    );
    if let Some(pharmacy_id) = filter.pharmacy_id {
        qb.push(" AND sh.pharmacy_id = ").push_bind(pharmacy_id);
    }
    if let Some(user_id) = filter.manager_user_id {
        qb.push(" AND pm.user_id = ").push_bind(user_id);
    }
    if let Some(keyword) = filter.keyword.as_ref().filter(|k| !k.is_empty()) {
        qb.push(" AND pr.name ILIKE ").push_bind(format!("%{keyword}%"));
    }
}

pub async fn list(
    pool: &DbPool,
    filter: &LedgerFilter,
    limit: i64,
    offset: i64,
) -> AppResult<(Vec<StockHistoryRow>, i64)> {
    let mut qb = QueryBuilder::<Postgres>::new(
        "SELECT sh.id, sh.pharmacy_product_id, sh.pharmacy_id, p.name AS pharmacy_name, \
         pr.id AS product_id, pr.name AS product_name, sh.quantity, sh.description, sh.created_at",
    );
    push_ledger_filter(&mut qb, filter);
    qb.push(" ORDER BY sh.created_at DESC, sh.id DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let rows = qb.build_query_as::<StockHistoryRow>().fetch_all(pool).await?;

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
    push_ledger_filter(&mut count, filter);
    let (total,): (i64,) = count.build_query_as().fetch_one(pool).await?;

    Ok((rows, total))
}

/// Per pharmacy product and calendar month: additions, deductions and the
/// running balance at the end of that month.
pub async fn monthly_report(
    pool: &DbPool,
    filter: &LedgerFilter,
    limit: i64,
    offset: i64,
) -> AppResult<(Vec<MonthlyStockRow>, i64)> {
    let mut qb = QueryBuilder::<Postgres>::new(
        "SELECT pharmacy_product_id, pharmacy_id, product_name, month, total_addition, total_deduction, \
         (SUM(net) OVER (PARTITION BY pharmacy_product_id ORDER BY month))::BIGINT AS final_stock \
         FROM (",
    );
    push_monthly_groups(&mut qb, filter);
    qb.push(") monthly ORDER BY month DESC, pharmacy_product_id ASC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let rows = qb.build_query_as::<MonthlyStockRow>().fetch_all(pool).await?;

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM (");
    push_monthly_groups(&mut count, filter);
    count.push(") monthly");
    let (total,): (i64,) = count.build_query_as().fetch_one(pool).await?;

    Ok((rows, total))
}

fn push_monthly_groups(qb: &mut QueryBuilder<'_, Postgres>, filter: &LedgerFilter) {
    qb.push(
        "SELECT sh.pharmacy_product_id, sh.pharmacy_id, pr.name AS product_name, \
         date_trunc('month', sh.created_at) AS month, \
         COALESCE(SUM(sh.quantity) FILTER (WHERE sh.quantity > 0), 0)::BIGINT AS total_addition, \
         COALESCE(-SUM(sh.quantity) FILTER (WHERE sh.quantity < 0), 0)::BIGINT AS total_deduction, \
         SUM(sh.quantity)::BIGINT AS net",
    );
    push_ledger_filter(qb, filter);
    qb.push(" GROUP BY sh.pharmacy_product_id, sh.pharmacy_id, pr.name, date_trunc('month', sh.created_at)");
}
