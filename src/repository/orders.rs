use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Statement, Value,
    sea_query::{Expr, LockType},
};
use sea_orm::ActiveValue::{NotSet, Set};
use serde::Serialize;
use sqlx::{FromRow, Postgres, QueryBuilder};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    db::DbPool,
    entity::{
        order_items::{
            ActiveModel as ItemActive, Column as ItemCol, Entity as OrderItems, Model as ItemModel,
        },
        orders::{ActiveModel, Column, Entity as Orders, Model},
    },
    error::{AppError, AppResult},
    status::OrderStatus,
};

/// Whose orders a caller may see or move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderScope {
    /// Orders shipped to one of this user's addresses.
    User(i64),
    /// Orders of pharmacies run by the manager behind this user id.
    Manager(i64),
    Admin,
}

impl OrderScope {
    /// Appends the ownership predicate over `ua` (user address) and `pm`
    /// (pharmacy manager) as bind `$next`; returns the bound value if any.
    fn predicate(&self, next: usize) -> (String, Option<i64>) {
        match self {
            OrderScope::User(id) => (format!(" AND ua.user_id = ${next}"), Some(*id)),
            OrderScope::Manager(id) => (format!(" AND pm.user_id = ${next}"), Some(*id)),
            OrderScope::Admin => (String::new(), None),
        }
    }
}

pub struct NewOrder {
    pub order_number: Uuid,
    pub total_price: Decimal,
    pub payment_deadline: DateTime<Utc>,
    pub shipping_fee: Decimal,
    pub shipping_method: String,
    pub user_address_id: i64,
    pub pharmacy_id: i64,
}

pub async fn insert<C: ConnectionTrait>(db: &C, order: NewOrder) -> AppResult<Model> {
    let model = ActiveModel {
        id: NotSet,
        order_number: Set(order.order_number),
        total_price: Set(order.total_price),
        payment_proof: Set(None),
        payment_deadline: Set(order.payment_deadline.into()),
        shipping_fee: Set(order.shipping_fee),
        shipping_method: Set(order.shipping_method),
        user_address_id: Set(order.user_address_id),
        pharmacy_id: Set(order.pharmacy_id),
        order_status_id: Set(OrderStatus::Pending.id()),
        created_at: NotSet,
        updated_at: NotSet,
        deleted_at: NotSet,
    }
    .insert(db)
    .await?;
    Ok(model)
}

pub async fn insert_item<C: ConnectionTrait>(
    db: &C,
    order_id: i64,
    pharmacy_product_id: i64,
    quantity: i32,
    price: Decimal,
) -> AppResult<ItemModel> {
    let item = ItemActive {
        id: NotSet,
        order_id: Set(order_id),
        pharmacy_product_id: Set(pharmacy_product_id),
        quantity: Set(quantity),
        price: Set(price),
        stock_taken: Set(false),
        created_at: NotSet,
        updated_at: NotSet,
        deleted_at: NotSet,
    }
    .insert(db)
    .await?;
    Ok(item)
}

pub async fn items_of<C: ConnectionTrait>(db: &C, order_id: i64) -> AppResult<Vec<ItemModel>> {
    let items = OrderItems::find()
        .filter(ItemCol::OrderId.eq(order_id))
        .filter(ItemCol::DeletedAt.is_null())
        .order_by_asc(ItemCol::Id)
        .all(db)
        .await?;
    Ok(items)
}

pub async fn get<C: ConnectionTrait>(db: &C, id: i64) -> AppResult<Model> {
    Orders::find_by_id(id)
        .filter(Column::DeletedAt.is_null())
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("order"))
}

/// Unguarded status write for internal compensation only.
pub async fn force_status<C: ConnectionTrait>(
    db: &C,
    id: i64,
    from: OrderStatus,
    to: OrderStatus,
) -> AppResult<u64> {
    let result = Orders::update_many()
        .col_expr(Column::OrderStatusId, Expr::value(to.id()))
        .col_expr(Column::UpdatedAt, Expr::current_timestamp().into())
        .filter(Column::Id.eq(id))
        .filter(Column::OrderStatusId.eq(from.id()))
        .filter(Column::DeletedAt.is_null())
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Share-locks the order row so a concurrent status change waits for the
/// current stock transaction, then reads the row as committed.
pub async fn lock_shared<C: ConnectionTrait>(db: &C, id: i64) -> AppResult<Model> {
    Orders::find_by_id(id)
        .filter(Column::DeletedAt.is_null())
        .lock(LockType::Share)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found("order"))
}

/// Flags the item as decremented. Zero rows means it already was.
pub async fn mark_stock_taken<C: ConnectionTrait>(db: &C, item_id: i64) -> AppResult<u64> {
    set_stock_taken(db, item_id, true).await
}

/// Clears the decremented flag. Zero rows means there is nothing to give back.
pub async fn release_stock_taken<C: ConnectionTrait>(db: &C, item_id: i64) -> AppResult<u64> {
    set_stock_taken(db, item_id, false).await
}

async fn set_stock_taken<C: ConnectionTrait>(db: &C, item_id: i64, taken: bool) -> AppResult<u64> {
    let result = OrderItems::update_many()
        .col_expr(ItemCol::StockTaken, Expr::value(taken))
        .col_expr(ItemCol::UpdatedAt, Expr::current_timestamp().into())
        .filter(ItemCol::Id.eq(item_id))
        .filter(ItemCol::StockTaken.eq(!taken))
        .filter(ItemCol::DeletedAt.is_null())
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Soft-deletes the items of an order that never got their stock.
pub async fn drop_untaken_items<C: ConnectionTrait>(db: &C, order_id: i64) -> AppResult<u64> {
    let result = OrderItems::update_many()
        .col_expr(ItemCol::DeletedAt, Expr::current_timestamp().into())
        .col_expr(ItemCol::UpdatedAt, Expr::current_timestamp().into())
        .filter(ItemCol::OrderId.eq(order_id))
        .filter(ItemCol::StockTaken.eq(false))
        .filter(ItemCol::DeletedAt.is_null())
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

const OWNERSHIP_JOIN: &str = "ua.id = o.user_address_id AND p.id = o.pharmacy_id \
     AND pm.id = p.pharmacy_manager_id";

/// Moves the order from `from` to `to` only when the caller's ownership
/// predicate matches in the same statement. Returns the affected row count.
pub async fn transition<C: ConnectionTrait>(
    db: &C,
    id: i64,
    from: OrderStatus,
    to: OrderStatus,
    scope: OrderScope,
    require_no_payment_proof: bool,
) -> AppResult<u64> {
    let mut sql = format!(
        "UPDATE orders o SET order_status_id = $1, updated_at = NOW() \
         FROM user_addresses ua, pharmacies p, pharmacy_managers pm \
         WHERE o.id = $2 AND o.order_status_id = $3 AND o.deleted_at IS NULL AND {OWNERSHIP_JOIN}"
    );
    let mut values: Vec<Value> = vec![to.id().into(), id.into(), from.id().into()];
    let (predicate, bound) = scope.predicate(values.len() + 1);
    sql.push_str(&predicate);
    if let Some(value) = bound {
        values.push(value.into());
    }
    if require_no_payment_proof {
        sql.push_str(" AND o.payment_proof IS NULL");
    }

    let result = db
        .execute(Statement::from_sql_and_values(DbBackend::Postgres, sql, values))
        .await?;
    Ok(result.rows_affected())
}

/// The order as seen by `scope`, or `None` when it is outside the scope.
pub async fn find_visible<C: ConnectionTrait>(
    db: &C,
    id: i64,
    scope: OrderScope,
) -> AppResult<Option<Model>> {
    let mut sql = format!(
        "SELECT o.* FROM orders o, user_addresses ua, pharmacies p, pharmacy_managers pm \
         WHERE o.id = $1 AND o.deleted_at IS NULL AND {OWNERSHIP_JOIN}"
    );
    let mut values: Vec<Value> = vec![id.into()];
    let (predicate, bound) = scope.predicate(values.len() + 1);
    sql.push_str(&predicate);
    if let Some(value) = bound {
        values.push(value.into());
    }

    let row = Orders::find()
        .from_raw_sql(Statement::from_sql_and_values(DbBackend::Postgres, sql, values))
        .one(db)
        .await?;
    Ok(row)
}

/// Sets the proof on a pending order shipped to one of the user's addresses.
pub async fn set_payment_proof<C: ConnectionTrait>(
    db: &C,
    id: i64,
    user_id: i64,
    url: &str,
) -> AppResult<u64> {
    let result = db
        .execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE orders o SET payment_proof = $1, updated_at = NOW()
            FROM user_addresses ua
            WHERE o.id = $2 AND ua.id = o.user_address_id AND ua.user_id = $3
              AND o.order_status_id = $4 AND o.deleted_at IS NULL
            "#,
            [
                url.into(),
                id.into(),
                user_id.into(),
                OrderStatus::Pending.id().into(),
            ],
        ))
        .await?;
    Ok(result.rows_affected())
}

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderRow {
    pub id: i64,
    pub order_number: Uuid,
    pub total_price: Decimal,
    pub payment_proof: Option<String>,
    pub payment_deadline: DateTime<Utc>,
    pub shipping_fee: Decimal,
    pub shipping_method: String,
    pub user_address_id: i64,
    pub pharmacy_id: i64,
    pub pharmacy_name: String,
    pub order_status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRow {
    pub id: i64,
    #[serde(skip)]
    pub order_id: i64,
    pub pharmacy_product_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub picture_url: Option<String>,
    pub quantity: i32,
    pub price: Decimal,
}

#[derive(Debug, Clone)]
pub struct OrderFilter {
    pub scope: OrderScope,
    pub status: Option<OrderStatus>,
    pub pharmacy_id: Option<i64>,
}

fn push_order_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    qb.push(
        " FROM orders o \
          JOIN order_statuses os ON os.id = o.order_status_id \
          JOIN user_addresses ua ON ua.id = o.user_address_id \
          JOIN pharmacies p ON p.id = o.pharmacy_id \
          JOIN pharmacy_managers pm ON pm.id = p.pharmacy_manager_id \
          WHERE o.deleted_at IS NULL",
    );
    if let Some(status) = filter.status {
        qb.push(" AND o.order_status_id = ").push_bind(status.id());
    }
    match filter.scope {
        OrderScope::User(user_id) => {
            qb.push(" AND ua.user_id = ").push_bind(user_id);
        }
        OrderScope::Manager(user_id) => {
            qb.push(" AND pm.user_id = ").push_bind(user_id);
        }
        OrderScope::Admin => {}
    }
    if let Some(pharmacy_id) = filter.pharmacy_id {
        qb.push(" AND o.pharmacy_id = ").push_bind(pharmacy_id);
    }
}

const ORDER_ROW_COLUMNS: &str = "SELECT o.id, o.order_number, o.total_price, o.payment_proof, \
     o.payment_deadline, o.shipping_fee, o.shipping_method, o.user_address_id, o.pharmacy_id, \
     p.name AS pharmacy_name, os.name AS order_status, o.created_at";

pub async fn find_row(pool: &DbPool, id: i64, scope: OrderScope) -> AppResult<Option<OrderRow>> {
    let filter = OrderFilter {
        scope,
        status: None,
        pharmacy_id: None,
    };
    let mut qb = QueryBuilder::<Postgres>::new(ORDER_ROW_COLUMNS);
    push_order_filter(&mut qb, &filter);
    qb.push(" AND o.id = ").push_bind(id);
    let row = qb.build_query_as::<OrderRow>().fetch_optional(pool).await?;
    Ok(row)
}

pub async fn list(
    pool: &DbPool,
    filter: &OrderFilter,
    limit: i64,
    offset: i64,
) -> AppResult<(Vec<OrderRow>, i64)> {
    let mut qb = QueryBuilder::<Postgres>::new(ORDER_ROW_COLUMNS);
    push_order_filter(&mut qb, filter);
    qb.push(" ORDER BY o.created_at DESC, o.id DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let rows = qb.build_query_as::<OrderRow>().fetch_all(pool).await?;

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
    push_order_filter(&mut count, filter);
    let (total,): (i64,) = count.build_query_as().fetch_one(pool).await?;

    Ok((rows, total))
}

pub async fn items_for_orders(pool: &DbPool, order_ids: &[i64]) -> AppResult<Vec<OrderItemRow>> {
    if order_ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query_as::<_, OrderItemRow>(
        r#"
        SELECT oi.id, oi.order_id, oi.pharmacy_product_id, pr.id AS product_id,
               pr.name AS product_name, pr.picture_url, oi.quantity, oi.price
        FROM order_items oi
        JOIN pharmacy_products pp ON pp.id = oi.pharmacy_product_id
        JOIN products pr ON pr.id = pp.product_id
        WHERE oi.order_id = ANY($1) AND oi.deleted_at IS NULL
        ORDER BY oi.order_id, oi.id
        "#,
    )
    .bind(order_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
