use anyhow::Result;
use futures::future::BoxFuture;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, SqlxPostgresConnector,
    TransactionTrait,
};
use sqlx::postgres::PgPoolOptions;

use crate::error::{AppError, AppResult};

pub type DbPool = sqlx::PgPool;
pub type OrmConn = DatabaseConnection;

pub async fn create_pool(database_url: &str) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Create a SeaORM connection sharing the sqlx pool.
pub fn create_orm_conn(pool: &DbPool) -> OrmConn {
    SqlxPostgresConnector::from_sqlx_postgres_pool(pool.clone())
}

pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Scoped unit of work over "whatever executor is current".
///
/// On the pooled connection `within` opens a transaction, runs `op` with the
/// handle, commits on `Ok` and rolls back on `Err`. A panic inside `op` drops
/// the handle, which rolls it back. On an open transaction `within` hands the
/// same handle to `op`: nested scopes share the outer transaction and create
/// no savepoints.
pub trait UnitOfWork: ConnectionTrait + Send + Sync {
    fn within<'a, T, F>(&'a self, op: F) -> BoxFuture<'a, AppResult<T>>
    where
        T: Send + 'a,
        F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, AppResult<T>> + Send + 'a;
}

impl UnitOfWork for DatabaseConnection {
    fn within<'a, T, F>(&'a self, op: F) -> BoxFuture<'a, AppResult<T>>
    where
        T: Send + 'a,
        F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, AppResult<T>> + Send + 'a,
    {
        Box::pin(async move {
            let txn = self.begin().await.map_err(AppError::OrmError)?;
            match op(&txn).await {
                Ok(value) => {
                    txn.commit().await.map_err(AppError::OrmError)?;
                    Ok(value)
                }
                Err(err) => {
                    if let Err(rollback_err) = txn.rollback().await {
                        tracing::warn!(error = %rollback_err, cause = %err, "transaction rollback failed");
                        return Err(AppError::OrmError(rollback_err));
                    }
                    Err(err)
                }
            }
        })
    }
}

impl UnitOfWork for DatabaseTransaction {
    fn within<'a, T, F>(&'a self, op: F) -> BoxFuture<'a, AppResult<T>>
    where
        T: Send + 'a,
        F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, AppResult<T>> + Send + 'a,
    {
        op(self)
    }
}
