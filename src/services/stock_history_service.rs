use crate::{
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_any},
    repository::{
        pharmacies,
        stock_histories::{self, LedgerFilter, MonthlyStockRow, StockHistoryRow},
    },
    response::{ApiResponse, Meta},
    routes::params::StockHistoryQuery,
    state::AppState,
    status::Role,
};

pub async fn list(
    state: &AppState,
    user: &AuthUser,
    query: StockHistoryQuery,
) -> AppResult<ApiResponse<Vec<StockHistoryRow>>> {
    let (page, limit, offset) = query.pagination().normalize();
    let filter = ledger_filter(state, user, &query).await?;
    let (rows, total) = stock_histories::list(&state.pool, &filter, limit, offset).await?;
    Ok(ApiResponse::success("OK", rows, Some(Meta::new(page, limit, total))))
}

pub async fn monthly_report(
    state: &AppState,
    user: &AuthUser,
    query: StockHistoryQuery,
) -> AppResult<ApiResponse<Vec<MonthlyStockRow>>> {
    let (page, limit, offset) = query.pagination().normalize();
    let filter = ledger_filter(state, user, &query).await?;
    let (rows, total) = stock_histories::monthly_report(&state.pool, &filter, limit, offset).await?;
    Ok(ApiResponse::success("OK", rows, Some(Meta::new(page, limit, total))))
}

async fn ledger_filter(
    state: &AppState,
    user: &AuthUser,
    query: &StockHistoryQuery,
) -> AppResult<LedgerFilter> {
    ensure_any(user, &[Role::PharmacyManager, Role::Admin])?;
    let manager_user_id = (user.role == Role::PharmacyManager).then_some(user.user_id);
    if let (Some(pharmacy_id), Some(user_id)) = (query.pharmacy_id, manager_user_id) {
        if !pharmacies::is_owned_by_manager_user(&state.pool, pharmacy_id, user_id).await? {
            return Err(AppError::Forbidden);
        }
    }
    Ok(LedgerFilter {
        pharmacy_id: query.pharmacy_id,
        manager_user_id,
        keyword: query.keyword.clone(),
    })
}
