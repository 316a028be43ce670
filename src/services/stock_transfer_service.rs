use crate::{
    audit,
    db::UnitOfWork,
    dto::inventory::{CreateStockTransferRequest, UpdateStockTransferStatusRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_any},
    models::StockTransfer,
    repository::{
        pharmacies, pharmacy_products, stock_histories,
        stock_transfers::{self, StockTransferRow, TransferFilter},
    },
    response::{ApiResponse, Meta},
    routes::params::StockTransferListQuery,
    state::AppState,
    status::{MutationAction, MutationStatus, Role},
};

const TRANSFER_ROLES: [Role; 2] = [Role::PharmacyManager, Role::Admin];

pub async fn create(
    state: &AppState,
    user: &AuthUser,
    payload: CreateStockTransferRequest,
) -> AppResult<ApiResponse<StockTransfer>> {
    ensure_any(user, &TRANSFER_ROLES)?;
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest("quantity must be greater than 0".into()));
    }
    if payload.pharmacy_sender_id == payload.pharmacy_receiver_id {
        return Err(AppError::BadRequest(
            "sender and receiver must be different pharmacies".into(),
        ));
    }

    let sender = pharmacies::get(&state.orm, payload.pharmacy_sender_id)
        .await
        .map_err(as_bad_request)?;
    let receiver = pharmacies::get(&state.orm, payload.pharmacy_receiver_id)
        .await
        .map_err(as_bad_request)?;
    if sender.pharmacy_manager_id != receiver.pharmacy_manager_id {
        return Err(AppError::BadRequest(
            "pharmacies must belong to the same pharmacy manager".into(),
        ));
    }
    if user.role == Role::PharmacyManager
        && !pharmacies::is_owned_by_manager_user(&state.pool, sender.id, user.user_id).await?
    {
        return Err(AppError::Forbidden);
    }

    let sender_stock = pharmacy_products::find_by_pharmacy_and_product(
        &state.orm,
        sender.id,
        payload.product_id,
    )
    .await?
    .ok_or_else(|| AppError::BadRequest("sender pharmacy does not sell this product".into()))?;
    if !sender_stock.is_available || sender_stock.total_stock < payload.quantity {
        return Err(AppError::BadRequest(format!(
            "sender pharmacy only has {} available",
            if sender_stock.is_available { sender_stock.total_stock } else { 0 }
        )));
    }
    pharmacy_products::find_by_pharmacy_and_product(&state.orm, receiver.id, payload.product_id)
        .await?
        .ok_or_else(|| {
            AppError::BadRequest("receiver pharmacy does not sell this product".into())
        })?;

    let transfer = stock_transfers::insert(
        &state.orm,
        sender.id,
        receiver.id,
        payload.product_id,
        payload.quantity,
    )
    .await?;

    audit::record(
        &state.pool,
        user.user_id,
        "stock_transfer_create",
        "stock_transfer_requests",
        serde_json::json!({ "stock_transfer_id": transfer.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Stock transfer requested",
        StockTransfer::from(transfer),
        None,
    ))
}

/// Applies a mutation-status change. Processing moves stock from sender to
/// receiver under both row locks, taken in ascending id order, and writes
/// one ledger row per side; everything commits together.
pub async fn update_status(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateStockTransferStatusRequest,
) -> AppResult<ApiResponse<StockTransfer>> {
    ensure_any(user, &TRANSFER_ROLES)?;
    let target = payload.mutation_status;
    let id = payload.id;

    // The sender never changes, so ownership is settled before the row lock.
    if user.role == Role::PharmacyManager {
        let transfer = stock_transfers::get(&state.orm, id).await?;
        let owns_sender = pharmacies::is_owned_by_manager_user(
            &state.pool,
            transfer.pharmacy_sender_id,
            user.user_id,
        )
        .await?;
        if !owns_sender {
            return Err(AppError::Forbidden);
        }
    }

    let transfer = state
        .orm
        .within(move |txn| {
            Box::pin(async move {
                let transfer = stock_transfers::lock(txn, id).await?;

                let current = MutationStatus::from_id(transfer.mutation_status_id).ok_or_else(
                    || AppError::Internal(anyhow::anyhow!("unknown mutation status")),
                )?;
                let action = current.action_to(target).ok_or_else(|| {
                    AppError::BadRequest(format!(
                        "stock transfer is {current} and can no longer change"
                    ))
                })?;

                match action {
                    MutationAction::Noop => Ok(transfer),
                    MutationAction::Cancel => {
                        stock_transfers::set_status(txn, id, MutationStatus::Canceled).await
                    }
                    MutationAction::Transfer => {
                        let sender = pharmacies::get(txn, transfer.pharmacy_sender_id).await?;
                        let receiver = pharmacies::get(txn, transfer.pharmacy_receiver_id).await?;
                        let sender_pp = pharmacy_products::find_by_pharmacy_and_product(
                            txn,
                            sender.id,
                            transfer.product_id,
                        )
                        .await?
                        .ok_or_else(|| {
                            AppError::BadRequest("sender pharmacy does not sell this product".into())
                        })?;
                        let receiver_pp = pharmacy_products::find_by_pharmacy_and_product(
                            txn,
                            receiver.id,
                            transfer.product_id,
                        )
                        .await?
                        .ok_or_else(|| {
                            AppError::BadRequest(
                                "receiver pharmacy does not sell this product".into(),
                            )
                        })?;

                        let (first, second) = lock_order(sender_pp.id, receiver_pp.id);
                        let first = pharmacy_products::lock(txn, first).await?;
                        let second = pharmacy_products::lock(txn, second).await?;
                        let (sender_pp, receiver_pp) = if first.id == sender_pp.id {
                            (first, second)
                        } else {
                            (second, first)
                        };

                        let qty = transfer.quantity;
                        if sender_pp.total_stock < qty {
                            return Err(AppError::NotEnoughStock(format!(
                                "sender pharmacy only has {} left",
                                sender_pp.total_stock
                            )));
                        }
                        pharmacy_products::set_total_stock(
                            txn,
                            sender.id,
                            transfer.product_id,
                            sender_pp.total_stock - qty,
                        )
                        .await?;
                        pharmacy_products::set_total_stock(
                            txn,
                            receiver.id,
                            transfer.product_id,
                            receiver_pp.total_stock + qty,
                        )
                        .await?;
                        stock_histories::append(
                            txn,
                            sender_pp.id,
                            sender.id,
                            -qty,
                            &format!("sent {qty} to {}", receiver.name),
                        )
                        .await?;
                        stock_histories::append(
                            txn,
                            receiver_pp.id,
                            receiver.id,
                            qty,
                            &format!("received {qty} from {}", sender.name),
                        )
                        .await?;
                        stock_transfers::set_status(txn, id, MutationStatus::Processed).await
                    }
                }
            })
        })
        .await?;

    tracing::info!(
        stock_transfer_id = transfer.id,
        status = %target,
        "stock transfer status updated"
    );
    audit::record(
        &state.pool,
        user.user_id,
        "stock_transfer_status",
        "stock_transfer_requests",
        serde_json::json!({ "stock_transfer_id": transfer.id, "status": target.name() }),
    )
    .await;

    Ok(ApiResponse::success(
        "Stock transfer updated",
        StockTransfer::from(transfer),
        None,
    ))
}

pub async fn list(
    state: &AppState,
    user: &AuthUser,
    query: StockTransferListQuery,
) -> AppResult<ApiResponse<Vec<StockTransferRow>>> {
    ensure_any(user, &TRANSFER_ROLES)?;
    let (page, limit, offset) = query.pagination().normalize();
    let status = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(name) => Some(
            MutationStatus::from_name(name)
                .ok_or_else(|| AppError::BadRequest(format!("unknown mutation status {name}")))?,
        ),
        None => None,
    };
    let filter = TransferFilter {
        manager_user_id: (user.role == Role::PharmacyManager).then_some(user.user_id),
        status,
    };
    let (rows, total) = stock_transfers::list(&state.pool, &filter, limit, offset).await?;
    Ok(ApiResponse::success("OK", rows, Some(Meta::new(page, limit, total))))
}

fn lock_order(a: i64, b: i64) -> (i64, i64) {
    if a <= b { (a, b) } else { (b, a) }
}

fn as_bad_request(err: AppError) -> AppError {
    match err {
        AppError::NotFound(msg) => AppError::BadRequest(msg),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_locked_in_ascending_id_order() {
        assert_eq!(lock_order(7, 3), (3, 7));
        assert_eq!(lock_order(3, 7), (3, 7));
    }

    #[test]
    fn missing_pharmacies_surface_as_bad_request() {
        let err = as_bad_request(AppError::not_found("pharmacy"));
        assert_eq!(err.code(), "bad-request");
        assert!(matches!(as_bad_request(AppError::Forbidden), AppError::Forbidden));
    }
}
