use rust_decimal::{Decimal, RoundingStrategy, prelude::FromPrimitive};

use crate::{
    carrier::CostRequest,
    dto::shipping::{ShippingFeeList, ShippingFeeRequest, ShippingKind, ShippingOption},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_role},
    repository::{geo, pharmacies},
    response::ApiResponse,
    state::AppState,
    status::Role,
};

/// Flat per-km rate, never below one unit of `base`.
pub fn official_fee(base: Decimal, distance_km: f64) -> AppResult<Decimal> {
    let km = Decimal::from_f64(distance_km)
        .filter(|km| !km.is_sign_negative())
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("invalid distance {distance_km}")))?;
    let fee = (base * km).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    Ok(fee.max(base))
}

pub async fn fees(
    state: &AppState,
    user: &AuthUser,
    payload: ShippingFeeRequest,
) -> AppResult<ApiResponse<ShippingFeeList>> {
    ensure_role(user, Role::User)?;
    if payload.weight <= 0 {
        return Err(AppError::BadRequest("weight must be greater than 0".into()));
    }
    pharmacies::get(&state.orm, payload.pharmacy_id).await?;
    let route = geo::route(
        &state.pool,
        payload.pharmacy_id,
        payload.user_address_id,
        user.user_id,
    )
    .await?
    .ok_or_else(|| AppError::not_found("address"))?;

    let ids = [payload.pharmacy_id];
    let mut options = Vec::new();
    for method in pharmacies::official_shipping_methods(&state.pool, &ids).await? {
        let base = method.price.unwrap_or(state.config.official_shipping_base_fee);
        options.push(ShippingOption {
            kind: ShippingKind::Official,
            shipping_method_id: method.id,
            name: method.name,
            fee: official_fee(base, route.distance_km)?,
        });
    }
    for method in pharmacies::non_official_shipping_methods(&state.pool, &ids).await? {
        let request = CostRequest {
            origin_city_id: route.origin_city_id,
            destination_city_id: route.destination_city_id,
            weight: payload.weight,
            courier: method.courier.clone(),
        };
        let fee = state.carrier.cost(&request, &method.service).await?;
        options.push(ShippingOption {
            kind: ShippingKind::NonOfficial,
            shipping_method_id: method.id,
            name: method.name,
            fee,
        });
    }

    tracing::debug!(
        pharmacy_id = payload.pharmacy_id,
        distance_km = route.distance_km,
        options = options.len(),
        "shipping fees resolved"
    );
    Ok(ApiResponse::success(
        "OK",
        ShippingFeeList {
            distance_km: route.distance_km,
            options,
        },
        None,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn official_fee_scales_with_distance() {
        let fee = official_fee(Decimal::from(10_000), 3.25).unwrap();
        assert_eq!(fee, Decimal::from(32_500));
    }

    #[test]
    fn official_fee_rounds_half_away_from_zero() {
        let fee = official_fee(Decimal::from(3), 1.5).unwrap();
        assert_eq!(fee, Decimal::from(5));
    }

    #[test]
    fn official_fee_never_drops_below_base() {
        assert_eq!(official_fee(Decimal::from(10_000), 0.2).unwrap(), Decimal::from(10_000));
        assert_eq!(official_fee(Decimal::from(10_000), 0.0).unwrap(), Decimal::from(10_000));
    }

    #[test]
    fn negative_distance_is_rejected() {
        assert!(official_fee(Decimal::from(10_000), -1.0).is_err());
    }
}
