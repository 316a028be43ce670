use crate::{
    dto::inventory::{NearestPharmacy, PharmacyDistanceList},
    error::AppResult,
    repository::geo,
    response::ApiResponse,
    routes::params::{GeoQuery, NearestPharmacyQuery, PharmacyRank},
    state::AppState,
};

pub async fn nearest_pharmacy(
    state: &AppState,
    query: NearestPharmacyQuery,
) -> AppResult<ApiResponse<NearestPharmacy>> {
    let (longitude, latitude, radius) = query.geo().validate(state.config.default_radius_meters)?;
    let pharmacy_id = match query.rank.unwrap_or_default() {
        PharmacyRank::Stock => geo::nearest_pharmacy(&state.pool, longitude, latitude, radius).await?,
        PharmacyRank::Sales => {
            geo::nearest_pharmacy_most_bought(&state.pool, longitude, latitude, radius).await?
        }
    };
    Ok(ApiResponse::success("OK", NearestPharmacy { pharmacy_id }, None))
}

pub async fn pharmacies_for_product(
    state: &AppState,
    product_id: i64,
    query: GeoQuery,
) -> AppResult<ApiResponse<PharmacyDistanceList>> {
    let (longitude, latitude, radius) = query.validate(state.config.default_radius_meters)?;
    let items =
        geo::pharmacies_selling_product(&state.pool, longitude, latitude, radius, product_id)
            .await?;
    Ok(ApiResponse::success("OK", PharmacyDistanceList { items }, None))
}
