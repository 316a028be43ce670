use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    repository::geo::NearestSortBy,
};

#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(10).clamp(1, 100);
        let offset = (page - 1) * limit;
        (page, limit, offset)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub enum SortOrder {
    #[serde(rename = "ASC", alias = "asc")]
    Asc,
    #[serde(rename = "DESC", alias = "desc")]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// A buyer location plus search radius in meters.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GeoQuery {
    pub longitude: f64,
    pub latitude: f64,
    pub radius: Option<f64>,
}

impl GeoQuery {
    pub fn validate(&self, default_radius: f64) -> AppResult<(f64, f64, f64)> {
        validate_coordinates(self.longitude, self.latitude)?;
        let radius = self.radius.unwrap_or(default_radius);
        if !radius.is_finite() || radius <= 0.0 {
            return Err(AppError::BadRequest("radius must be greater than 0".into()));
        }
        Ok((self.longitude, self.latitude, radius))
    }
}

pub fn validate_coordinates(longitude: f64, latitude: f64) -> AppResult<()> {
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(AppError::BadRequest("invalid longitude".into()));
    }
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(AppError::BadRequest("invalid latitude".into()));
    }
    Ok(())
}

#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub pharmacy_id: Option<i64>,
}

impl OrderListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockTransferListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
}

impl StockTransferListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockHistoryQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub pharmacy_id: Option<i64>,
    pub keyword: Option<String>,
}

impl StockHistoryQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PharmacyRank {
    #[default]
    Stock,
    Sales,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NearestPharmacyQuery {
    pub longitude: f64,
    pub latitude: f64,
    pub radius: Option<f64>,
    pub rank: Option<PharmacyRank>,
}

impl NearestPharmacyQuery {
    pub fn geo(&self) -> GeoQuery {
        GeoQuery {
            longitude: self.longitude,
            latitude: self.latitude,
            radius: self.radius,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NearestProductsQuery {
    pub longitude: f64,
    pub latitude: f64,
    pub radius: Option<f64>,
    pub category_id: Option<i64>,
    pub keyword: Option<String>,
    pub sort_by: Option<NearestSortBy>,
    pub sort: Option<SortOrder>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl NearestProductsQuery {
    pub fn geo(&self) -> GeoQuery {
        GeoQuery {
            longitude: self.longitude,
            latitude: self.latitude,
            radius: self.radius,
        }
    }

    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_to_first_page_of_ten() {
        let (page, limit, offset) = Pagination::default().normalize();
        assert_eq!((page, limit, offset), (1, 10, 0));
    }

    #[test]
    fn pagination_clamps_out_of_range_values() {
        let p = Pagination {
            page: Some(0),
            limit: Some(1000),
        };
        assert_eq!(p.normalize(), (1, 100, 0));

        let p = Pagination {
            page: Some(3),
            limit: Some(20),
        };
        assert_eq!(p.normalize(), (3, 20, 40));
    }

    #[test]
    fn sort_order_accepts_both_cases() {
        let upper: SortOrder = serde_json::from_str("\"ASC\"").unwrap();
        let lower: SortOrder = serde_json::from_str("\"desc\"").unwrap();
        assert_eq!(upper.as_sql(), "ASC");
        assert_eq!(lower.as_sql(), "DESC");
    }

    #[test]
    fn malformed_coordinates_are_rejected() {
        assert!(validate_coordinates(106.8, -6.2).is_ok());
        assert!(validate_coordinates(181.0, 0.0).is_err());
        assert!(validate_coordinates(0.0, -91.0).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn geo_query_falls_back_to_default_radius() {
        let q = GeoQuery {
            longitude: 106.8,
            latitude: -6.2,
            radius: None,
        };
        assert_eq!(q.validate(25_000.0).unwrap(), (106.8, -6.2, 25_000.0));

        let q = GeoQuery {
            radius: Some(-1.0),
            ..q
        };
        assert!(q.validate(25_000.0).is_err());
    }

    #[test]
    fn pharmacy_rank_defaults_to_stock() {
        let q: NearestPharmacyQuery =
            serde_json::from_str(r#"{"longitude":106.8,"latitude":-6.2}"#).unwrap();
        assert!(matches!(q.rank.unwrap_or_default(), PharmacyRank::Stock));
        let rank: PharmacyRank = serde_json::from_str("\"sales\"").unwrap();
        assert!(matches!(rank, PharmacyRank::Sales));
    }
}
