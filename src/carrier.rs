//! Third-party courier cost API used for non-official shipping methods.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostRequest {
    pub origin_city_id: i64,
    pub destination_city_id: i64,
    /// Grams.
    pub weight: i64,
    pub courier: String,
}

#[async_trait]
pub trait ShippingCarrier: Send + Sync {
    /// Fee for `service` (for example `REG`) of the requested courier.
    async fn cost(&self, request: &CostRequest, service: &str) -> AppResult<Decimal>;
}

pub struct HttpCarrier {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpCarrier {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl ShippingCarrier for HttpCarrier {
    async fn cost(&self, request: &CostRequest, service: &str) -> AppResult<Decimal> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("SHIPPING_API_KEY is not set")))?;

        let origin = request.origin_city_id.to_string();
        let destination = request.destination_city_id.to_string();
        let weight = request.weight.to_string();
        let resp: Value = self
            .client
            .post(&self.url)
            .header("key", api_key)
            .form(&[
                ("origin", origin.as_str()),
                ("destination", destination.as_str()),
                ("weight", weight.as_str()),
                ("courier", request.courier.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("shipping api request: {e}")))?
            .json()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("shipping api response: {e}")))?;

        parse_cost(&resp, service)
    }
}

/// Picks `cost[0].value` of the matching service out of
/// `rajaongkir.results[0].costs[]`.
pub fn parse_cost(resp: &Value, service: &str) -> AppResult<Decimal> {
    let costs = resp["rajaongkir"]["results"][0]["costs"]
        .as_array()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("shipping api returned no costs: {resp}")))?;

    let entry = costs
        .iter()
        .find(|c| c["service"].as_str().is_some_and(|s| s.eq_ignore_ascii_case(service)))
        .ok_or_else(|| AppError::BadRequest(format!("shipping service {service} is unavailable")))?;

    let value = &entry["cost"][0]["value"];
    let fee = value
        .as_i64()
        .map(Decimal::from)
        .or_else(|| value.as_f64().and_then(|v| Decimal::try_from(v).ok()))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("shipping api cost missing: {entry}")))?;
    Ok(fee)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "rajaongkir": {
                "status": { "code": 200 },
                "results": [{
                    "code": "jne",
                    "costs": [
                        { "service": "OKE", "cost": [{ "value": 18000, "etd": "2-3" }] },
                        { "service": "REG", "cost": [{ "value": 21000, "etd": "1-2" }] }
                    ]
                }]
            }
        })
    }

    #[test]
    fn picks_matching_service() {
        assert_eq!(parse_cost(&sample(), "REG").unwrap(), Decimal::from(21000));
        assert_eq!(parse_cost(&sample(), "oke").unwrap(), Decimal::from(18000));
    }

    #[test]
    fn unknown_service_is_bad_request() {
        let err = parse_cost(&sample(), "YES").unwrap_err();
        assert_eq!(err.code(), "bad-request");
    }

    #[test]
    fn malformed_body_is_internal() {
        let err = parse_cost(&json!({ "rajaongkir": { "results": [] } }), "REG").unwrap_err();
        assert_eq!(err.code(), "internal");
    }
}
