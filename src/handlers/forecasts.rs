use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    config::MAX_WINDOW_DAYS,
    entities::forecast,
    errors::ServiceError,
    services::forecasting::{ForecastService, ProductForecast},
    AppState,
};

/// Build the forecasts Router scoped under `/api/v1/forecasts`.
pub fn forecast_routes() -> Router<AppState> {
    Router::new()
        .route("/demand", post(predict_demand))
        .route("/sales", post(predict_sales))
        .route("/retrain", post(retrain_forecasts))
}

/// Optional request body selecting the trailing window.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct WindowRequest {
    /// Trailing window in days; defaults to the configured window
    #[schema(example = 7)]
    pub window: Option<i64>,
}

/// Aggregate sales forecast
#[derive(Debug, Serialize, ToSchema)]
pub struct TotalSalesResponse {
    /// Always the literal `total_sales`
    #[schema(example = "total_sales")]
    pub id: String,
    #[schema(example = 42.5)]
    pub predicted: f64,
    /// Always null; the aggregate has no per-product average
    pub historical_average: Option<f64>,
}

/// Resolve the window from an optional JSON body. A missing or
/// unparseable body is treated as empty configuration and falls back to
/// the default; a well-formed but out-of-range window is rejected.
fn window_from_body(body: &Bytes, default_days: i64) -> Result<i64, ServiceError> {
    let requested = serde_json::from_slice::<WindowRequest>(body)
        .ok()
        .and_then(|req| req.window)
        .unwrap_or(default_days);

    if !(1..=MAX_WINDOW_DAYS).contains(&requested) {
        return Err(ServiceError::ValidationError(format!(
            "window must be between 1 and {} days",
            MAX_WINDOW_DAYS
        )));
    }
    Ok(requested)
}

/// Per-product demand forecasts, computed fresh from the order history
#[utoipa::path(
    post,
    path = "/api/v1/forecasts/demand",
    request_body = WindowRequest,
    responses(
        (status = 200, description = "Demand forecasts computed successfully", body = Vec<ProductForecast>),
        (status = 400, description = "Invalid window", body = crate::errors::ErrorResponse)
    ),
    tag = "Forecasts"
)]
pub async fn predict_demand(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Vec<ProductForecast>>, ServiceError> {
    let window = window_from_body(&body, state.config.default_window_days)?;
    let service = ForecastService::new(state.db.clone());
    let forecasts = service.forecast_products(window).await?;

    Ok(Json(forecasts))
}

/// Total sales forecast over the same window
#[utoipa::path(
    post,
    path = "/api/v1/forecasts/sales",
    request_body = WindowRequest,
    responses(
        (status = 200, description = "Sales forecast computed successfully", body = TotalSalesResponse),
        (status = 400, description = "Invalid window", body = crate::errors::ErrorResponse)
    ),
    tag = "Forecasts"
)]
pub async fn predict_sales(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TotalSalesResponse>, ServiceError> {
    let window = window_from_body(&body, state.config.default_window_days)?;
    let service = ForecastService::new(state.db.clone());
    let predicted = service.forecast_total_sales(window).await?;

    Ok(Json(TotalSalesResponse {
        id: forecast::TOTAL_SALES_ID.to_string(),
        predicted,
        historical_average: None,
    }))
}

/// Retrain with the default window and persist one forecast row per
/// product plus the `total_sales` aggregate. Intended to be invoked by
/// an external scheduler.
#[utoipa::path(
    post,
    path = "/api/v1/forecasts/retrain",
    responses(
        (status = 200, description = "Forecasts recomputed and persisted")
    ),
    tag = "Forecasts"
)]
pub async fn retrain_forecasts(
    State(state): State<AppState>,
) -> Result<(StatusCode, &'static str), ServiceError> {
    let service = ForecastService::new(state.db.clone());
    service
        .retrain_and_persist(state.config.default_window_days)
        .await?;

    Ok((StatusCode::OK, "Forecasts updated"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_body_falls_back_to_default() {
        let window = window_from_body(&Bytes::new(), 28).unwrap();
        assert_eq!(window, 28);
    }

    #[test]
    fn malformed_body_falls_back_to_default() {
        let window = window_from_body(&Bytes::from_static(b"{not json"), 28).unwrap();
        assert_eq!(window, 28);

        let wrong_type = window_from_body(&Bytes::from_static(b"{\"window\": \"seven\"}"), 28);
        assert_eq!(wrong_type.unwrap(), 28);
    }

    #[test]
    fn explicit_window_wins_over_default() {
        let window = window_from_body(&Bytes::from_static(b"{\"window\": 7}"), 28).unwrap();
        assert_eq!(window, 7);
    }

    #[test]
    fn non_positive_window_is_rejected() {
        assert!(window_from_body(&Bytes::from_static(b"{\"window\": 0}"), 28).is_err());
        assert!(window_from_body(&Bytes::from_static(b"{\"window\": -3}"), 28).is_err());
    }

    #[test]
    fn absurdly_large_window_is_rejected() {
        // Values past the cap would otherwise reach chrono's day
        // arithmetic, which asserts on out-of-range durations
        let body = Bytes::from_static(b"{\"window\": 200000000000000}");
        assert!(window_from_body(&body, 28).is_err());

        let at_cap = format!("{{\"window\": {}}}", MAX_WINDOW_DAYS);
        assert_eq!(
            window_from_body(&Bytes::from(at_cap), 28).unwrap(),
            MAX_WINDOW_DAYS
        );
    }
}
