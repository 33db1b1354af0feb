use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::entities::forecast;
use crate::errors::ServiceError;
use crate::services::history::{Observation, OrderHistoryService};

/// Point prediction for one product over the requested window, paired
/// with the plain historical mean for context. The two can diverge
/// arbitrarily: `predicted` is the fitted trend extrapolated to the
/// window horizon and clamped at zero, `historical_avg` is the raw
/// unclamped mean of the observed quantities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProductForecast {
    #[schema(example = "p1")]
    pub product_id: String,
    #[schema(example = 12.0)]
    pub predicted: f64,
    #[schema(example = 6.0)]
    pub historical_avg: f64,
}

/// Forecast service: fits per-product demand trends over the order
/// history and persists the results.
#[derive(Clone)]
pub struct ForecastService {
    db: Arc<DatabaseConnection>,
}

impl ForecastService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Fit a per-product trend over the trailing window and predict
    /// demand at the window horizon. Returns one forecast per distinct
    /// product seen in the window, sorted by product id; an empty
    /// history yields an empty result, not an error.
    pub async fn forecast_products(
        &self,
        window_days: i64,
    ) -> Result<Vec<ProductForecast>, ServiceError> {
        let rows = OrderHistoryService::new(self.db.clone())
            .observations(window_days)
            .await?;
        info!(window_days, rows = rows.len(), "fitting demand forecasts");
        Ok(fit_forecasts(rows, window_days))
    }

    /// Sum of all per-product predictions for the same window. 0.0 when
    /// no products were observed.
    pub async fn forecast_total_sales(&self, window_days: i64) -> Result<f64, ServiceError> {
        let total = self
            .forecast_products(window_days)
            .await?
            .iter()
            .map(|f| f.predicted)
            .sum();
        Ok(total)
    }

    /// Recompute all forecasts and persist them: one `demand` row per
    /// product plus the aggregate `total_sales` row, committed as a
    /// single transaction. Existing rows are merged (only the columns
    /// this run produces are overwritten). Returns the number of rows
    /// written.
    pub async fn retrain_and_persist(&self, window_days: i64) -> Result<usize, ServiceError> {
        let products = self.forecast_products(window_days).await?;
        let total: f64 = products.iter().map(|f| f.predicted).sum();
        let generated_at = Utc::now();

        let txn = self.db.begin().await?;

        let mut written = 0usize;
        for item in &products {
            let row = forecast::ActiveModel {
                id: Set(item.product_id.clone()),
                kind: Set(forecast::KIND_DEMAND.to_string()),
                predicted: Set(item.predicted),
                historical_average: Set(Some(item.historical_avg)),
                generated_at: Set(generated_at),
            };
            forecast::Entity::insert(row)
                .on_conflict(upsert_on_id())
                .exec(&txn)
                .await?;
            written += 1;
        }

        let total_row = forecast::ActiveModel {
            id: Set(forecast::TOTAL_SALES_ID.to_string()),
            kind: Set(forecast::KIND_SALES.to_string()),
            predicted: Set(total),
            historical_average: Set(None),
            generated_at: Set(generated_at),
        };
        forecast::Entity::insert(total_row)
            .on_conflict(upsert_on_id())
            .exec(&txn)
            .await?;
        written += 1;

        txn.commit().await?;

        counter!("forecast_api.retrain.rows_written", written as u64);
        info!(window_days, rows = written, "forecasts persisted");
        Ok(written)
    }

    /// Fetch one persisted forecast document by product id, or the
    /// `total_sales` aggregate.
    pub async fn persisted_forecast(
        &self,
        id: &str,
    ) -> Result<Option<forecast::Model>, ServiceError> {
        Ok(forecast::Entity::find_by_id(id.to_string())
            .one(&*self.db)
            .await?)
    }
}

fn upsert_on_id() -> OnConflict {
    OnConflict::column(forecast::Column::Id)
        .update_columns([
            forecast::Column::Kind,
            forecast::Column::Predicted,
            forecast::Column::HistoricalAverage,
            forecast::Column::GeneratedAt,
        ])
        .to_owned()
}

/// Group observations by product, fit a least-squares line of quantity
/// against days elapsed since the product's first observation, and
/// evaluate it at the full window horizon. The horizon is always the
/// requested window, not the product's own observed span, so products
/// with short histories extrapolate well past their data.
fn fit_forecasts(observations: Vec<Observation>, window_days: i64) -> Vec<ProductForecast> {
    let mut groups: BTreeMap<String, Vec<Observation>> = BTreeMap::new();
    for obs in observations {
        groups.entry(obs.product_id.clone()).or_default().push(obs);
    }

    let mut results = Vec::with_capacity(groups.len());
    for (product_id, mut group) in groups {
        group.sort_by_key(|o| o.date);
        let start0 = group[0].date;

        // Whole elapsed days only; fractional time-of-day is truncated.
        let xs: Vec<f64> = group
            .iter()
            .map(|o| (o.date - start0).num_days() as f64)
            .collect();
        let ys: Vec<f64> = group.iter().map(|o| o.quantity).collect();

        let (intercept, slope) = fit_line(&xs, &ys);

        let predicted = (intercept + slope * window_days as f64).max(0.0);
        let historical_avg = ys.iter().sum::<f64>() / ys.len() as f64;

        results.push(ProductForecast {
            product_id,
            predicted,
            historical_avg,
        });
    }
    results
}

/// Ordinary least squares for a single feature. Returns
/// `(intercept, slope)`. Zero variance in x (a single point, or every
/// observation on the same day) degrades to a flat fit through the mean.
fn fit_line(xs: &[f64], ys: &[f64]) -> (f64, f64) {
    debug_assert_eq!(xs.len(), ys.len());
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let var: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
    if var == 0.0 {
        return (mean_y, 0.0);
    }

    let cov: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();
    let slope = cov / var;
    (mean_y - slope * mean_x, slope)
}
