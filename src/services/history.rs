use std::sync::Arc;

use chrono::{Duration, NaiveDateTime, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tracing::debug;

use crate::entities::{order, order_item};
use crate::errors::ServiceError;

/// One (product, quantity, date) triple derived from a single order
/// line item. Lives only for the duration of one pipeline invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub product_id: String,
    pub quantity: f64,
    pub date: NaiveDateTime,
}

/// Extracts per-line-item observations from the order history.
#[derive(Clone)]
pub struct OrderHistoryService {
    db: Arc<DatabaseConnection>,
}

impl OrderHistoryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Flatten the line items of every order dated within the trailing
    /// window into one observation each.
    ///
    /// The query carries a lower bound only, so orders dated after "now"
    /// (clock skew, fixtures) are included, matching the source system.
    /// Orders without a date are skipped entirely, and a line item
    /// without a quantity contributes 0.0. Timestamps are made
    /// timezone-naive here; the day-count arithmetic downstream operates
    /// on naive values.
    pub async fn observations(&self, window_days: i64) -> Result<Vec<Observation>, ServiceError> {
        // Handlers cap the window well below chrono's limits, but the
        // arithmetic must not assert if a caller passes one through raw.
        let start = Duration::try_days(window_days)
            .and_then(|delta| Utc::now().checked_sub_signed(delta))
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "window of {} days is out of range",
                    window_days
                ))
            })?;

        let orders = order::Entity::find()
            .filter(order::Column::OrderDate.gte(start))
            .find_with_related(order_item::Entity)
            .all(&*self.db)
            .await?;

        let mut rows = Vec::new();
        for (order, items) in orders {
            let Some(order_date) = order.order_date else {
                continue;
            };
            let naive = order_date.naive_utc();
            for item in items {
                rows.push(Observation {
                    product_id: item.product_id,
                    quantity: item.quantity.unwrap_or(0.0),
                    date: naive,
                });
            }
        }

        debug!(window_days, rows = rows.len(), "extracted order history");
        Ok(rows)
    }
}
