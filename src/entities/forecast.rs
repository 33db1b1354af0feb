use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Forecast kind stored in the `kind` column.
pub const KIND_DEMAND: &str = "demand";
pub const KIND_SALES: &str = "sales";

/// Reserved document id for the aggregate sales forecast.
pub const TOTAL_SALES_ID: &str = "total_sales";

/// One persisted forecast document, keyed by product id or the literal
/// `total_sales`. Rewritten (merged) on every retrain run.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "forecasts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub kind: String,

    #[sea_orm(column_type = "Double")]
    pub predicted: f64,

    /// NULL for the `total_sales` document.
    #[sea_orm(column_type = "Double", nullable)]
    pub historical_average: Option<f64>,

    pub generated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
