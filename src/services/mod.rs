pub mod forecasting;
pub mod history;
