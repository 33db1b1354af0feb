use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::errors::ErrorResponse;
use crate::handlers::forecasts::{TotalSalesResponse, WindowRequest};
use crate::services::forecasting::ProductForecast;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Forecast API",
        version = "0.1.0",
        description = r#"
Demand and sales forecasting over historical order records.

Each request refits a per-product linear trend on the line items of the
orders dated within the trailing window and extrapolates it to the
window horizon. The retrain endpoint persists the same computation to
the `forecasts` table for later retrieval, one row per product plus a
`total_sales` aggregate.
"#,
        license(name = "MIT")
    ),
    paths(
        crate::handlers::forecasts::predict_demand,
        crate::handlers::forecasts::predict_sales,
        crate::handlers::forecasts::retrain_forecasts,
    ),
    components(schemas(
        WindowRequest,
        TotalSalesResponse,
        ProductForecast,
        ErrorResponse,
    )),
    tags(
        (name = "Forecasts", description = "Demand and sales forecasting endpoints")
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
