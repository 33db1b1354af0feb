use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{DateTime, Duration, Utc};
use forecast_api::{
    config::AppConfig,
    db,
    entities::{order, order_item},
    AppState,
};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

/// Helper harness backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // A single connection keeps every query on the same in-memory database
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool).await.expect("migrations failed");

        let state = AppState {
            db: Arc::new(pool),
            config: cfg,
        };

        let router = Router::new()
            .nest("/api/v1", forecast_api::api_v1_routes())
            .with_state(state.clone());

        Self { router, state }
    }

    /// Insert one order with the given line items. `date` may be `None`
    /// to model an order record missing its date.
    #[allow(dead_code)]
    pub async fn seed_order(
        &self,
        date: Option<DateTime<Utc>>,
        items: &[(&str, Option<f64>)],
    ) -> Uuid {
        let order_id = Uuid::new_v4();
        order::ActiveModel {
            id: Set(order_id),
            order_number: Set(format!("ORD-{}", &order_id.to_string()[..8])),
            order_date: Set(date),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("insert order");

        for (product_id, quantity) in items {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product_id.to_string()),
                quantity: Set(*quantity),
                created_at: Set(Utc::now()),
            }
            .insert(&*self.state.db)
            .await
            .expect("insert order item");
        }

        order_id
    }

    /// A timestamp `days` before now.
    #[allow(dead_code)]
    pub fn days_ago(days: i64) -> DateTime<Utc> {
        Utc::now() - Duration::days(days)
    }

    #[allow(dead_code)]
    pub async fn request(&self, method: Method, uri: &str, body: Option<&str>) -> Response {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(json) => builder.body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("request failed")
    }

    /// Issue a request and decode the response body as JSON.
    #[allow(dead_code)]
    pub async fn request_json(
        &self,
        method: Method,
        uri: &str,
        body: Option<&str>,
    ) -> (StatusCode, Value) {
        let response = self.request(method, uri, body).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read response body");
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }
}
