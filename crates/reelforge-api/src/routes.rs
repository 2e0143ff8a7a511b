//! API routes.

use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::credits::{credit_history, get_balance};
use crate::handlers::events::events;
use crate::handlers::health::{health, ready};
use crate::handlers::jobs::{cancel_job, estimate, get_job, list_jobs, submit_job};
use crate::handlers::webhooks::payment_webhook;
use crate::metrics::metrics_middleware;
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let api_routes = Router::new()
        .route("/jobs", post(submit_job).get(list_jobs))
        .route("/jobs/estimate", post(estimate))
        .route("/jobs/:job_id", get(get_job))
        .route("/jobs/:job_id/cancel", post(cancel_job))
        .route("/credits", get(get_balance))
        .route("/credits/history", get(credit_history))
        .route("/webhooks/payment", post(payment_webhook))
        .route("/events", get(events));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use reelforge_models::{JobOutput, JobStatus, TransactionType, WorkerToken};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::auth::USER_ID_HEADER;
    use crate::config::ApiConfig;

    async fn seeded_state(user_id: &str, balance: u32) -> AppState {
        let state = AppState::new(ApiConfig::default());
        if balance > 0 {
            state
                .ledger
                .credit(
                    user_id,
                    balance,
                    TransactionType::Bonus,
                    "Test grant",
                    None,
                    None,
                )
                .await
                .unwrap();
        }
        state
    }

    fn post_json(uri: &str, user: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header(USER_ID_HEADER, user)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str, user: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(USER_ID_HEADER, user)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_image_submission_lifecycle() {
        let state = seeded_state("user-1", 50).await;
        let app = create_router(state.clone(), None);

        // Submit an image job: 6 credits debited, job pending.
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/jobs",
                "user-1",
                json!({"kind": "image", "prompt": "city at night"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["cost"], 6);
        assert_eq!(body["balance"], 44);
        assert_eq!(body["job"]["status"], "pending");
        let job_id = body["job"]["id"].as_str().unwrap().to_string();

        // Worker completes the job.
        let id = reelforge_models::JobId::from_string(job_id.clone());
        let token = WorkerToken::new();
        state.store.claim(&id, &token).await.unwrap();
        state
            .store
            .complete(
                &id,
                JobOutput::Image {
                    urls: vec!["https://cdn.example/img.png".into()],
                },
                &token,
            )
            .await
            .unwrap();

        // Query reflects the terminal snapshot.
        let response = app
            .oneshot(get_req(&format!("/api/jobs/{job_id}"), "user-1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "completed");
        assert_eq!(body["progress"], 100);
    }

    #[tokio::test]
    async fn test_insufficient_balance_creates_no_job() {
        let state = seeded_state("user-1", 2).await;
        let app = create_router(state.clone(), None);

        let response = app
            .oneshot(post_json(
                "/api/jobs",
                "user-1",
                json!({"kind": "image", "prompt": "city at night"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        assert!(state.store.list_for_user("user-1").await.is_empty());
        // Balance untouched.
        assert_eq!(state.ledger.account("user-1").await.unwrap().balance, 2);
    }

    #[tokio::test]
    async fn test_invalid_payload_rejected_before_debit() {
        let state = seeded_state("user-1", 50).await;
        let app = create_router(state.clone(), None);

        let response = app
            .oneshot(post_json(
                "/api/jobs",
                "user-1",
                json!({"kind": "image", "prompt": "   "}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.ledger.account("user-1").await.unwrap().balance, 50);
    }

    #[tokio::test]
    async fn test_estimate_does_not_mutate_ledger() {
        let state = seeded_state("user-1", 50).await;
        let app = create_router(state.clone(), None);

        let response = app
            .oneshot(post_json(
                "/api/jobs/estimate",
                "user-1",
                json!({"kind": "image", "prompt": "city at night", "count": 2}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["cost"], 12);
        assert_eq!(state.ledger.account("user-1").await.unwrap().balance, 50);
        assert!(state.ledger.history("user-1", 10).await.len() == 1); // just the grant
    }

    #[tokio::test]
    async fn test_foreign_job_reads_as_not_found() {
        let state = seeded_state("user-1", 50).await;
        let app = create_router(state.clone(), None);

        let job = state
            .store
            .create(
                "user-1",
                None,
                serde_json::from_value(json!({"kind": "image", "prompt": "x"})).unwrap(),
            )
            .await;

        let response = app
            .oneshot(get_req(&format!("/api/jobs/{}", job.id), "user-2"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cancel_terminal_job_conflicts() {
        let state = seeded_state("user-1", 50).await;
        let app = create_router(state.clone(), None);

        let job = state
            .store
            .create(
                "user-1",
                None,
                serde_json::from_value(json!({"kind": "image", "prompt": "x"})).unwrap(),
            )
            .await;
        let token = WorkerToken::new();
        state.store.claim(&job.id, &token).await.unwrap();
        state
            .store
            .complete(&job.id, JobOutput::Image { urls: vec![] }, &token)
            .await
            .unwrap();

        let response = app
            .oneshot(post_json(
                &format!("/api/jobs/{}/cancel", job.id),
                "user-1",
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            state.store.get(&job.id).await.unwrap().status,
            JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_missing_identity_header_unauthorized() {
        let state = seeded_state("user-1", 0).await;
        let app = create_router(state, None);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/credits")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_balance_defaults_to_zero_for_new_users() {
        let state = seeded_state("user-1", 0).await;
        let app = create_router(state, None);

        let response = app.oneshot(get_req("/api/credits", "user-1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["balance"], 0);
    }

    #[tokio::test]
    async fn test_payment_webhook_is_idempotent_per_order() {
        let state = seeded_state("user-1", 0).await;
        let app = create_router(state.clone(), None);

        let event = json!({
            "type": "purchase",
            "user_id": "user-1",
            "credits": 100,
            "order_id": "order-42"
        });

        let response = app
            .clone()
            .oneshot(post_json("/api/webhooks/payment", "gateway", event.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["applied"], true);
        assert_eq!(body["balance"], 100);

        // Redelivery of the same order is a no-op.
        let response = app
            .oneshot(post_json("/api/webhooks/payment", "gateway", event))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["applied"], false);
        assert_eq!(state.ledger.account("user-1").await.unwrap().balance, 100);
    }

    #[tokio::test]
    async fn test_refund_webhook_records_provider_order_id() {
        let state = seeded_state("user-1", 0).await;
        let app = create_router(state.clone(), None);

        let purchase = json!({
            "type": "purchase",
            "user_id": "user-1",
            "credits": 100,
            "order_id": "order-42"
        });
        let refund = json!({
            "type": "refund",
            "user_id": "user-1",
            "credits": 100,
            "order_id": "order-42"
        });

        let response = app
            .clone()
            .oneshot(post_json("/api/webhooks/payment", "gateway", purchase))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // A refund for the same order applies despite the shared order id.
        let response = app
            .clone()
            .oneshot(post_json("/api/webhooks/payment", "gateway", refund.clone()))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["applied"], true);

        // Both transactions carry the provider's order id for correlation.
        let history = state.ledger.history("user-1", 10).await;
        assert_eq!(history.len(), 2);
        for tx in &history {
            assert_eq!(tx.order_id.as_deref(), Some("order-42"));
        }

        // The refund itself still dedups on redelivery.
        let response = app
            .oneshot(post_json("/api/webhooks/payment", "gateway", refund))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["applied"], false);
        assert_eq!(state.ledger.account("user-1").await.unwrap().balance, 200);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let state = seeded_state("user-1", 0).await;
        let app = create_router(state, None);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
    }
}
