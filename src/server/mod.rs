//! HTTP surface: Axum server in front of the pod engine.
//!
//! Accepts opportunities, exposes registry/predictor state and the admin
//! source removal and enable/disable toggle. CORS enabled for local tooling.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

pub use routes::{AppState, ServerState};

/// Bind `port` and serve in a background task.
pub async fn spawn_server(state: AppState, port: u16) -> Result<JoinHandle<()>> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP port {port}"))?;
    info!(port, "HTTP server listening on http://localhost:{port}");

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "HTTP server error");
        }
    }))
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/pods", post(routes::create_pod).get(routes::recent_pods))
        .route("/api/federated", post(routes::create_federated))
        .route("/api/sources", get(routes::list_sources))
        .route("/api/sources/:name", delete(routes::remove_source))
        .route("/api/sources/:name/enabled", put(routes::set_source_enabled))
        .route("/api/predictor", get(routes::predictor_stats))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::NullAdvisor;
    use crate::auction::Auctioneer;
    use crate::config::{PredictorConfig, RevenueTargets};
    use crate::dispatch::tests::{scripted, Reply};
    use crate::dispatch::BidDispatcher;
    use crate::engine::creative::tests::StaticFetcher;
    use crate::engine::pod::PodExecutor;
    use crate::engine::sink::{MemorySink, OutcomeSink};
    use crate::engine::PodEngine;
    use crate::learning::LearningLoop;
    use crate::planner::{PlannerConfig, StrategyPlanner};
    use crate::predictor::FillRatePredictor;
    use crate::registry::tests::source;
    use crate::registry::{DemandRegistry, InMemoryRegistry};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state(sources: Vec<crate::registry::DemandSource>) -> AppState {
        let registry: Arc<dyn DemandRegistry> = Arc::new(InMemoryRegistry::new(sources));
        let predictor = Arc::new(FillRatePredictor::new(PredictorConfig::default()));

        let mut dispatcher = BidDispatcher::new();
        dispatcher.register(scripted(
            "northwind",
            5,
            Reply::Json(r#"{"price": 25.0, "creative_ref": "<VAST/>", "advertiser_domain": "n.example"}"#),
        ));

        let planner = StrategyPlanner::new(
            Arc::new(NullAdvisor),
            registry.clone(),
            predictor.clone(),
            PlannerConfig::default(),
        );
        let executor = PodExecutor::new(
            Arc::new(dispatcher),
            Auctioneer::default(),
            registry.clone(),
            LearningLoop::new(registry.clone(), predictor.clone()),
            Arc::new(StaticFetcher(None)),
        );
        let recent = Arc::new(MemorySink::new(10));
        let engine = PodEngine::new(planner, executor, registry, predictor, RevenueTargets::default())
            .with_sink(recent.clone() as Arc<dyn OutcomeSink>);

        Arc::new(ServerState::new(Arc::new(engine), recent))
    }

    fn opportunity_json() -> String {
        r#"{"position": "preroll", "available_secs": 30, "content_category": "news", "device": "desktop"}"#
            .to_string()
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = build_router(test_state(vec![]));
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_pod() {
        let state = test_state(vec![source("northwind", 20.0, 0.9)]);
        let app = build_router(state.clone());
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/pods")
                    .header("content-type", "application/json")
                    .body(Body::from(opportunity_json()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["origin"], "fallback");
        assert_eq!(json["slots_filled"], 1);
        assert_eq!(state.recent.len(), 1);
    }

    #[tokio::test]
    async fn test_create_pod_without_sources_is_unavailable() {
        let app = build_router(test_state(vec![]));
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/pods")
                    .header("content-type", "application/json")
                    .body(Body::from(opportunity_json()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_federated_without_exchanges_is_unavailable() {
        let app = build_router(test_state(vec![source("northwind", 20.0, 0.9)]));
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/federated")
                    .header("content-type", "application/json")
                    .body(Body::from(opportunity_json()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_sources_list_and_remove() {
        let state = test_state(vec![source("northwind", 20.0, 0.9), source("bluewave", 8.0, 0.5)]);

        let resp = build_router(state.clone())
            .oneshot(Request::builder().uri("/api/sources").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json.as_array().unwrap().len(), 2);

        let resp = build_router(state.clone())
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/sources/bluewave")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = build_router(state.clone())
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/sources/bluewave")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(!state.engine.registry().contains("bluewave"));
    }

    fn toggle(name: &str, enabled: bool) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri(format!("/api/sources/{name}/enabled"))
            .header("content-type", "application/json")
            .body(Body::from(format!(r#"{{"enabled": {enabled}}}"#)))
            .unwrap()
    }

    #[tokio::test]
    async fn test_disabled_source_leaves_rotation() {
        let state = test_state(vec![source("northwind", 20.0, 0.9)]);

        let resp = build_router(state.clone())
            .oneshot(toggle("northwind", false))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(state.engine.registry().enabled().is_empty());

        // Nothing left to call: pods are refused until it is re-enabled.
        let resp = build_router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/pods")
                    .header("content-type", "application/json")
                    .body(Body::from(opportunity_json()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let resp = build_router(state.clone())
            .oneshot(toggle("northwind", true))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(state.engine.registry().enabled().len(), 1);

        let resp = build_router(state.clone())
            .oneshot(toggle("ghost", true))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_predictor_stats() {
        let app = build_router(test_state(vec![]));
        let resp = app
            .oneshot(Request::builder().uri("/api/predictor").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["records"], 0);
        assert_eq!(json["capacity"], 10_000);
    }
}
