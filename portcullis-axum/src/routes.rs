use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use chrono::Duration;

use portcullis::{ActionKind, Portcullis, SecurityDashboard, SubjectKey};
use portcullis_core::repositories::RepositoryProvider;

use crate::error::Result;
use crate::types::{
    CompleteRequest, DashboardQuery, EvaluateRequest, HealthResponse, MessageResponse,
    ResetRequest, VerdictResponse,
};

/// Build the facade router over a shared engine.
pub fn create_router<R: RepositoryProvider>(engine: Arc<Portcullis<R>>) -> Router {
    Router::new()
        .route("/evaluate", post(evaluate::<R>))
        .route("/complete", post(complete::<R>))
        .route("/reset", post(reset::<R>))
        .route("/dashboard", get(dashboard::<R>))
        .route("/health", get(health::<R>))
        .with_state(engine)
}

async fn evaluate<R: RepositoryProvider>(
    State(engine): State<Arc<Portcullis<R>>>,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<VerdictResponse>> {
    let verdict = engine
        .evaluate(
            &ActionKind::new(&request.action),
            &SubjectKey::new(&request.subject),
        )
        .await?;
    Ok(Json(verdict.into()))
}

async fn complete<R: RepositoryProvider>(
    State(engine): State<Arc<Portcullis<R>>>,
    Json(request): Json<CompleteRequest>,
) -> Result<Json<MessageResponse>> {
    let action = ActionKind::new(&request.action);
    let subject = SubjectKey::new(&request.subject);
    engine
        .complete(&action, &subject, request.into_outcome())
        .await?;
    Ok(Json(MessageResponse {
        message: "Outcome recorded".to_string(),
    }))
}

async fn reset<R: RepositoryProvider>(
    State(engine): State<Arc<Portcullis<R>>>,
    Json(request): Json<ResetRequest>,
) -> Result<Json<MessageResponse>> {
    engine
        .reset(
            &ActionKind::new(&request.action),
            &SubjectKey::new(&request.subject),
        )
        .await?;
    Ok(Json(MessageResponse {
        message: "Limiter state cleared".to_string(),
    }))
}

async fn dashboard<R: RepositoryProvider>(
    State(engine): State<Arc<Portcullis<R>>>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<SecurityDashboard>> {
    let window = query.hours.map(Duration::hours);
    let dashboard = engine.dashboard(window).await?;
    Ok(Json(dashboard))
}

async fn health<R: RepositoryProvider>(
    State(engine): State<Arc<Portcullis<R>>>,
) -> Result<Json<HealthResponse>> {
    engine.health_check().await?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use portcullis::PortcullisBuilder;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn router() -> Router {
        let engine = PortcullisBuilder::new().with_memory().build().unwrap();
        create_router(Arc::new(engine))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_evaluate_allows_fresh_subject() {
        let response = router()
            .oneshot(post_json(
                "/evaluate",
                json!({"action": "login", "subject": "a@x.com"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["allow"], true);
        assert_eq!(body["remaining"], 5);
        assert_eq!(body["risk_level"], "low");
    }

    #[tokio::test]
    async fn test_unknown_action_is_not_found() {
        let response = router()
            .oneshot(post_json(
                "/evaluate",
                json!({"action": "sms_otp", "subject": "a@x.com"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_subject_is_unprocessable() {
        let response = router()
            .oneshot(post_json(
                "/evaluate",
                json!({"action": "login", "subject": "not an email@"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_blocked_verdict_is_a_successful_response() {
        let router = router();

        for _ in 0..5 {
            let response = router
                .clone()
                .oneshot(post_json(
                    "/complete",
                    json!({
                        "action": "login",
                        "subject": "a@x.com",
                        "success": false,
                        "error_detail": "invalid credentials"
                    }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = router
            .oneshot(post_json(
                "/evaluate",
                json!({"action": "login", "subject": "a@x.com"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["allow"], false);
        assert!(body["retry_after_ms"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_reset_clears_limiter_state() {
        let router = router();

        for _ in 0..5 {
            router
                .clone()
                .oneshot(post_json(
                    "/complete",
                    json!({"action": "login", "subject": "a@x.com", "success": false}),
                ))
                .await
                .unwrap();
        }

        let response = router
            .clone()
            .oneshot(post_json(
                "/reset",
                json!({"action": "login", "subject": "a@x.com"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(post_json(
                "/evaluate",
                json!({"action": "login", "subject": "a@x.com"}),
            ))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["allow"], true);
        assert_eq!(body["remaining"], 5);
    }

    #[tokio::test]
    async fn test_dashboard_and_health() {
        let router = router();

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/dashboard?hours=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["total_events"], 0);

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
    }
}
