use axum::{http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

pub const LIVENESS_BODY: &str = "Discord bot is running!";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub checked_at: String,
}

pub fn router() -> Router {
    Router::new().route("/", get(liveness)).route("/health", get(health))
}

pub async fn spawn(bind_address: &str, port: u16) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "liveness endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router()).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "liveness endpoint terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn liveness() -> &'static str {
    LIVENESS_BODY
}

pub async fn health() -> (StatusCode, Json<HealthResponse>) {
    let payload = HealthResponse {
        status: "ready",
        service: "ticketdesk-server",
        checked_at: Utc::now().to_rfc3339(),
    };
    (StatusCode::OK, Json(payload))
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::health::{router, LIVENESS_BODY};

    #[tokio::test]
    async fn root_answers_plain_liveness_text() {
        let response = router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        assert_eq!(&body[..], LIVENESS_BODY.as_bytes());
    }

    #[tokio::test]
    async fn health_reports_ready_json() {
        let response = router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let payload: serde_json::Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(payload["status"], "ready");
        assert_eq!(payload["service"], "ticketdesk-server");
        assert!(payload["checked_at"].as_str().is_some_and(|stamp| !stamp.is_empty()));
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() {
        let response = router()
            .oneshot(Request::builder().uri("/tickets").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
