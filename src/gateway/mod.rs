/// HTTP webhook gateway.
///
/// Channels POST their webhook payloads here. The handler normalizes and
/// enqueues in-process, then answers immediately; all slow work happens in
/// the consumer workers. Unrecognized payloads are answered with success and
/// dropped so the channel never enters a redelivery storm.
use crate::adapter::{self, InboundKind};
use crate::bus::Topic;
use crate::errors::VeribotResult;
use crate::pipeline::PipelineContext;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
struct WebhookResponse {
    status: &'static str,
}

pub fn build_router(ctx: Arc<PipelineContext>) -> Router {
    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/health", get(health_handler))
        .with_state(ctx)
}

pub async fn serve(ctx: Arc<PipelineContext>) -> VeribotResult<()> {
    let addr = ctx.config.app.bind_addr.clone();
    let router = build_router(ctx);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| crate::errors::VeribotError::Config(format!("bind {addr}: {e}")))?;
    info!("gateway listening on {}", addr);
    axum::serve(listener, router)
        .await
        .map_err(|e| anyhow::anyhow!("gateway server failed: {e}"))?;
    Ok(())
}

async fn webhook_handler(
    State(ctx): State<Arc<PipelineContext>>,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<WebhookResponse>) {
    let accepted = (StatusCode::OK, Json(WebhookResponse { status: "ok" }));

    let Some(normalized) = adapter::normalize_any(&payload) else {
        debug!("dropping unrecognized webhook payload");
        return accepted;
    };

    let topic = match normalized.kind {
        InboundKind::Status => Topic::Receipts,
        _ => Topic::Messages,
    };
    if let Err(e) = ctx.queue.enqueue(topic, normalized.envelope).await {
        // The channel will redeliver; nothing was acked.
        warn!("failed to enqueue webhook payload: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(WebhookResponse { status: "error" }),
        );
    }
    accepted
}

async fn health_handler() -> (StatusCode, Json<WebhookResponse>) {
    (StatusCode::OK, Json(WebhookResponse { status: "ok" }))
}
