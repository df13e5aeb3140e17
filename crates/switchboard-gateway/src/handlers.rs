//! HTTP request handlers for the gateway surface.

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::sse::{Event, Sse};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;

use switchboard_types::{ErrorKind, ToolCallRequest, ToolCallResult, ToolSummary};

use crate::Gateway;

/// GET /health — simple HTTP health check.
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /api/status — registry snapshot with derived connected count.
pub async fn status(State(gateway): State<Arc<Gateway>>) -> impl IntoResponse {
    Json(gateway.status().await)
}

/// Query parameters for tool listing.
#[derive(Deserialize, Default)]
pub struct ToolsQuery {
    provider: Option<String>,
}

/// GET /api/tools — flattened tool summaries, or one provider's full
/// descriptors (including input schemas) when `?provider=` is given.
pub async fn tools(
    State(gateway): State<Arc<Gateway>>,
    Query(query): Query<ToolsQuery>,
) -> impl IntoResponse {
    match query.provider {
        Some(provider_id) => match gateway.tools(Some(&provider_id)).await {
            Ok(tools) => {
                let descriptors: Vec<_> = tools.into_iter().map(|t| t.descriptor).collect();
                (
                    StatusCode::OK,
                    Json(json!({
                        "provider": provider_id,
                        "tools": descriptors,
                    })),
                )
            }
            Err(e) => (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "error": e.to_string(),
                })),
            ),
        },
        None => {
            // Flattened listing carries summaries only; fetch a single
            // provider for full schemas.
            let tools = gateway
                .tools(None)
                .await
                .unwrap_or_default()
                .into_iter()
                .map(|t| ToolSummary {
                    provider_id: t.provider_id,
                    name: t.descriptor.name,
                    description: t.descriptor.description,
                })
                .collect::<Vec<_>>();
            (StatusCode::OK, Json(json!({ "tools": tools })))
        }
    }
}

/// POST /api/call — dispatch one tool call.
///
/// The body is always the full result envelope; the HTTP status mirrors
/// the error kind so plain HTTP clients can branch without parsing it.
pub async fn call(
    State(gateway): State<Arc<Gateway>>,
    Json(request): Json<ToolCallRequest>,
) -> impl IntoResponse {
    let result = gateway.call(request).await;
    (status_for(&result), Json(result))
}

fn status_for(result: &ToolCallResult) -> StatusCode {
    match result.error_kind() {
        None => StatusCode::OK,
        Some(ErrorKind::ProviderNotFound | ErrorKind::ToolNotFound) => StatusCode::NOT_FOUND,
        Some(ErrorKind::ProviderUnavailable) => StatusCode::SERVICE_UNAVAILABLE,
        Some(ErrorKind::ProviderBusy) => StatusCode::TOO_MANY_REQUESTS,
        Some(ErrorKind::InvalidParams) => StatusCode::BAD_REQUEST,
        Some(ErrorKind::Timeout) => StatusCode::GATEWAY_TIMEOUT,
        Some(ErrorKind::ProviderError) => StatusCode::BAD_GATEWAY,
        Some(ErrorKind::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// GET /api/stream — server-sent events: one `connection` snapshot, then
/// periodic `heartbeat`s. Strictly server-to-client; closing the response
/// ends the session without touching any in-flight call.
pub async fn stream(
    State(gateway): State<Arc<Gateway>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session = gateway.open_session().await;
    let events = session.into_stream().map(|event| {
        Ok(Event::default()
            .json_data(&event)
            .unwrap_or_else(|_| Event::default().data("{}")))
    });
    Sse::new(events)
}
