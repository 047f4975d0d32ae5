//! Router for the chat relay API

use std::convert::Infallible;
use std::sync::{Arc, RwLock};

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response, sse::Event, sse::Sse},
    routing::post,
};
use http::{HeaderValue, header};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{context, public};
use crate::api::identity::ClientId;
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::core::AppConfig;
use crate::openai::{DONE, completion_stream, error_event};

type SharedState = Arc<RwLock<AppState>>;

/// Relay a chat message to the completion API and stream the response
/// back as server-sent events
async fn chat_handler(
    State(state): State<SharedState>,
    ClientId(client_id): ClientId,
    axum::Json(payload): axum::Json<public::ChatRequest>,
) -> Result<Response, ApiError> {
    // Rate limit before any other work. Rejected attempts do not count
    // against the caller's budget.
    let allowed = {
        let shared_state = state.read().expect("Unable to read shared state");
        shared_state.limiter.try_acquire(&client_id)
    };
    if !allowed {
        tracing::debug!("Rate limited chat request from {}", client_id);
        return Err(ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests. Try again in a few seconds.",
        ));
    }

    let Some(message) = payload.message.as_deref().filter(|m| !m.is_empty()) else {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Missing required field: message",
        ));
    };

    let (api_hostname, api_key, model, system_prompt) = {
        let shared_state = state.read().expect("Unable to read shared state");
        let AppConfig {
            llm_api_hostname,
            llm_api_key,
            llm_model,
            system_prompt,
        } = &shared_state.config;
        (
            llm_api_hostname.clone(),
            llm_api_key.clone(),
            llm_model.clone(),
            system_prompt.clone(),
        )
    };
    let Some(api_key) = api_key else {
        return Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Assistant is not configured",
        ));
    };

    let messages = context::build_messages(&system_prompt, &payload.history, message);
    let temperature = payload.temperature;
    let max_tokens = payload.max_tokens;

    let (tx, rx) = mpsc::unbounded_channel::<String>();

    // Run the relay on its own task and bridge it to the response body
    // through the channel. Dropping the body (client disconnect) closes
    // the receiver, which stops the relay's upstream reads.
    tokio::spawn(async move {
        let result = completion_stream(
            tx.clone(),
            &messages,
            temperature,
            max_tokens,
            &api_hostname,
            &api_key,
            &model,
        )
        .await;

        // The stream is already open, so failures are reported in-band
        // followed by the terminal sentinel
        if let Err(e) = result {
            tracing::error!("Chat relay error: {}. Root cause: {}", e, e.root_cause());
            let _ = tx.send(error_event(&e.to_string()));
            let _ = tx.send(DONE.to_string());
        }
    });

    let sse_stream = UnboundedReceiverStream::new(rx)
        .map(|chunk| Ok::<Event, Infallible>(Event::default().data(chunk)));

    let mut resp = Sse::new(sse_stream).into_response();
    let headers = resp.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream; charset=utf-8"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-transform"),
    );
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );

    Ok(resp)
}

/// Reject other methods on the chat route with an explicit Allow header
async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST")],
        axum::Json(json!({"error": "Method not allowed"})),
    )
        .into_response()
}

/// Create the chat router
pub fn router() -> Router<SharedState> {
    Router::new().route("/", post(chat_handler).fallback(method_not_allowed))
}
