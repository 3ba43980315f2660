//! Axum-based HTTP server.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use parley_core::config::STATIC_URL_PREFIX;
use parley_core::types::{ConversationReply, JobRecord, DEFAULT_LANGUAGE};

use crate::error::ApiError;
use crate::pipeline::{converse, ConversationInput};
use crate::state::GatewayState;

/// Build the gateway router over shared state.
pub fn build_router(state: Arc<GatewayState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = state.config.max_upload_bytes();

    let router = Router::new()
        .route("/", post(conversation_handler))
        .route("/conversation", post(structured_conversation_handler))
        .route("/jobs/{id}", get(job_handler))
        .route("/health", get(health_handler));

    #[cfg(feature = "metrics")]
    let router = router.route("/metrics", get(metrics_handler));

    router
        .nest_service(STATIC_URL_PREFIX, ServeDir::new(&state.static_dir))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

/// Start the gateway HTTP server and run until Ctrl+C.
pub async fn start_gateway(state: Arc<GatewayState>, bind_addr: &str, port: u16) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&state.output_dir).await?;

    let app = build_router(state.clone());

    let addr = format!("{bind_addr}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        static_dir = %state.static_dir.display(),
        output_dir = %state.output_dir.display(),
        "Gateway listening on {addr}"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// `POST /`: pipeline failures surface as a bare 500.
async fn conversation_handler(
    State(state): State<Arc<GatewayState>>,
    multipart: Multipart,
) -> Result<Json<ConversationReply>, ApiError> {
    let input = parse_conversation_form(multipart).await?;
    let reply = converse(&state, input)
        .await
        .map_err(|_| ApiError::Internal)?;
    Ok(Json(reply))
}

/// `POST /conversation`: pipeline failures name the failing stage.
async fn structured_conversation_handler(
    State(state): State<Arc<GatewayState>>,
    multipart: Multipart,
) -> Result<Json<ConversationReply>, ApiError> {
    let input = parse_conversation_form(multipart).await?;
    let reply = converse(&state, input)
        .await
        .map_err(|e| ApiError::stage(&e))?;
    Ok(Json(reply))
}

async fn parse_conversation_form(mut multipart: Multipart) -> Result<ConversationInput, ApiError> {
    let mut audio = None;
    let mut lang: Option<String> = None;
    let mut target_lang: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed reading multipart field: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::bad_request(format!("Failed reading multipart 'file' field: {e}"))
                })?;
                if bytes.is_empty() {
                    return Err(ApiError::bad_request("Multipart 'file' field is empty"));
                }
                audio = Some(bytes);
            }
            "lang" | "target_lang" => {
                let text = field.text().await.map_err(|e| {
                    ApiError::bad_request(format!("Failed reading multipart '{name}' field: {e}"))
                })?;
                let value = text.trim().to_string();
                if name == "lang" {
                    lang = Some(value);
                } else if !value.is_empty() {
                    target_lang = Some(value);
                }
            }
            _ => {}
        }
    }

    let audio = audio.ok_or_else(|| ApiError::bad_request("Missing multipart 'file' field"))?;

    Ok(ConversationInput {
        audio,
        lang: Some(lang.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())),
        target_lang: target_lang.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
    })
}

async fn job_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> Result<Json<JobRecord>, ApiError> {
    state
        .jobs
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Unknown job: {id}")))
}

async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let version = env!("CARGO_PKG_VERSION");
    let jobs_pending = state.jobs.pending_count().await;

    Json(json!({
        "status": "ok",
        "version": version,
        "jobs_pending": jobs_pending,
    }))
}

#[cfg(feature = "metrics")]
async fn metrics_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C handler: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
