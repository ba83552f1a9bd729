//! HTTP request handlers for the gateway API.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::stream::StreamExt;
use gateway_core::{
    sse_frames, ChatRequest, GatewayError, LanguageModel, ModelDescriptor, ModelObject,
    ModelsResponse, ProviderKind, ProviderProfile,
};
use gateway_routing::truncate_last_user_message;
use gateway_telemetry::{chat_request_span, Outcome};
use serde::Serialize;
use std::{convert::Infallible, sync::Arc, time::Instant};
use tracing::{debug, error, info, instrument, Instrument};

use crate::{
    error::ApiError,
    extractors::{JsonBody, RequestId},
    state::AppState,
};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Version
    pub version: String,
    /// Uptime in seconds
    pub uptime_seconds: u64,
    /// Registered providers
    pub providers: usize,
    /// Models in the catalog
    pub models: usize,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        providers: state.catalog.providers().len(),
        models: state.catalog.models().len(),
    })
}

/// Readiness check endpoint
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.catalog.is_empty() {
        (StatusCode::SERVICE_UNAVAILABLE, "no providers available")
    } else {
        (StatusCode::OK, "ready")
    }
}

/// Liveness check endpoint
pub async fn liveness_check() -> impl IntoResponse {
    (StatusCode::OK, "alive")
}

/// Metrics endpoint (Prometheus format)
pub async fn metrics_endpoint(State(state): State<AppState>) -> Result<Response, ApiError> {
    let metrics = state
        .metrics
        .gather()
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics,
    )
        .into_response())
}

fn model_object(state: &AppState, model: &ModelDescriptor) -> ModelObject {
    let provider = state
        .catalog
        .provider_profiles()
        .iter()
        .find(|p| p.provider_id == model.provider_id)
        .map_or(model.provider_id.as_str(), |p| p.display_name.as_str());

    ModelObject::new(&model.internal_id, &model.provider_id)
        .with_display_name(&model.display_name)
        .with_provider(provider)
}

/// List models endpoint (OpenAI compatible)
#[instrument(skip(state))]
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let data = state
        .catalog
        .models()
        .iter()
        .map(|m| model_object(&state, m))
        .collect();

    Json(ModelsResponse::new(data))
}

/// Get model endpoint; accepts an internal id or a display name
#[instrument(skip(state))]
pub async fn get_model(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
) -> Result<Json<ModelObject>, ApiError> {
    let model = state
        .catalog
        .model(&model_id)
        .ok_or_else(|| GatewayError::model_not_found(&model_id))?;

    Ok(Json(model_object(&state, model)))
}

/// List providers endpoint, in presentation order
pub async fn list_providers(State(state): State<AppState>) -> Json<Vec<ProviderProfile>> {
    Json(state.catalog.provider_profiles().to_vec())
}

/// Chat completion endpoint (OpenAI compatible)
#[instrument(skip(state, request), fields(model = %request.model, stream = request.stream))]
pub async fn chat_completion(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    JsonBody(mut request): JsonBody<ChatRequest>,
) -> Result<Response, ApiError> {
    request.validate()?;

    let user_text = request.last_user_text();
    let resolution = state
        .catalog
        .resolve(&request.model, user_text.as_deref())?;
    let provider = resolution.provider;
    let descriptor = resolution.descriptor;

    if resolution.search_augmented {
        state.metrics.record_search_reroute();
        info!(
            request_id = %request_id,
            model = %descriptor.internal_id,
            "Routing to search-augmented model"
        );
    }

    request.model.clone_from(&descriptor.internal_id);
    if truncate_last_user_message(&mut request, descriptor.context_char_limit) {
        state.metrics.record_truncation();
        info!(
            request_id = %request_id,
            limit = descriptor.context_char_limit,
            "Truncated last user message"
        );
    }

    debug!(
        request_id = %request_id,
        provider = provider.id(),
        model = %descriptor.internal_id,
        "Dispatching chat completion"
    );

    let span = chat_request_span!(
        request_id,
        descriptor.internal_id,
        provider.id(),
        request.stream
    );
    if request.stream {
        handle_streaming_request(state, request, provider)
            .instrument(span)
            .await
    } else {
        handle_non_streaming_request(state, request, provider)
            .instrument(span)
            .await
    }
}

async fn handle_non_streaming_request(
    state: AppState,
    request: ChatRequest,
    provider: Arc<dyn LanguageModel>,
) -> Result<Response, ApiError> {
    let start = Instant::now();
    let timeout = state.config.server.request_timeout;

    let result = match tokio::time::timeout(timeout, provider.generate(&request)).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::timeout(timeout)),
    };
    let duration = start.elapsed();

    match result {
        Ok(completion) => {
            state
                .metrics
                .record_completion(provider.id(), false, Outcome::Success, duration);
            info!(
                provider = provider.id(),
                duration_ms = duration.as_millis(),
                completion_tokens = completion.usage.completion_tokens,
                "Chat completion successful"
            );
            Ok(Json(completion).into_response())
        }
        Err(e) => {
            state
                .metrics
                .record_completion(provider.id(), false, Outcome::Error, duration);
            error!(provider = provider.id(), error = %e, "Chat completion failed");
            Err(e.into())
        }
    }
}

async fn handle_streaming_request(
    state: AppState,
    request: ChatRequest,
    provider: Arc<dyn LanguageModel>,
) -> Result<Response, ApiError> {
    let start = Instant::now();

    let chunks = match provider.stream(&request).await {
        Ok(chunks) => chunks,
        Err(e) => {
            state
                .metrics
                .record_completion(provider.id(), true, Outcome::Error, start.elapsed());
            error!(provider = provider.id(), error = %e, "Streaming request failed");
            return Err(e.into());
        }
    };

    state
        .metrics
        .record_completion(provider.id(), true, Outcome::Success, start.elapsed());
    if is_synthetic(provider.kind()) {
        state.metrics.record_synthetic_stream(provider.id());
    }

    // Dropping the body on client disconnect drops the upstream stream with it
    let events = sse_frames(chunks)
        .map(|frame| Ok::<_, Infallible>(Event::default().data(frame.payload())));

    Ok(Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response())
}

/// Upstreams that answer in one piece and are replayed as a stream
fn is_synthetic(kind: ProviderKind) -> bool {
    matches!(
        kind,
        ProviderKind::Grok | ProviderKind::GptOss | ProviderKind::SonnetFree
    )
}
