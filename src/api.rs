//! HTTP surface for pdfinfer.
//!
//! This module exposes a compact Axum router:
//!
//! - `POST /v1/infer` – Document body in, generated text out. `application/pdf` (or no content
//!   type) is extracted as a PDF; `text/plain` skips extraction. Inference overrides travel as
//!   query parameters (`model`, `maxOutputTokens`, `temperature`, `timeoutMs`, `instructions`).
//! - `POST /v1/infer-text` – JSON `{"text", "options"?}` in, generated text out.
//! - `POST /v1/extract` – Raw PDF body in, normalized page text out; the provider is not called.
//! - `GET /healthz` – Liveness plus provider reachability.
//! - `GET /metrics` – Pipeline counters.
//! - `GET /` – Machine-readable endpoint catalog.
//!
//! Failures are rendered as `{"error": {"kind", "message", "state"}}` with a status derived
//! from the error kind.

use crate::config::Config;
use crate::inference::{InferenceError, OptionsError, ProviderHealth, Usage};
use crate::metrics::MetricsSnapshot;
use crate::pipeline::{Completion, PipelineApi, PipelineError, UploadOptions};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        DefaultBodyLimit, Query, State,
        rejection::{BytesRejection, JsonRejection, QueryRejection},
    },
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Router-level settings taken from the process configuration.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: usize,
    /// Comma separated list of allowed CORS origins, `*` for any.
    pub allowed_origins: String,
}

impl HttpSettings {
    /// Extract the HTTP settings from a loaded [`Config`].
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_upload_bytes: config.limits.max_upload_bytes,
            allowed_origins: config.allowed_origins.clone(),
        }
    }
}

/// Build the HTTP router exposing the upload API surface.
pub fn create_router<S>(service: Arc<S>, settings: &HttpSettings) -> Router
where
    S: PipelineApi + 'static,
{
    // One byte of headroom lets the pipeline see, and reject, an upload that is just over the
    // limit with its own typed error.
    let body_limit = settings.max_upload_bytes.saturating_add(1);
    Router::new()
        .route("/", get(get_descriptor))
        .route("/v1/infer", post(infer_document::<S>))
        .route("/v1/infer-text", post(infer_text::<S>))
        .route("/v1/extract", post(extract_document::<S>))
        .route("/healthz", get(get_health::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(&settings.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

fn cors_layer(allowed_origins: &str) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);
    if allowed_origins.split(',').any(|origin| origin.trim() == "*") {
        return base.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(origins))
}

/// How an upload body is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadFormat {
    Pdf,
    PlainText,
}

/// Classify the upload by its `Content-Type`. A missing header means PDF.
fn upload_format(headers: &HeaderMap) -> Result<UploadFormat, AppError> {
    let Some(value) = headers.get(header::CONTENT_TYPE) else {
        return Ok(UploadFormat::Pdf);
    };
    let essence = value
        .to_str()
        .unwrap_or_default()
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "application/pdf" | "application/octet-stream" => Ok(UploadFormat::Pdf),
        "text/plain" => Ok(UploadFormat::PlainText),
        _ => Err(AppError::UnsupportedMediaType(essence)),
    }
}

/// Success response for the inference routes.
#[derive(Serialize)]
struct InferResponse {
    text: String,
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<Usage>,
    page_count: usize,
    failed_pages: usize,
    truncated: bool,
    input_tokens: usize,
    attempts: u32,
}

impl From<Completion> for InferResponse {
    fn from(completion: Completion) -> Self {
        Self {
            text: completion.text,
            model: completion.model,
            usage: completion.usage,
            page_count: completion.page_count,
            failed_pages: completion.failed_pages,
            truncated: completion.truncated,
            input_tokens: completion.input_tokens,
            attempts: completion.attempts,
        }
    }
}

/// Run an uploaded document through extraction (PDF only) and inference.
async fn infer_document<S>(
    State(service): State<Arc<S>>,
    headers: HeaderMap,
    options: Result<Query<UploadOptions>, QueryRejection>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<InferResponse>, AppError>
where
    S: PipelineApi,
{
    let format = upload_format(&headers)?;
    let Query(options) = options.map_err(AppError::from)?;
    let bytes = body.map_err(AppError::from)?;
    let completion = match format {
        UploadFormat::Pdf => service.handle_upload(bytes, options).await?,
        UploadFormat::PlainText => {
            let text = String::from_utf8(bytes.to_vec())
                .map_err(|_| AppError::InvalidText("body is not valid UTF-8".into()))?;
            service.handle_text(text, options).await?
        }
    };
    Ok(Json(completion.into()))
}

/// Body of `POST /v1/infer-text`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TextRequest {
    text: String,
    #[serde(default)]
    options: UploadOptions,
}

/// Run caller-supplied text through inference without extraction.
async fn infer_text<S>(
    State(service): State<Arc<S>>,
    request: Result<Json<TextRequest>, JsonRejection>,
) -> Result<Json<InferResponse>, AppError>
where
    S: PipelineApi,
{
    let Json(request) = request.map_err(AppError::from)?;
    let completion = service.handle_text(request.text, request.options).await?;
    Ok(Json(completion.into()))
}

/// Success response for `POST /v1/extract`.
#[derive(Serialize)]
struct ExtractResponse {
    page_count: usize,
    failed_pages: usize,
    pages: Vec<String>,
    text: String,
    chars: usize,
}

/// Extract the text layer of an uploaded PDF without calling the provider.
async fn extract_document<S>(
    State(service): State<Arc<S>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<ExtractResponse>, AppError>
where
    S: PipelineApi,
{
    if upload_format(&headers)? != UploadFormat::Pdf {
        return Err(AppError::UnsupportedMediaType("text/plain".into()));
    }
    let bytes = body.map_err(AppError::from)?;
    let extracted = service.extract_upload(bytes).await?;
    let text = extracted.text().to_string();
    Ok(Json(ExtractResponse {
        page_count: extracted.page_count(),
        failed_pages: extracted.failed_pages(),
        pages: extracted.pages().to_vec(),
        chars: text.chars().count(),
        text,
    }))
}

/// Response body for `GET /healthz`.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    provider: ProviderHealth,
}

/// Report liveness; `degraded` when the provider cannot be reached.
async fn get_health<S>(State(service): State<Arc<S>>) -> Json<HealthResponse>
where
    S: PipelineApi,
{
    let provider = service.provider_health().await;
    let status = if provider.reachable { "ok" } else { "degraded" };
    Json(HealthResponse { status, provider })
}

/// Return the pipeline counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: PipelineApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single endpoint in the catalog.
#[derive(Serialize)]
struct EndpointDescriptor {
    method: &'static str,
    path: &'static str,
    description: &'static str,
}

/// Response body for `GET /`.
#[derive(Serialize)]
struct DescriptorResponse {
    service: &'static str,
    version: &'static str,
    endpoints: Vec<EndpointDescriptor>,
}

/// Enumerate supported endpoints for discovery.
async fn get_descriptor() -> Json<DescriptorResponse> {
    Json(DescriptorResponse {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        endpoints: vec![
            EndpointDescriptor {
                method: "POST",
                path: "/v1/infer",
                description: "Run a PDF (application/pdf) or plain-text (text/plain) body through the inference provider. Optional query: model, maxOutputTokens, temperature, timeoutMs, instructions.",
            },
            EndpointDescriptor {
                method: "POST",
                path: "/v1/infer-text",
                description: "Run JSON {\"text\", \"options\"?} through the inference provider without extraction.",
            },
            EndpointDescriptor {
                method: "POST",
                path: "/v1/extract",
                description: "Return the normalized per-page text of a PDF body.",
            },
            EndpointDescriptor {
                method: "GET",
                path: "/healthz",
                description: "Liveness and provider reachability.",
            },
            EndpointDescriptor {
                method: "GET",
                path: "/metrics",
                description: "Pipeline counters.",
            },
        ],
    })
}

#[derive(Debug)]
enum AppError {
    Pipeline(PipelineError),
    Body(BytesRejection),
    Json(JsonRejection),
    UnsupportedMediaType(String),
    InvalidText(String),
}

impl From<PipelineError> for AppError {
    fn from(inner: PipelineError) -> Self {
        Self::Pipeline(inner)
    }
}

impl From<BytesRejection> for AppError {
    fn from(rejection: BytesRejection) -> Self {
        Self::Body(rejection)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Json(rejection)
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Pipeline(PipelineError::Options(OptionsError::Unrecognized(
            rejection.body_text(),
        )))
    }
}

fn status_for(error: &PipelineError) -> StatusCode {
    match error {
        PipelineError::EmptyUpload
        | PipelineError::EmptyText
        | PipelineError::Options(_)
        | PipelineError::Extraction(_) => StatusCode::BAD_REQUEST,
        PipelineError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        PipelineError::InputBudgetExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        PipelineError::Inference { source, .. } => match source {
            InferenceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            InferenceError::Client { status: 429, .. } => StatusCode::TOO_MANY_REQUESTS,
            InferenceError::Client {
                status: 401 | 403, ..
            } => StatusCode::BAD_GATEWAY,
            InferenceError::Client {
                status: 400..=422, ..
            } => StatusCode::BAD_REQUEST,
            InferenceError::Client { .. }
            | InferenceError::Provider { .. }
            | InferenceError::Transport(_) => StatusCode::BAD_GATEWAY,
            InferenceError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        },
    }
}

/// Kind reported for a body the router itself refused.
fn rejection_kind(status: StatusCode) -> &'static str {
    match status {
        StatusCode::PAYLOAD_TOO_LARGE => "payload_too_large",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => "unsupported_media_type",
        _ => "invalid_body",
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Pipeline(error) => {
                let status = status_for(&error);
                if status.is_server_error() {
                    tracing::error!(kind = error.kind(), error = %error, "Request failed");
                }
                (
                    status,
                    json!({
                        "error": {
                            "kind": error.kind(),
                            "message": error.to_string(),
                            "state": error.state().as_str(),
                        }
                    }),
                )
            }
            Self::Body(rejection) => {
                let status = rejection.status();
                (
                    status,
                    json!({
                        "error": { "kind": rejection_kind(status), "message": rejection.body_text() }
                    }),
                )
            }
            Self::Json(rejection) => {
                let status = match rejection.status() {
                    StatusCode::UNPROCESSABLE_ENTITY => StatusCode::BAD_REQUEST,
                    status => status,
                };
                (
                    status,
                    json!({
                        "error": { "kind": rejection_kind(status), "message": rejection.body_text() }
                    }),
                )
            }
            Self::UnsupportedMediaType(media_type) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                json!({
                    "error": {
                        "kind": "unsupported_media_type",
                        "message": format!("unsupported content type '{media_type}'"),
                    }
                }),
            ),
            Self::InvalidText(message) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": { "kind": "invalid_body", "message": message } }),
            ),
        };
        (status, Json(body)).into_response()
    }
}
