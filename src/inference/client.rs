//! HTTP client for the remote inference provider.

use crate::config::ProviderConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use thiserror::Error;

use super::types::{
    InferenceError, InferenceOutput, InferenceRequest, ProviderHealth, ProviderResponse,
};

const USER_AGENT: &str = concat!("pdfinfer/", env!("CARGO_PKG_VERSION"));
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const LOGGED_BODY_LIMIT: usize = 2_048;
const REDACTED: &str = "[redacted]";

/// Errors raised while constructing the HTTP client.
#[derive(Debug, Error)]
pub enum ClientSetupError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid provider URL: {0}")]
    InvalidUrl(String),
    /// HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Interface implemented by inference backends.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Issue one generation call and map its outcome.
    async fn infer(&self, request: InferenceRequest) -> Result<InferenceOutput, InferenceError>;

    /// Check whether the provider is reachable.
    async fn health(&self) -> ProviderHealth;
}

/// reqwest-backed client for a JSON generation endpoint.
pub struct HttpInferenceClient {
    http: Client,
    base_url: String,
    endpoint: String,
    api_key: SecretString,
}

#[derive(Serialize)]
struct GenerationBody<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
    max_output_tokens: u32,
    temperature: f32,
}

impl HttpInferenceClient {
    /// Construct a client from explicit provider settings.
    pub fn new(config: &ProviderConfig) -> Result<Self, ClientSetupError> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        let base_url = normalize_base_url(&config.base_url).map_err(ClientSetupError::InvalidUrl)?;
        let endpoint = format_endpoint(&base_url, &config.endpoint_path);
        tracing::debug!(
            endpoint = %endpoint,
            has_api_key = !config.api_key.expose_secret().is_empty(),
            "Initialized inference HTTP client"
        );

        Ok(Self {
            http,
            base_url,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }

    /// Full URL generation calls are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn scrub(&self, message: &str) -> String {
        let secret = self.api_key.expose_secret();
        if secret.is_empty() {
            message.to_string()
        } else {
            message.replace(secret, REDACTED)
        }
    }

    fn map_status(&self, status: StatusCode, body: &str) -> InferenceError {
        if status.is_client_error() {
            let message = self.scrub(&provider_message(body));
            tracing::warn!(status = status.as_u16(), message = %message, "Provider rejected request");
            InferenceError::Client {
                status: status.as_u16(),
                message,
            }
        } else {
            tracing::error!(
                status = status.as_u16(),
                body = %self.scrub(clip(body)),
                "Provider returned an error status"
            );
            InferenceError::Provider {
                status: Some(status.as_u16()),
                message: format!("provider returned status {status}"),
            }
        }
    }
}

#[async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn infer(&self, request: InferenceRequest) -> Result<InferenceOutput, InferenceError> {
        let InferenceRequest {
            input,
            instructions,
            options,
        } = request;
        let input = input.trim();
        if input.is_empty() {
            return Err(InferenceError::InvalidRequest(
                "input text is empty".to_string(),
            ));
        }

        let body = GenerationBody {
            model: &options.model,
            input,
            instructions: instructions
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty()),
            max_output_tokens: options.max_output_tokens,
            temperature: options.temperature,
        };
        let timeout = Duration::from_millis(options.timeout_ms);
        let started = Instant::now();

        let call = async {
            let response = self
                .http
                .post(&self.endpoint)
                .bearer_auth(self.api_key.expose_secret())
                .timeout(timeout)
                .json(&body)
                .send()
                .await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };

        let (status, text) = match tokio::time::timeout(timeout, call).await {
            Err(_) => {
                tracing::warn!(timeout_ms = options.timeout_ms, "Inference call timed out");
                return Err(InferenceError::Timeout {
                    timeout_ms: options.timeout_ms,
                });
            }
            Ok(Err(error)) if error.is_timeout() => {
                tracing::warn!(timeout_ms = options.timeout_ms, "Inference call timed out");
                return Err(InferenceError::Timeout {
                    timeout_ms: options.timeout_ms,
                });
            }
            Ok(Err(error)) => {
                tracing::warn!(error = %error, "Inference transport failure");
                return Err(InferenceError::Transport(describe_transport_error(&error)));
            }
            Ok(Ok(pair)) => pair,
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if !status.is_success() {
            return Err(self.map_status(status, &text));
        }

        match ProviderResponse::parse(&text) {
            ProviderResponse::Success {
                text,
                model,
                usage,
            } => {
                let model = model.unwrap_or(options.model);
                tracing::debug!(
                    model = %model,
                    elapsed_ms,
                    output_chars = text.chars().count(),
                    "Inference call succeeded"
                );
                Ok(InferenceOutput { text, model, usage })
            }
            ProviderResponse::Malformed { raw_body } => {
                tracing::error!(
                    status = status.as_u16(),
                    body = %self.scrub(clip(&raw_body)),
                    "Provider returned an unrecognized payload"
                );
                Err(InferenceError::Provider {
                    status: None,
                    message: "provider returned a malformed response".to_string(),
                })
            }
        }
    }

    async fn health(&self) -> ProviderHealth {
        match self
            .http
            .get(&self.base_url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => {
                tracing::debug!(status = response.status().as_u16(), "Provider health check");
                ProviderHealth {
                    reachable: true,
                    error: None,
                }
            }
            Err(error) => {
                tracing::warn!(error = %error, "Provider health check failed");
                ProviderHealth {
                    reachable: false,
                    error: Some(describe_transport_error(&error)),
                }
            }
        }
    }
}

/// Pull the human-readable message out of a provider error body, falling back to the body.
fn provider_message(body: &str) -> String {
    let trimmed = body.trim();
    let parsed = serde_json::from_str::<Value>(trimmed).ok();
    let message = parsed.as_ref().and_then(|value| {
        value
            .pointer("/error/message")
            .or_else(|| value.get("error"))
            .or_else(|| value.get("message"))
            .or_else(|| value.get("detail"))
            .and_then(Value::as_str)
    });
    match message {
        Some(message) => message.to_string(),
        None if trimmed.is_empty() => "no message provided".to_string(),
        None => trimmed.to_string(),
    }
}

fn describe_transport_error(error: &reqwest::Error) -> String {
    let stage = if error.is_connect() {
        "could not connect to provider"
    } else if error.is_body() || error.is_decode() {
        "connection dropped while reading provider response"
    } else {
        "request to provider failed"
    };
    stage.to_string()
}

fn clip(body: &str) -> &str {
    match body.char_indices().nth(LOGGED_BODY_LIMIT) {
        Some((index, _)) => &body[..index],
        None => body,
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
