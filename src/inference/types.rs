//! Request, response, and error types for inference calls.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::options::InferenceOptions;

/// Errors returned by an inference call.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InferenceError {
    /// Request was rejected locally before any network call.
    #[error("invalid inference request: {0}")]
    InvalidRequest(String),
    /// Provider answered with a 4xx status; the message is the provider's own.
    #[error("provider rejected the request ({status}): {message}")]
    Client {
        /// HTTP status returned by the provider.
        status: u16,
        /// Provider message, with the credential scrubbed.
        message: String,
    },
    /// Provider answered with a 5xx status or an unrecognized success payload.
    #[error("provider failure: {message}")]
    Provider {
        /// HTTP status, absent when the failure is a malformed success payload.
        status: Option<u16>,
        /// Caller-safe description; raw bodies are only logged.
        message: String,
    },
    /// Connection-level failure before a response was received.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The call did not finish within its deadline.
    #[error("inference call exceeded its {timeout_ms} ms deadline")]
    Timeout {
        /// Deadline that was exceeded.
        timeout_ms: u64,
    },
}

impl InferenceError {
    /// Whether re-issuing the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider { .. } | Self::Transport(_))
    }

    /// Stable machine-readable kind reported to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) | Self::Client { .. } => "client_error",
            Self::Provider { .. } => "provider_error",
            Self::Transport(_) => "transport_error",
            Self::Timeout { .. } => "timeout_error",
        }
    }
}

/// A single generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    /// Document text submitted as model input.
    pub input: String,
    /// Optional caller instructions sent alongside the input.
    pub instructions: Option<String>,
    /// Resolved model parameters.
    pub options: InferenceOptions,
}

/// Token accounting reported by the provider, when available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the input.
    #[serde(default, alias = "prompt_tokens")]
    pub input_tokens: Option<u64>,
    /// Tokens generated in the output.
    #[serde(default, alias = "completion_tokens")]
    pub output_tokens: Option<u64>,
}

/// Generated text plus provider metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceOutput {
    /// Model output.
    pub text: String,
    /// Model identifier reported by the provider, or the requested one.
    pub model: String,
    /// Usage counters, if the provider reported them.
    pub usage: Option<Usage>,
}

/// Provider success payload, classified without assuming a single schema.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResponse {
    /// Payload carried generated text in a recognized shape.
    Success {
        /// Generated text.
        text: String,
        /// Model identifier, if reported.
        model: Option<String>,
        /// Usage counters, if reported.
        usage: Option<Usage>,
    },
    /// Payload did not match any recognized shape.
    Malformed {
        /// Body as received.
        raw_body: String,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GenerationPayload {
    Text {
        text: String,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        usage: Option<Usage>,
    },
    Generated(GeneratedItem),
    Batch(Vec<GeneratedItem>),
}

#[derive(Deserialize)]
struct GeneratedItem {
    generated_text: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

impl ProviderResponse {
    /// Classify a 2xx body. Recognized shapes are `{"text": …}`, `{"generated_text": …}` and
    /// `[{"generated_text": …}]`, each with optional `model` and `usage`.
    pub fn parse(body: &str) -> Self {
        let malformed = || Self::Malformed {
            raw_body: body.to_string(),
        };
        match serde_json::from_str::<GenerationPayload>(body) {
            Ok(GenerationPayload::Text { text, model, usage }) => {
                Self::Success { text, model, usage }
            }
            Ok(GenerationPayload::Generated(item)) => item.into(),
            Ok(GenerationPayload::Batch(items)) => {
                items.into_iter().next().map(Self::from).unwrap_or_else(malformed)
            }
            Err(_) => malformed(),
        }
    }
}

impl From<GeneratedItem> for ProviderResponse {
    fn from(item: GeneratedItem) -> Self {
        Self::Success {
            text: item.generated_text,
            model: item.model,
            usage: item.usage,
        }
    }
}

/// Reachability of the configured provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderHealth {
    /// Whether the provider answered at all.
    pub reachable: bool,
    /// Diagnostic captured when the provider could not be reached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
