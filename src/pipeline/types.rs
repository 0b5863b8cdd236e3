//! Request lifecycle types and errors for the orchestrator.

use crate::extraction::ExtractionError;
use crate::inference::{InferenceError, InferenceOverrides, OptionsError, Usage};
use serde::Deserialize;
use thiserror::Error;

/// Caller-supplied parameters accompanying an upload.
///
/// This is the wire form of the options on every route: query parameters on `POST /v1/infer`
/// and the `options` object on `POST /v1/infer-text`. Unknown names are rejected.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct UploadOptions {
    /// Provider model identifier.
    #[serde(default)]
    pub model: Option<String>,
    /// Upper bound on generated tokens.
    #[serde(default, alias = "max_output_tokens")]
    pub max_output_tokens: Option<u32>,
    /// Sampling temperature in `[0, 1]`.
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Per-call deadline in milliseconds.
    #[serde(default, alias = "timeout_ms")]
    pub timeout_ms: Option<u64>,
    /// Instructions sent to the provider with the document text.
    #[serde(default)]
    pub instructions: Option<String>,
}

impl UploadOptions {
    /// Model parameters to merge over the configured defaults.
    pub fn overrides(&self) -> InferenceOverrides {
        InferenceOverrides {
            model: self.model.clone(),
            max_output_tokens: self.max_output_tokens,
            temperature: self.temperature,
            timeout_ms: self.timeout_ms,
        }
    }

    /// Instructions with surrounding whitespace removed; blank instructions count as absent.
    pub fn instructions(&self) -> Option<String> {
        self.instructions
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    }
}

/// Lifecycle of a single upload.
///
/// `Received → Extracting → (ExtractionFailed | Extracted) → Inferring → (InferenceFailed |
/// Completed)`. Uploads rejected by validation never leave `Received`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Upload accepted for validation.
    Received,
    /// Extractor running.
    Extracting,
    /// Extraction failed; terminal.
    ExtractionFailed,
    /// Text available for inference.
    Extracted,
    /// Provider call (and retries) in flight.
    Inferring,
    /// Inference failed; terminal.
    InferenceFailed,
    /// Generated text available; terminal.
    Completed,
}

impl RequestState {
    /// Stable name used in logs and error bodies.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Extracting => "extracting",
            Self::ExtractionFailed => "extraction_failed",
            Self::Extracted => "extracted",
            Self::Inferring => "inferring",
            Self::InferenceFailed => "inference_failed",
            Self::Completed => "completed",
        }
    }

    /// Whether the request can make no further progress.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::ExtractionFailed | Self::InferenceFailed | Self::Completed
        )
    }
}

/// Successful outcome of an upload.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Generated text.
    pub text: String,
    /// Model that produced the text.
    pub model: String,
    /// Provider usage counters, if reported.
    pub usage: Option<Usage>,
    /// Pages in the uploaded document.
    pub page_count: usize,
    /// Pages recorded as empty because they failed to decode.
    pub failed_pages: usize,
    /// Whether the document text was cut to fit the input budget.
    pub truncated: bool,
    /// Budget units submitted to the provider.
    pub input_tokens: usize,
    /// Provider calls issued, retries included.
    pub attempts: u32,
}

/// Errors emitted by the upload pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Upload carried no bytes.
    #[error("upload is empty")]
    EmptyUpload,
    /// Submitted text was blank after normalization.
    #[error("text is empty")]
    EmptyText,
    /// Upload exceeded the accepted size.
    #[error("upload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge {
        /// Received size in bytes.
        size: usize,
        /// Configured maximum in bytes.
        limit: usize,
    },
    /// Caller options were rejected.
    #[error("invalid inference options: {0}")]
    Options(#[from] OptionsError),
    /// Document text could not be extracted.
    #[error("failed to extract text: {0}")]
    Extraction(#[from] ExtractionError),
    /// Not even the first word of the text fits the configured input budget.
    #[error("no prefix of the text fits the {budget} token input budget")]
    InputBudgetExceeded {
        /// Configured budget.
        budget: usize,
    },
    /// Provider call failed after the permitted attempts.
    #[error("inference failed after {attempts} attempt(s): {source}")]
    Inference {
        /// Last failure observed.
        #[source]
        source: InferenceError,
        /// Provider calls issued.
        attempts: u32,
    },
}

impl PipelineError {
    /// Stable machine-readable kind reported to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyUpload => "empty_upload",
            Self::EmptyText => "empty_text",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::Options(_) => "invalid_options",
            Self::Extraction(_) => "extraction_error",
            Self::InputBudgetExceeded { .. } => "input_budget_exceeded",
            Self::Inference { source, .. } => source.kind(),
        }
    }

    /// State in which the request stopped.
    pub fn state(&self) -> RequestState {
        match self {
            Self::EmptyUpload
            | Self::EmptyText
            | Self::PayloadTooLarge { .. }
            | Self::Options(_) => RequestState::Received,
            Self::Extraction(_) => RequestState::ExtractionFailed,
            Self::InputBudgetExceeded { .. } | Self::Inference { .. } => {
                RequestState::InferenceFailed
            }
        }
    }
}
