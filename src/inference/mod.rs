//! Remote inference provider integration.
//!
//! [`HttpInferenceClient`] issues exactly one HTTP call per [`InferenceClient::infer`]
//! invocation and maps every outcome onto [`InferenceError`]. Retrying is left to the caller;
//! [`InferenceError::is_retryable`] tells it which failures are worth another attempt.

mod client;
mod options;
mod types;

pub use client::{ClientSetupError, HttpInferenceClient, InferenceClient};
pub use options::{InferenceOptions, InferenceOverrides, OptionsError};
pub use types::{
    InferenceError, InferenceOutput, InferenceRequest, ProviderHealth, ProviderResponse, Usage,
};
