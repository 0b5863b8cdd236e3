//! Inference options: configured defaults merged with caller overrides.

use crate::config::InferenceDefaults;
use thiserror::Error;

/// Errors raised while building inference options.
#[derive(Debug, Error, PartialEq)]
pub enum OptionsError {
    /// Caller supplied an option name outside the recognized set, or an unparsable value.
    #[error("unrecognized or malformed option: {0}")]
    Unrecognized(String),
    /// Temperature outside `[0, 1]`.
    #[error("temperature must be within [0, 1], got {0}")]
    TemperatureOutOfRange(f32),
    /// `maxOutputTokens` of zero.
    #[error("maxOutputTokens must be greater than zero")]
    ZeroMaxOutputTokens,
    /// `timeoutMs` of zero.
    #[error("timeoutMs must be greater than zero")]
    ZeroTimeout,
    /// Blank model identifier.
    #[error("model must not be empty")]
    EmptyModel,
}

/// Caller-supplied overrides; `None` keeps the configured default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferenceOverrides {
    /// Provider model identifier.
    pub model: Option<String>,
    /// Upper bound on generated tokens.
    pub max_output_tokens: Option<u32>,
    /// Sampling temperature in `[0, 1]`.
    pub temperature: Option<f32>,
    /// Per-call deadline in milliseconds.
    pub timeout_ms: Option<u64>,
}

/// Fully resolved options for one inference call.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceOptions {
    /// Provider model identifier.
    pub model: String,
    /// Upper bound on generated tokens.
    pub max_output_tokens: u32,
    /// Sampling temperature in `[0, 1]`.
    pub temperature: f32,
    /// Per-call deadline in milliseconds.
    pub timeout_ms: u64,
}

impl InferenceOptions {
    /// Merge caller overrides over configured defaults and validate the result.
    pub fn resolve(
        defaults: &InferenceDefaults,
        overrides: InferenceOverrides,
    ) -> Result<Self, OptionsError> {
        let model = overrides
            .model
            .map(|model| model.trim().to_string())
            .unwrap_or_else(|| defaults.model.clone());
        let options = Self {
            model,
            max_output_tokens: overrides
                .max_output_tokens
                .unwrap_or(defaults.max_output_tokens),
            temperature: overrides.temperature.unwrap_or(defaults.temperature),
            timeout_ms: overrides.timeout_ms.unwrap_or(defaults.timeout_ms),
        };
        options.validate()?;
        Ok(options)
    }

    fn validate(&self) -> Result<(), OptionsError> {
        if self.model.is_empty() {
            return Err(OptionsError::EmptyModel);
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(OptionsError::TemperatureOutOfRange(self.temperature));
        }
        if self.max_output_tokens == 0 {
            return Err(OptionsError::ZeroMaxOutputTokens);
        }
        if self.timeout_ms == 0 {
            return Err(OptionsError::ZeroTimeout);
        }
        Ok(())
    }
}
