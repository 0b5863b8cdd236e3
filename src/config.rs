use secrecy::SecretString;
use std::env;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_ENDPOINT_PATH: &str = "generate";
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 512;
const DEFAULT_TEMPERATURE: f32 = 0.2;
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 1_500;
const DEFAULT_REQUEST_DEADLINE_MS: u64 = 90_000;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
const DEFAULT_MAX_INPUT_TOKENS: usize = 8_000;
const DEFAULT_TOKENIZER: &str = "cl100k_base";

/// Longest accepted timeout, backoff, or deadline setting: one day.
pub const MAX_DURATION_MS: u64 = 86_400_000;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Connection settings for the remote inference provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the provider, without the generation path.
    pub base_url: String,
    /// Path appended to `base_url` for generation calls.
    pub endpoint_path: String,
    /// Bearer credential sent with every call. Never logged.
    pub api_key: SecretString,
}

/// Defaults applied to every inference call unless the caller overrides them.
#[derive(Debug, Clone)]
pub struct InferenceDefaults {
    /// Provider model identifier.
    pub model: String,
    /// Upper bound on generated tokens.
    pub max_output_tokens: u32,
    /// Sampling temperature in `[0, 1]`.
    pub temperature: f32,
    /// Per-call deadline in milliseconds.
    pub timeout_ms: u64,
}

/// Limits and retry policy enforced by the request orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineLimits {
    /// Largest accepted upload, in bytes.
    pub max_upload_bytes: usize,
    /// Input budget submitted to the provider, in tokenizer units.
    pub max_input_tokens: usize,
    /// Tokenizer model or encoding name used to measure the input budget.
    pub tokenizer: String,
    /// Retries attempted after a retryable inference failure.
    pub max_retries: u32,
    /// Base delay of the exponential backoff between retries.
    pub retry_backoff_ms: u64,
    /// Overall deadline for the inference phase of a request, retries included.
    pub request_deadline_ms: u64,
}

/// Runtime configuration for the service, read once at process start.
#[derive(Debug, Clone)]
pub struct Config {
    /// Remote provider connection settings.
    pub provider: ProviderConfig,
    /// Default inference options.
    pub inference: InferenceDefaults,
    /// Orchestrator limits.
    pub limits: PipelineLimits,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Comma separated list of allowed CORS origins, `*` for any.
    pub allowed_origins: String,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = load_env("INFERENCE_BASE_URL")?;
        reqwest::Url::parse(&base_url)
            .map_err(|_| ConfigError::InvalidValue("INFERENCE_BASE_URL".into()))?;

        let temperature = parse_optional("INFERENCE_TEMPERATURE")?.unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=1.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue("INFERENCE_TEMPERATURE".into()));
        }

        let max_upload_bytes =
            parse_optional("MAX_UPLOAD_BYTES")?.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        if max_upload_bytes == 0 {
            return Err(ConfigError::InvalidValue("MAX_UPLOAD_BYTES".into()));
        }
        let max_input_tokens =
            parse_optional("MAX_INPUT_TOKENS")?.unwrap_or(DEFAULT_MAX_INPUT_TOKENS);
        if max_input_tokens == 0 {
            return Err(ConfigError::InvalidValue("MAX_INPUT_TOKENS".into()));
        }

        Ok(Self {
            provider: ProviderConfig {
                base_url,
                endpoint_path: load_env_optional("INFERENCE_ENDPOINT_PATH")
                    .unwrap_or_else(|| DEFAULT_ENDPOINT_PATH.to_string()),
                api_key: SecretString::from(load_env("INFERENCE_API_KEY")?),
            },
            inference: InferenceDefaults {
                model: load_env("INFERENCE_DEFAULT_MODEL")?,
                max_output_tokens: parse_optional("INFERENCE_MAX_OUTPUT_TOKENS")?
                    .unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
                temperature,
                timeout_ms: parse_duration_ms("INFERENCE_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?,
            },
            limits: PipelineLimits {
                max_upload_bytes,
                max_input_tokens,
                tokenizer: load_env_optional("TOKENIZER")
                    .unwrap_or_else(|| DEFAULT_TOKENIZER.to_string()),
                max_retries: parse_optional("INFERENCE_MAX_RETRIES")?
                    .unwrap_or(DEFAULT_MAX_RETRIES),
                retry_backoff_ms: parse_duration_ms(
                    "INFERENCE_RETRY_BACKOFF_MS",
                    DEFAULT_RETRY_BACKOFF_MS,
                )?,
                request_deadline_ms: parse_duration_ms(
                    "REQUEST_DEADLINE_MS",
                    DEFAULT_REQUEST_DEADLINE_MS,
                )?,
            },
            server_port: parse_optional("SERVER_PORT")?,
            allowed_origins: load_env_optional("ALLOWED_ORIGINS").unwrap_or_else(|| "*".into()),
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

fn parse_duration_ms(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = parse_optional(key)?.unwrap_or(default);
    if value > MAX_DURATION_MS {
        return Err(ConfigError::InvalidValue(key.to_string()));
    }
    Ok(value)
}

/// Load configuration from `.env` and the process environment.
///
/// The returned value is immutable and is handed to the components that need it; nothing reads
/// the environment after this call.
pub fn load_config() -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        base_url = %config.provider.base_url,
        endpoint_path = %config.provider.endpoint_path,
        model = %config.inference.model,
        max_upload_bytes = config.limits.max_upload_bytes,
        max_input_tokens = config.limits.max_input_tokens,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const KEYS: [&str; 9] = [
        "INFERENCE_BASE_URL",
        "INFERENCE_API_KEY",
        "INFERENCE_DEFAULT_MODEL",
        "INFERENCE_TEMPERATURE",
        "INFERENCE_TIMEOUT_MS",
        "INFERENCE_RETRY_BACKOFF_MS",
        "REQUEST_DEADLINE_MS",
        "MAX_UPLOAD_BYTES",
        "SERVER_PORT",
    ];

    fn reset_env(values: &[(&str, &str)]) {
        for key in KEYS {
            // SAFETY: guarded by ENV_LOCK; no other test in this module touches the environment.
            unsafe { env::remove_var(key) }
        }
        for (key, value) in values {
            // SAFETY: see above.
            unsafe { env::set_var(key, value) }
        }
    }

    #[test]
    fn loads_required_values_and_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        reset_env(&[
            ("INFERENCE_BASE_URL", "https://provider.example"),
            ("INFERENCE_API_KEY", "sk-test"),
            ("INFERENCE_DEFAULT_MODEL", "tiny-model"),
        ]);

        let config = Config::from_env().expect("config");
        assert_eq!(config.provider.base_url, "https://provider.example");
        assert_eq!(config.provider.api_key.expose_secret(), "sk-test");
        assert_eq!(config.inference.model, "tiny-model");
        assert_eq!(config.limits.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(config.limits.max_retries, DEFAULT_MAX_RETRIES);
        assert!(config.server_port.is_none());
        assert_eq!(config.allowed_origins, "*");
    }

    #[test]
    fn rejects_missing_and_invalid_values() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        reset_env(&[("INFERENCE_BASE_URL", "https://provider.example")]);
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::MissingVariable(key)) if key == "INFERENCE_API_KEY"
        ));

        reset_env(&[
            ("INFERENCE_BASE_URL", "https://provider.example"),
            ("INFERENCE_API_KEY", "sk-test"),
            ("INFERENCE_DEFAULT_MODEL", "tiny-model"),
            ("INFERENCE_TEMPERATURE", "1.5"),
        ]);
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::InvalidValue(key)) if key == "INFERENCE_TEMPERATURE"
        ));

        reset_env(&[
            ("INFERENCE_BASE_URL", "not a url"),
            ("INFERENCE_API_KEY", "sk-test"),
            ("INFERENCE_DEFAULT_MODEL", "tiny-model"),
        ]);
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::InvalidValue(key)) if key == "INFERENCE_BASE_URL"
        ));
    }

    #[test]
    fn rejects_durations_beyond_one_day() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        for key in [
            "INFERENCE_TIMEOUT_MS",
            "INFERENCE_RETRY_BACKOFF_MS",
            "REQUEST_DEADLINE_MS",
        ] {
            reset_env(&[
                ("INFERENCE_BASE_URL", "https://provider.example"),
                ("INFERENCE_API_KEY", "sk-test"),
                ("INFERENCE_DEFAULT_MODEL", "tiny-model"),
                (key, "18446744073709551615"),
            ]);
            assert!(matches!(
                Config::from_env(),
                Err(ConfigError::InvalidValue(name)) if name == key
            ));
        }

        reset_env(&[
            ("INFERENCE_BASE_URL", "https://provider.example"),
            ("INFERENCE_API_KEY", "sk-test"),
            ("INFERENCE_DEFAULT_MODEL", "tiny-model"),
            ("REQUEST_DEADLINE_MS", "86400000"),
        ]);
        let config = Config::from_env().expect("config");
        assert_eq!(config.limits.request_deadline_ms, MAX_DURATION_MS);
    }

    #[test]
    fn debug_output_hides_credential() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        reset_env(&[
            ("INFERENCE_BASE_URL", "https://provider.example"),
            ("INFERENCE_API_KEY", "sk-very-secret"),
            ("INFERENCE_DEFAULT_MODEL", "tiny-model"),
        ]);
        let config = Config::from_env().expect("config");
        assert!(!format!("{config:?}").contains("sk-very-secret"));
    }
}
