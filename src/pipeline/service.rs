//! Upload orchestration: validation, extraction, budgeting, and inference with bounded retry.

use crate::{
    config::{Config, InferenceDefaults, MAX_DURATION_MS, PipelineLimits},
    extraction::{
        ExtractedText, ExtractionError, PdfExtractor, TextExtractor, normalize_page_text,
    },
    inference::{
        ClientSetupError, HttpInferenceClient, InferenceClient, InferenceError, InferenceOptions,
        InferenceOutput, InferenceRequest, ProviderHealth,
    },
    metrics::{MetricsSnapshot, PipelineMetrics},
    pipeline::{
        truncate::Truncator,
        types::{Completion, PipelineError, RequestState, UploadOptions},
    },
};
use async_trait::async_trait;
use axum::body::Bytes;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Abstraction over the pipeline used by the HTTP surface.
#[async_trait]
pub trait PipelineApi: Send + Sync {
    /// Run an upload through extraction and inference.
    async fn handle_upload(
        &self,
        bytes: Bytes,
        options: UploadOptions,
    ) -> Result<Completion, PipelineError>;

    /// Run caller-supplied text through normalization, budgeting, and inference.
    async fn handle_text(
        &self,
        text: String,
        options: UploadOptions,
    ) -> Result<Completion, PipelineError>;

    /// Validate and extract an upload without calling the provider.
    async fn extract_upload(&self, bytes: Bytes) -> Result<ExtractedText, PipelineError>;

    /// Check whether the inference provider is reachable.
    async fn provider_health(&self) -> ProviderHealth;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Composes a [`TextExtractor`] and an [`InferenceClient`] into the upload pipeline.
///
/// Holds only read-only configuration and atomic counters, so one instance is shared across
/// all requests through an `Arc`. Dropping the future returned by
/// [`PipelineApi::handle_upload`] (for example when the HTTP client disconnects) drops the
/// in-flight provider call with it.
pub struct PipelineService<E = PdfExtractor, C = HttpInferenceClient> {
    extractor: Arc<E>,
    client: C,
    defaults: InferenceDefaults,
    limits: PipelineLimits,
    truncator: Truncator,
    metrics: PipelineMetrics,
}

impl PipelineService {
    /// Build the production pipeline from process configuration.
    pub fn from_config(config: &Config) -> Result<Self, ClientSetupError> {
        tracing::info!("Initializing inference client");
        let client = HttpInferenceClient::new(&config.provider)?;
        Ok(Self::new(
            PdfExtractor::new(),
            client,
            config.inference.clone(),
            config.limits.clone(),
        ))
    }
}

impl<E, C> PipelineService<E, C>
where
    E: TextExtractor + 'static,
    C: InferenceClient,
{
    /// Assemble a pipeline from explicit parts.
    pub fn new(extractor: E, client: C, defaults: InferenceDefaults, limits: PipelineLimits) -> Self {
        let truncator = Truncator::for_tokenizer(&limits.tokenizer, limits.max_input_tokens);
        tracing::debug!(
            tokenizer = %limits.tokenizer,
            budget = limits.max_input_tokens,
            max_upload_bytes = limits.max_upload_bytes,
            max_retries = limits.max_retries,
            "Pipeline ready"
        );
        Self {
            extractor: Arc::new(extractor),
            client,
            defaults,
            limits,
            truncator,
            metrics: PipelineMetrics::new(),
        }
    }

    fn validate_size(&self, bytes: &Bytes) -> Result<(), PipelineError> {
        if bytes.is_empty() {
            return Err(PipelineError::EmptyUpload);
        }
        if bytes.len() > self.limits.max_upload_bytes {
            return Err(PipelineError::PayloadTooLarge {
                size: bytes.len(),
                limit: self.limits.max_upload_bytes,
            });
        }
        Ok(())
    }

    async fn extract(&self, bytes: Bytes) -> Result<ExtractedText, ExtractionError> {
        let extractor = Arc::clone(&self.extractor);
        tokio::task::spawn_blocking(move || extractor.extract(&bytes))
            .await
            .map_err(|error| ExtractionError::Worker(error.to_string()))?
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.limits.retry_backoff_ms.saturating_mul(factor))
    }

    /// Call the provider, retrying retryable failures within the request deadline.
    ///
    /// The deadline is capped at [`MAX_DURATION_MS`].
    async fn infer_with_retry(
        &self,
        request: InferenceRequest,
    ) -> Result<(InferenceOutput, u32), PipelineError> {
        let budget = Duration::from_millis(self.limits.request_deadline_ms.min(MAX_DURATION_MS));
        let deadline = Instant::now().checked_add(budget);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let remaining = remaining_until(deadline);
            if remaining.is_zero() {
                return Err(PipelineError::Inference {
                    source: InferenceError::Timeout {
                        timeout_ms: self.limits.request_deadline_ms,
                    },
                    attempts: attempt - 1,
                });
            }

            let mut attempt_request = request.clone();
            let remaining_ms = u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX).max(1);
            attempt_request.options.timeout_ms = attempt_request.options.timeout_ms.min(remaining_ms);

            match self.client.infer(attempt_request).await {
                Ok(output) => return Ok((output, attempt)),
                Err(error) if error.is_retryable() && attempt <= self.limits.max_retries => {
                    let backoff = self.backoff(attempt);
                    if backoff >= remaining_until(deadline) {
                        tracing::warn!(
                            attempt,
                            error = %error,
                            "Retry would overrun the request deadline; giving up"
                        );
                        return Err(PipelineError::Inference {
                            source: error,
                            attempts: attempt,
                        });
                    }
                    tracing::warn!(
                        attempt,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        kind = error.kind(),
                        error = %error,
                        "Retryable inference failure"
                    );
                    self.metrics.record_retry();
                    tokio::time::sleep(backoff).await;
                }
                Err(error) => {
                    return Err(PipelineError::Inference {
                        source: error,
                        attempts: attempt,
                    });
                }
            }
        }
    }

    async fn run_upload(
        &self,
        bytes: Bytes,
        options: UploadOptions,
    ) -> Result<Completion, PipelineError> {
        let state = RequestState::Received;
        if let Err(error) = self.validate_size(&bytes) {
            return Err(self.reject(error));
        }
        let inference_options = self.resolve_options(&options)?;

        tracing::info!(
            sha256 = %hex::encode(Sha256::digest(&bytes)),
            "Upload accepted"
        );
        let state = transition(state, RequestState::Extracting);
        let extracted = match self.extract(bytes).await {
            Ok(extracted) => extracted,
            Err(error) => {
                transition(state, RequestState::ExtractionFailed);
                self.metrics.record_extraction_failed();
                tracing::warn!(error = %error, "Extraction failed");
                return Err(error.into());
            }
        };
        let state = transition(state, RequestState::Extracted);

        let page_count = extracted.page_count();
        let failed_pages = extracted.failed_pages();
        let request = PreparedText {
            text: extracted.into_text(),
            page_count,
            failed_pages,
        };
        self.complete(state, request, inference_options, options.instructions())
            .await
    }

    async fn run_text(
        &self,
        text: String,
        options: UploadOptions,
    ) -> Result<Completion, PipelineError> {
        let state = RequestState::Received;
        if text.len() > self.limits.max_upload_bytes {
            return Err(self.reject(PipelineError::PayloadTooLarge {
                size: text.len(),
                limit: self.limits.max_upload_bytes,
            }));
        }
        let normalized = normalize_page_text(&text);
        if normalized.is_empty() {
            return Err(self.reject(PipelineError::EmptyText));
        }
        let inference_options = self.resolve_options(&options)?;

        // Submitted text skips extraction and enters the lifecycle already extracted.
        let state = transition(state, RequestState::Extracted);
        let request = PreparedText {
            text: normalized,
            page_count: 0,
            failed_pages: 0,
        };
        self.complete(state, request, inference_options, options.instructions())
            .await
    }

    fn reject(&self, error: PipelineError) -> PipelineError {
        self.metrics.record_rejected();
        tracing::warn!(error = %error, "Upload rejected");
        error
    }

    fn resolve_options(&self, options: &UploadOptions) -> Result<InferenceOptions, PipelineError> {
        InferenceOptions::resolve(&self.defaults, options.overrides())
            .map_err(|error| self.reject(error.into()))
    }

    /// Fit extracted text into the input budget and run it through the provider.
    async fn complete(
        &self,
        state: RequestState,
        prepared: PreparedText,
        inference_options: InferenceOptions,
        instructions: Option<String>,
    ) -> Result<Completion, PipelineError> {
        let PreparedText {
            text,
            page_count,
            failed_pages,
        } = prepared;
        let budgeted = self.truncator.truncate(&text);
        drop(text);
        if budgeted.text.is_empty() {
            transition(state, RequestState::InferenceFailed);
            self.metrics.record_inference_failed();
            let error = PipelineError::InputBudgetExceeded {
                budget: self.truncator.budget(),
            };
            tracing::warn!(error = %error, "Nothing fits the input budget");
            return Err(error);
        }
        if budgeted.truncated {
            tracing::info!(
                budget = self.truncator.budget(),
                kept_tokens = budgeted.tokens,
                "Document text truncated to input budget"
            );
        }

        let state = transition(state, RequestState::Inferring);
        let request = InferenceRequest {
            input: budgeted.text,
            instructions,
            options: inference_options,
        };
        let (output, attempts) = match self.infer_with_retry(request).await {
            Ok(result) => result,
            Err(error) => {
                transition(state, RequestState::InferenceFailed);
                self.metrics.record_inference_failed();
                tracing::warn!(kind = error.kind(), error = %error, "Inference failed");
                return Err(error);
            }
        };
        transition(state, RequestState::Completed);
        self.metrics.record_completed(budgeted.truncated);

        tracing::info!(
            model = %output.model,
            pages = page_count,
            failed_pages,
            truncated = budgeted.truncated,
            attempts,
            "Request completed"
        );
        Ok(Completion {
            text: output.text,
            model: output.model,
            usage: output.usage,
            page_count,
            failed_pages,
            truncated: budgeted.truncated,
            input_tokens: budgeted.tokens,
            attempts,
        })
    }
}

struct PreparedText {
    text: String,
    page_count: usize,
    failed_pages: usize,
}

fn remaining_until(deadline: Option<Instant>) -> Duration {
    deadline.map_or(Duration::MAX, |deadline| {
        deadline.saturating_duration_since(Instant::now())
    })
}

fn transition(from: RequestState, to: RequestState) -> RequestState {
    tracing::debug!(from = from.as_str(), to = to.as_str(), "Request state change");
    to
}

#[async_trait]
impl<E, C> PipelineApi for PipelineService<E, C>
where
    E: TextExtractor + 'static,
    C: InferenceClient,
{
    async fn handle_upload(
        &self,
        bytes: Bytes,
        options: UploadOptions,
    ) -> Result<Completion, PipelineError> {
        let span = tracing::info_span!("upload", request_id = %Uuid::new_v4(), size = bytes.len());
        self.run_upload(bytes, options).instrument(span).await
    }

    async fn handle_text(
        &self,
        text: String,
        options: UploadOptions,
    ) -> Result<Completion, PipelineError> {
        let span = tracing::info_span!("text", request_id = %Uuid::new_v4(), size = text.len());
        self.run_text(text, options).instrument(span).await
    }

    async fn extract_upload(&self, bytes: Bytes) -> Result<ExtractedText, PipelineError> {
        let span = tracing::info_span!("extract", request_id = %Uuid::new_v4(), size = bytes.len());
        async {
            if let Err(error) = self.validate_size(&bytes) {
                self.metrics.record_rejected();
                return Err(error);
            }
            self.extract(bytes).await.map_err(|error| {
                self.metrics.record_extraction_failed();
                tracing::warn!(error = %error, "Extraction failed");
                PipelineError::from(error)
            })
        }
        .instrument(span)
        .await
    }

    async fn provider_health(&self) -> ProviderHealth {
        self.client.health().await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
