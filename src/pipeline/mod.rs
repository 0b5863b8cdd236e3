//! Request orchestration for uploaded documents.
//!
//! [`PipelineService`] validates an upload, extracts its text layer off the async workers, fits
//! the text into the input budget and calls the inference provider with bounded retry. The
//! HTTP layer only sees the [`PipelineApi`] trait so it can be exercised with stubs.

mod service;
pub mod truncate;
mod types;

pub use service::{PipelineApi, PipelineService};
pub use truncate::{Truncation, Truncator};
pub use types::{Completion, PipelineError, RequestState, UploadOptions};
