#![deny(missing_docs)]

//! Core library for the pdfinfer upload service.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// PDF text-layer extraction.
pub mod extraction;
/// Remote inference provider client.
pub mod inference;
/// Structured logging and tracing setup.
pub mod logging;
/// Pipeline metrics helpers.
pub mod metrics;
/// Upload orchestration.
pub mod pipeline;
