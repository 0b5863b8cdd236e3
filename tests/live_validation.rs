mod common;

use axum::body::Bytes;
use pdfinfer::{
    config,
    pipeline::{PipelineApi, PipelineService, UploadOptions},
};

#[tokio::test]
#[ignore = "Requires a live inference provider configured through the environment"]
async fn live_provider_health_snapshot() {
    let config = config::load_config().expect("configuration");
    let service = PipelineService::from_config(&config).expect("pipeline");
    let health = service.provider_health().await;
    assert!(health.reachable, "provider should be reachable: {health:?}");
}

#[tokio::test]
#[ignore = "Requires a live inference provider configured through the environment"]
async fn live_provider_generates_text_for_pdf() {
    let config = config::load_config().expect("configuration");
    let service = PipelineService::from_config(&config).expect("pipeline");
    let completion = service
        .handle_upload(
            Bytes::from(common::text_pdf(&["Hello", "World"])),
            UploadOptions::default(),
        )
        .await
        .expect("completion");
    assert!(!completion.text.trim().is_empty(), "empty generation");
    assert_eq!(completion.page_count, 2);
}
