#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use pdfinfer::config::{InferenceDefaults, PipelineLimits, ProviderConfig};
use pdfinfer::extraction::PdfExtractor;
use pdfinfer::inference::HttpInferenceClient;
use pdfinfer::pipeline::PipelineService;
use secrecy::SecretString;

pub const API_KEY: &str = "integration-key";

/// Build an in-memory PDF with one Courier text line per page.
pub fn text_pdf(pages: &[&str]) -> Vec<u8> {
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();
    let font_id = document.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = document.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let kids: Vec<Object> = pages
        .iter()
        .map(|text| {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = document.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("encode content"),
            ));
            document
                .add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "Contents" => content_id,
                    "Resources" => resources_id,
                })
                .into()
        })
        .collect();

    let count = kids.len() as i64;
    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    document.save_to(&mut buffer).expect("save pdf");
    buffer
}

pub fn limits(max_upload_bytes: usize) -> PipelineLimits {
    PipelineLimits {
        max_upload_bytes,
        max_input_tokens: 1_000,
        tokenizer: "whitespace".into(),
        max_retries: 2,
        retry_backoff_ms: 5,
        request_deadline_ms: 10_000,
    }
}

/// Production pipeline pointed at `base_url`.
pub fn pipeline(base_url: &str, limits: PipelineLimits) -> PipelineService {
    let provider = ProviderConfig {
        base_url: base_url.to_string(),
        endpoint_path: "generate".into(),
        api_key: SecretString::from(API_KEY.to_string()),
    };
    let defaults = InferenceDefaults {
        model: "test-model".into(),
        max_output_tokens: 64,
        temperature: 0.2,
        timeout_ms: 2_000,
    };
    let client = HttpInferenceClient::new(&provider).expect("client");
    PipelineService::new(PdfExtractor::new(), client, defaults, limits)
}
