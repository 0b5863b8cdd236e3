//! Input budgeting: token counting and deterministic prefix truncation.
//!
//! The budget is measured with a `tiktoken-rs` encoding named directly (`cl100k_base`,
//! `o200k_base`, ...) or looked up from a model name. The special name `whitespace` selects a
//! plain word counter, which is also the fallback when the name resolves to no encoding.
//!
//! Truncation keeps the start of the document. The cut lands on a word boundary when the
//! kept prefix contains one, and the result always fits the budget, so truncating an already
//! truncated text returns it unchanged.

use std::sync::Arc;
use thiserror::Error;
use tiktoken_rs::{
    CoreBPE, cl100k_base, get_bpe_from_model, o200k_base, p50k_base, p50k_edit, r50k_base,
};

/// Counts budget units in a text segment.
pub type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// Name selecting the whitespace word counter.
pub const WHITESPACE_TOKENIZER: &str = "whitespace";

const DEFAULT_ENCODING: &str = "cl100k_base";

/// Failure to turn a tokenizer name into a BPE encoding.
#[derive(Debug, Error)]
pub enum TokenizerError {
    /// Neither an encoding name nor a model `tiktoken-rs` knows.
    #[error("unknown tokenizer '{0}'")]
    Unknown(String),
    /// The encoding exists but its ranks failed to load.
    #[error("failed to load encoding '{name}': {source}")]
    Load {
        /// Encoding name that failed to load.
        name: String,
        /// Underlying load error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Outcome of fitting a text into the input budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Truncation {
    /// Text to submit.
    pub text: String,
    /// Whether any of the input was dropped.
    pub truncated: bool,
    /// Budget units in `text`.
    pub tokens: usize,
}

/// Fits text into a fixed token budget.
#[derive(Clone)]
pub struct Truncator {
    budget: usize,
    counter: TokenCounter,
}

impl std::fmt::Debug for Truncator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Truncator")
            .field("budget", &self.budget)
            .finish_non_exhaustive()
    }
}

impl Truncator {
    /// Build a truncator measuring with the named tokenizer.
    pub fn for_tokenizer(tokenizer: &str, budget: usize) -> Self {
        Self::with_counter(budget, build_token_counter(tokenizer))
    }

    /// Build a truncator around an explicit counter.
    pub fn with_counter(budget: usize, counter: TokenCounter) -> Self {
        Self { budget, counter }
    }

    /// Configured budget.
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Count budget units in `text`.
    pub fn count(&self, text: &str) -> usize {
        self.counter.as_ref()(text)
    }

    fn fits(&self, text: &str) -> bool {
        self.count(text) <= self.budget
    }

    /// Return the longest word-aligned prefix of `text` that fits the budget.
    pub fn truncate(&self, text: &str) -> Truncation {
        let total = self.count(text);
        if total <= self.budget {
            return Truncation {
                text: text.to_string(),
                truncated: false,
                tokens: total,
            };
        }

        let cut = self.longest_fitting_prefix(text);
        let mut prefix = &text[..cut];
        let splits_word = text[cut..]
            .chars()
            .next()
            .is_some_and(|next| !next.is_whitespace());
        if splits_word && let Some(index) = prefix.rfind(char::is_whitespace) {
            prefix = &prefix[..index];
        }

        let mut kept = prefix.trim_end();
        while !kept.is_empty() && !self.fits(kept) {
            let last = floor_char_boundary(kept, kept.len() - 1);
            kept = kept[..last].trim_end();
        }

        let tokens = self.count(kept);
        tracing::debug!(
            budget = self.budget,
            original_tokens = total,
            kept_tokens = tokens,
            kept_bytes = kept.len(),
            "Truncated input to budget"
        );
        Truncation {
            text: kept.to_string(),
            truncated: true,
            tokens,
        }
    }

    /// Binary search over char boundaries; `text` itself is known not to fit.
    fn longest_fitting_prefix(&self, text: &str) -> usize {
        let mut low = 0;
        let mut high = text.len();
        while high - low > 1 {
            let target = low + (high - low) / 2;
            let mut mid = floor_char_boundary(text, target);
            if mid <= low {
                mid = ceil_char_boundary(text, target);
            }
            if mid <= low || mid >= high {
                break;
            }
            if self.fits(&text[..mid]) {
                low = mid;
            } else {
                high = mid;
            }
        }
        low
    }
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Build a token counter for the named tokenizer.
///
/// A blank name selects `cl100k_base`. Names that load no encoding degrade to word counting.
pub fn build_token_counter(tokenizer: &str) -> TokenCounter {
    let name = match tokenizer.trim() {
        "" => DEFAULT_ENCODING,
        name => name,
    };
    if name.eq_ignore_ascii_case(WHITESPACE_TOKENIZER) {
        return Arc::new(count_words);
    }
    match load_encoding(name) {
        Ok(encoding) => {
            let encoding = Arc::new(encoding);
            Arc::new(move |segment: &str| encoding.encode_ordinary(segment).len())
        }
        Err(error) => {
            tracing::warn!(
                tokenizer = name,
                error = %error,
                "Counting input budget in words"
            );
            Arc::new(count_words)
        }
    }
}

/// Load the BPE encoding for an encoding name or a model name.
pub fn load_encoding(name: &str) -> Result<CoreBPE, TokenizerError> {
    let loaded = match name {
        "cl100k_base" => cl100k_base(),
        "o200k_base" => o200k_base(),
        "p50k_base" => p50k_base(),
        "p50k_edit" => p50k_edit(),
        "r50k_base" | "gpt2" => r50k_base(),
        model => {
            return get_bpe_from_model(model)
                .map_err(|_| TokenizerError::Unknown(model.to_string()));
        }
    };
    loaded.map_err(|source| TokenizerError::Load {
        name: name.to_string(),
        source: source.into(),
    })
}

fn count_words(segment: &str) -> usize {
    segment.split_whitespace().count()
}
