use std::sync::LazyLock;
use tiktoken_rs::{CoreBPE, cl100k_base};
use tracing::warn;

/// Counts tokens in arbitrary text.
pub trait TokenCounter: Send + Sync {
    fn count_tokens(&self, text: &str) -> u64;
}

static TOKENIZER: LazyLock<Option<CoreBPE>> = LazyLock::new(|| match cl100k_base() {
    Ok(bpe) => Some(bpe),
    Err(e) => {
        warn!("cl100k_base tokenizer unavailable, estimating from length: {e}");
        None
    }
});

/// BPE counter using the cl100k_base encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cl100kCounter;

impl TokenCounter for Cl100kCounter {
    fn count_tokens(&self, text: &str) -> u64 {
        match TOKENIZER.as_ref() {
            Some(bpe) => bpe.encode_with_special_tokens(text).len() as u64,
            None => estimate_tokens_by_length(text),
        }
    }
}

/// Rough count of one token per four characters.
pub fn estimate_tokens_by_length(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}
