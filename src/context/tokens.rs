//! Prompt Token Accounting
//!
//! Counts tokens with the cl100k_base encoding so deduplication savings can
//! be reported in the unit the model is billed and limited in.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use tiktoken_rs::cl100k_base;

/// Maximum number of cached counts before the cache is halved
const TOKEN_CACHE_CAPACITY: usize = 4096;

/// Global token cache to avoid recounting identical content
static TOKEN_CACHE: RwLock<Option<TokenCache>> = RwLock::new(None);

/// Cache for token counts, keyed by content hash
struct TokenCache {
    counts: HashMap<u64, u32>,
    capacity: usize,
}

impl TokenCache {
    fn new(capacity: usize) -> Self {
        Self {
            counts: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    fn insert(&mut self, hash: u64, count: u32) {
        if self.counts.len() >= self.capacity {
            let evict: Vec<u64> = self.counts.keys().take(self.capacity / 2).copied().collect();
            for key in evict {
                self.counts.remove(&key);
            }
        }
        self.counts.insert(hash, count);
    }
}

fn hash_content(content: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

/// Count tokens in text using cl100k_base encoding.
///
/// Falls back to [`estimate_tokens_quick`] if the encoder cannot be built.
pub fn count_tokens(text: &str) -> u32 {
    if text.is_empty() {
        return 0;
    }

    let key = hash_content(text);
    if let Some(count) = TOKEN_CACHE.read().as_ref().and_then(|c| c.counts.get(&key).copied()) {
        return count;
    }

    let count = match cl100k_base() {
        Ok(bpe) => bpe.encode_with_special_tokens(text).len() as u32,
        Err(_) => return estimate_tokens_quick(text),
    };

    TOKEN_CACHE
        .write()
        .get_or_insert_with(|| TokenCache::new(TOKEN_CACHE_CAPACITY))
        .insert(key, count);
    count
}

/// Rough estimate at ~4 bytes per token; no encoder, no cache
pub fn estimate_tokens_quick(text: &str) -> u32 {
    (text.len() as f64 / 4.0).ceil() as u32
}

/// Token counts of a context before and after cleanup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSavings {
    pub before: u32,
    pub after: u32,
}

impl TokenSavings {
    pub fn measure(before: &str, after: &str) -> Self {
        Self {
            before: count_tokens(before),
            after: count_tokens(after),
        }
    }

    pub fn saved(&self) -> u32 {
        self.before.saturating_sub(self.after)
    }
}
