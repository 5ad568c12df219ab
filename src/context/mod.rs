//! Context Accounting Module
//!
//! Measures the prompt context handed to the summarizer.

pub mod tokens;

pub use tokens::{count_tokens, estimate_tokens_quick, TokenSavings};
