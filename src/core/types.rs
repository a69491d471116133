// File: src/core/types.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An atomic unit of text. Tokens compare by exact string equality.
pub type Token = String;

/// Sentinel marking the start of an answer. Never produced by the tokenizer.
pub const BOS: &str = "<BOS>";
/// Sentinel marking the end of an answer.
pub const EOS: &str = "<EOS>";

pub fn is_sentinel(token: &str) -> bool {
    token == BOS || token == EOS
}

/// Candidate next tokens for one context, with their occurrence counts.
/// Ordered so that sampling with a fixed seed is reproducible.
pub type Successors = BTreeMap<Token, u64>;

/// A question/answer record produced by the corpus loader.
/// Both fields are non-empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

impl QaPair {
    /// Builds a pair from raw text, returning `None` when either side is blank.
    pub fn new(question: &str, answer: &str) -> Option<Self> {
        let question = question.trim();
        let answer = answer.trim();
        if question.is_empty() || answer.is_empty() {
            return None;
        }
        Some(Self {
            question: question.to_string(),
            answer: answer.to_string(),
        })
    }
}

/// One persisted row of the frequency table: `(w1..wN, next_token, count)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextWordStat {
    pub context: Vec<Token>,
    pub next_token: Token,
    pub count: u64,
}
