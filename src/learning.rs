// File: src/learning.rs
use crate::core::context::Context;
use crate::core::tokenizer::Tokenizer;
use crate::core::types::{QaPair, Token, BOS, EOS};
use crate::error::{ChatError, Result};
use crate::store::FrequencyStore;
use tracing::{debug, info};

const PROGRESS_EVERY: usize = 100_000;

/// Counts what a training run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrainReport {
    pub pairs: usize,
    pub windows: usize,
}

/// Builds the frequency table from answers.
///
/// Each answer becomes `<BOS> x order, tokens..., <EOS>`; every window of
/// `order + 1` tokens adds one to `(first order tokens) -> last token`.
/// Questions are not modeled.
pub struct Trainer {
    order: usize,
    tokenizer: Tokenizer,
}

impl Trainer {
    pub fn new(order: usize) -> Self {
        Self {
            order,
            tokenizer: Tokenizer::default(),
        }
    }

    pub fn with_tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// The sentinel-wrapped token sequence that training slides over.
    pub fn wrap(&self, answer: &str) -> Vec<Token> {
        let mut tokens: Vec<Token> = vec![BOS.to_string(); self.order];
        tokens.extend(self.tokenizer.tokenize(answer));
        tokens.push(EOS.to_string());
        tokens
    }

    pub fn train<S>(&self, store: &mut S, pairs: &[QaPair]) -> Result<TrainReport>
    where
        S: FrequencyStore + ?Sized,
    {
        if store.order() != self.order {
            return Err(ChatError::OrderMismatch {
                expected: store.order(),
                found: self.order,
            });
        }

        let mut report = TrainReport::default();
        for pair in pairs {
            report.windows += self.learn(store, &pair.answer)?;
            report.pairs += 1;
            if report.pairs % PROGRESS_EVERY == 0 {
                info!(pairs = report.pairs, windows = report.windows, "training progress");
            }
        }

        info!(
            pairs = report.pairs,
            windows = report.windows,
            contexts = store.context_count(),
            "training complete"
        );
        Ok(report)
    }

    /// Adds one answer to the table, returning the number of windows counted.
    pub fn learn<S>(&self, store: &mut S, answer: &str) -> Result<usize>
    where
        S: FrequencyStore + ?Sized,
    {
        let tokens = self.wrap(answer);
        let mut windows = 0;
        for window in tokens.windows(self.order + 1) {
            let context = Context::new(window[..self.order].iter().cloned());
            store.upsert_increment(&context, &window[self.order])?;
            windows += 1;
        }
        debug!(windows, "learned answer");
        Ok(windows)
    }
}
