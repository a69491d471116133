// File: src/generator.rs
// Lazy token generation over a trained frequency table.

use crate::core::context::Context;
use crate::core::types::{is_sentinel, Token, EOS};
use crate::error::{ChatError, Result};
use crate::sampling::Sampler;
use crate::store::FrequencyStore;
use serde::{Deserialize, Serialize};
use std::iter::FusedIterator;
use tracing::trace;

/// Per-request generation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Upper bound on generation steps (and so on emitted tokens).
    pub max_len: usize,
    pub temperature: f64,
    /// Fixed RNG seed; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_len: 30,
            temperature: 0.8,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    Running,
    Done,
}

/// Why a generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The end marker was sampled.
    Eos,
    /// The current context has no recorded successors.
    UnknownContext,
    /// `max_len` steps were taken.
    MaxLength,
}

/// Produces tokens one step at a time from a seed token.
///
/// Each step emits the last token of the current context, then samples a
/// successor and shifts the window. Generation ends on `<EOS>`, on a context
/// the store has never seen, or after `max_len` steps. A generator is
/// single-use; build a new one per request.
pub struct Generator<'s, S: FrequencyStore + ?Sized> {
    store: &'s S,
    context: Context,
    sampler: Sampler,
    max_len: usize,
    steps: usize,
    state: GeneratorState,
    finish_reason: Option<FinishReason>,
}

impl<'s, S: FrequencyStore + ?Sized> Generator<'s, S> {
    /// Fails with `InvalidTemperature` before any sampling happens.
    pub fn new(store: &'s S, seed_token: &str, params: GenerationParams) -> Result<Self> {
        let sampler = match params.seed {
            Some(seed) => Sampler::with_seed(params.temperature, seed)?,
            None => Sampler::new(params.temperature)?,
        };
        let mut generator = Self {
            store,
            context: Context::opening(store.order(), seed_token),
            sampler,
            max_len: params.max_len,
            steps: 0,
            state: GeneratorState::Running,
            finish_reason: None,
        };
        if seed_token == EOS {
            generator.finish(FinishReason::Eos);
        }
        Ok(generator)
    }

    pub fn state(&self) -> GeneratorState {
        self.state
    }

    /// Set once the generator is done.
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    fn finish(&mut self, reason: FinishReason) {
        self.state = GeneratorState::Done;
        self.finish_reason = Some(reason);
    }

    /// Advances one step, returning the token produced by it (if any).
    fn step(&mut self) -> Option<Token> {
        let current = self.context.last().map(str::to_string)?;
        self.steps += 1;

        match self.sampler.sample(self.store, &self.context) {
            Ok(next) if next == EOS => self.finish(FinishReason::Eos),
            Ok(next) => self.context.shift(next),
            Err(ChatError::UnknownContext(context)) => {
                trace!(%context, "no successors, stopping");
                self.finish(FinishReason::UnknownContext);
            }
            // Temperature was checked in `new`; nothing else can fail here.
            Err(_) => self.finish(FinishReason::UnknownContext),
        }

        Some(current)
    }
}

impl<S: FrequencyStore + ?Sized> Iterator for Generator<'_, S> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        while self.state == GeneratorState::Running {
            if self.steps >= self.max_len {
                self.finish(FinishReason::MaxLength);
                return None;
            }
            match self.step() {
                Some(token) if !is_sentinel(&token) => return Some(token),
                Some(_) => continue,
                None => self.finish(FinishReason::UnknownContext),
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.state {
            GeneratorState::Done => (0, Some(0)),
            GeneratorState::Running => (0, Some(self.max_len.saturating_sub(self.steps))),
        }
    }
}

impl<S: FrequencyStore + ?Sized> FusedIterator for Generator<'_, S> {}
