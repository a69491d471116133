// File: src/store.rs
use crate::core::context::Context;
use crate::core::types::{is_sentinel, NextWordStat, Successors, Token};
use crate::error::{ChatError, Result};
use rand::RngCore;
use rand::seq::SliceRandom;
use std::collections::HashMap;

/// A context-keyed counting table: `context -> next token -> count`.
///
/// Backends differ only in where the table lives. Reads take `&self` and
/// never mutate, so a trained store can be shared across threads without
/// locking.
pub trait FrequencyStore: Send + Sync {
    /// Number of tokens in every context key.
    fn order(&self) -> usize;

    /// Inserts `(context, next)` with count 1, or adds 1 to an existing row.
    fn upsert_increment(&mut self, context: &Context, next: &str) -> Result<()>;

    /// Candidate successors of `context`, or `None` if it was never observed.
    fn lookup(&self, context: &Context) -> Option<&Successors>;

    fn iter(&self) -> Box<dyn Iterator<Item = (&Context, &Successors)> + '_>;

    /// Tokens that open at least one known context, in the order their
    /// contexts were first seen. Kept up to date by `upsert_increment`.
    fn openers(&self) -> &[Token];

    fn context_count(&self) -> usize {
        self.iter().count()
    }

    /// Total number of times `context` was observed during training.
    fn observations(&self, context: &Context) -> u64 {
        self.lookup(context).map_or(0, |s| s.values().sum())
    }

    /// Every row of the table, flattened.
    fn stats(&self) -> Vec<NextWordStat> {
        self.iter()
            .flat_map(|(context, successors)| {
                successors.iter().map(move |(next, &count)| NextWordStat {
                    context: context.to_vec(),
                    next_token: next.clone(),
                    count,
                })
            })
            .collect()
    }

    /// One of [`openers`](FrequencyStore::openers), picked at random.
    fn random_seed(&self, rng: &mut dyn RngCore) -> Option<Token> {
        self.openers().choose(rng).cloned()
    }
}

/// The token `context` opens an answer with, if it is an opening context.
pub(crate) fn opener(context: &Context) -> Option<&str> {
    if !context.is_opening() {
        return None;
    }
    context.last().filter(|token| !is_sentinel(token))
}

pub(crate) fn check_order(expected: usize, context: &Context) -> Result<()> {
    if context.len() != expected {
        return Err(ChatError::OrderMismatch {
            expected,
            found: context.len(),
        });
    }
    Ok(())
}

pub(crate) fn increment(successors: &mut Successors, next: &str) {
    match successors.get_mut(next) {
        Some(count) => *count += 1,
        None => {
            successors.insert(next.to_string(), 1);
        }
    }
}

/// Unbounded in-memory table. Used for the single-order chat variant and
/// for tests; nothing is written to disk.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    order: usize,
    table: HashMap<Context, Successors>,
    openers: Vec<Token>,
}

impl MemoryStore {
    pub fn new(order: usize) -> Self {
        Self {
            order,
            table: HashMap::new(),
            openers: Vec::new(),
        }
    }
}

impl FrequencyStore for MemoryStore {
    fn order(&self) -> usize {
        self.order
    }

    fn upsert_increment(&mut self, context: &Context, next: &str) -> Result<()> {
        check_order(self.order, context)?;
        match self.table.get_mut(context) {
            Some(successors) => increment(successors, next),
            None => {
                let mut successors = Successors::new();
                increment(&mut successors, next);
                self.table.insert(context.clone(), successors);
                if let Some(token) = opener(context) {
                    self.openers.push(token.to_string());
                }
            }
        }
        Ok(())
    }

    fn lookup(&self, context: &Context) -> Option<&Successors> {
        self.table.get(context)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = (&Context, &Successors)> + '_> {
        Box::new(self.table.iter())
    }

    fn openers(&self) -> &[Token] {
        &self.openers
    }

    fn context_count(&self) -> usize {
        self.table.len()
    }
}
