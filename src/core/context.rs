// File: src/core/context.rs
use crate::core::types::{Token, BOS};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// A fixed-width, ordered window over the most recent tokens.
/// Two contexts are equal only if every position matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Context {
    window: VecDeque<Token>,
}

impl Context {
    pub fn new<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Token>,
    {
        Self {
            window: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// The context a generation starts from: `order - 1` begin markers
    /// followed by the seed token.
    pub fn opening(order: usize, seed: &str) -> Self {
        let mut window = VecDeque::with_capacity(order);
        for _ in 1..order {
            window.push_back(BOS.to_string());
        }
        window.push_back(seed.to_string());
        Self { window }
    }

    /// Appends a token and drops the oldest one, keeping the width fixed.
    /// O(1) amortized complexity.
    pub fn shift(&mut self, token: Token) {
        if self.window.is_empty() {
            return;
        }
        self.window.pop_front();
        self.window.push_back(token);
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn last(&self) -> Option<&str> {
        self.window.back().map(String::as_str)
    }

    /// True when every position but the last is a begin marker, i.e. the
    /// context can open an answer.
    pub fn is_opening(&self) -> bool {
        let n = self.window.len();
        self.window.iter().take(n.saturating_sub(1)).all(|t| t == BOS)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.window.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<Token> {
        self.window.iter().cloned().collect()
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, token) in self.window.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{token}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_pads_with_begin_markers() {
        let ctx = Context::opening(3, "좋아요");
        assert_eq!(ctx.to_vec(), vec![BOS, BOS, "좋아요"]);
        assert!(ctx.is_opening());

        let unigram = Context::opening(1, "안녕");
        assert_eq!(unigram.to_vec(), vec!["안녕"]);
        assert!(unigram.is_opening());
    }

    #[test]
    fn shift_drops_oldest() {
        let mut ctx = Context::opening(3, "a");
        ctx.shift("b".into());
        assert_eq!(ctx.to_vec(), vec![BOS, "a", "b"]);
        assert!(!ctx.is_opening());
        ctx.shift("c".into());
        assert_eq!(ctx.to_vec(), vec!["a", "b", "c"]);
        assert_eq!(ctx.last(), Some("c"));
        assert_eq!(ctx.len(), 3);
    }

    #[test]
    fn order_matters_for_equality() {
        assert_ne!(Context::new(["a", "b"]), Context::new(["b", "a"]));
        assert_eq!(Context::new(["a", "b"]), Context::new(["a", "b"]));
    }

    #[test]
    fn display_lists_tokens() {
        assert_eq!(Context::new(["x", "y"]).to_string(), "(x, y)");
    }
}
