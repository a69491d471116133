// File: src/core/tokenizer.rs
use crate::core::types::{is_sentinel, Token};
use serde::{Deserialize, Serialize};

/// Punctuation marks kept as standalone tokens.
pub const PUNCTUATION: [char; 4] = [',', '.', '!', '?'];

pub fn is_punctuation(token: &str) -> bool {
    let mut chars = token.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if PUNCTUATION.contains(&c))
}

/// Which characters count as word characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Script {
    /// Precomposed Hangul syllables (U+AC00..=U+D7A3).
    #[default]
    Hangul,
    /// Any alphanumeric character or underscore.
    Unicode,
}

impl Script {
    fn is_word_char(self, c: char) -> bool {
        match self {
            Script::Hangul => ('\u{AC00}'..='\u{D7A3}').contains(&c),
            Script::Unicode => c.is_alphanumeric() || c == '_',
        }
    }
}

/// Splits text into maximal word runs and single punctuation marks.
/// Everything else is a separator and is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tokenizer {
    script: Script,
}

impl Tokenizer {
    pub fn new(script: Script) -> Self {
        Self { script }
    }

    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut word = String::new();

        for c in text.chars() {
            if self.script.is_word_char(c) {
                word.push(c);
                continue;
            }
            if !word.is_empty() {
                tokens.push(std::mem::take(&mut word));
            }
            if PUNCTUATION.contains(&c) {
                tokens.push(c.to_string());
            }
        }
        if !word.is_empty() {
            tokens.push(word);
        }
        tokens
    }
}

/// Tokenizes with the default (Hangul) script.
pub fn tokenize(text: &str) -> Vec<Token> {
    Tokenizer::default().tokenize(text)
}

/// Rebuilds display text from generated tokens, one token at a time.
///
/// Punctuation attaches to the preceding text; other tokens get a single
/// leading space, except the very first. Sentinels are never rendered.
#[derive(Debug, Default, Clone)]
pub struct Detokenizer {
    text: String,
}

impl Detokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a token and returns the cumulative text so far.
    pub fn push(&mut self, token: &str) -> &str {
        if is_sentinel(token) || token.is_empty() {
            return &self.text;
        }
        if !self.text.is_empty() && !is_punctuation(token) {
            self.text.push(' ');
        }
        self.text.push_str(token);
        &self.text
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

pub fn detokenize<I, T>(tokens: I) -> String
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let mut detok = Detokenizer::new();
    for token in tokens {
        detok.push(token.as_ref());
    }
    detok.into_text()
}
