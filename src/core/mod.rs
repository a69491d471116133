// File: src/core/mod.rs

pub mod context;
pub mod engine;
pub mod tokenizer;
pub mod types;
