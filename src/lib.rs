// File: src/lib.rs

pub mod config;
pub mod core;
pub mod corpus;
pub mod error;
pub mod generator;
pub mod learning;
pub mod persistence;
pub mod sampling;
pub mod service;
pub mod store;

pub use crate::core::engine::ChatEngine;
pub use crate::error::{ChatError, Result};
