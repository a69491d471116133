// File: src/core/engine.rs
use crate::config::EngineConfig;
use crate::core::tokenizer::{detokenize, Tokenizer};
use crate::core::types::QaPair;
use crate::corpus::load_qa_pairs_from_path;
use crate::error::Result;
use crate::generator::{FinishReason, GenerationParams, Generator};
use crate::learning::{TrainReport, Trainer};
use crate::persistence::PersistentStore;
use crate::store::{FrequencyStore, MemoryStore};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tracing::{info, warn};

/// A finished, non-streamed reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub finish_reason: Option<FinishReason>,
}

// The engine owns one trained store and hands out generators over it.
// Once built, the store is only read, so clones of the engine (and of the
// `Arc` inside) can serve any number of requests at the same time.
#[derive(Clone)]
pub struct ChatEngine {
    store: Arc<dyn FrequencyStore>,
    tokenizer: Tokenizer,
    params: GenerationParams,
}

impl ChatEngine {
    pub fn new(store: Arc<dyn FrequencyStore>, tokenizer: Tokenizer, params: GenerationParams) -> Self {
        Self {
            store,
            tokenizer,
            params,
        }
    }

    /// Opens the model artifact if it exists, otherwise trains it from the
    /// corpus first. The returned engine only ever reads the store.
    pub fn from_file_or_train(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let store = if PersistentStore::exists(&config.model_path) {
            info!(path = %config.model_path.display(), "model found, skipping training");
            let store = PersistentStore::open(&config.model_path)?;
            if store.order() != config.order {
                warn!(
                    stored = store.order(),
                    configured = config.order,
                    "model order differs from configuration; using the stored order"
                );
            }
            store
        } else {
            info!(path = %config.model_path.display(), "no model found, training");
            let (store, _) = train_persistent(config)?;
            store
        };
        Ok(Self::new(
            Arc::new(store),
            Tokenizer::new(config.script),
            config.generation_params(),
        ))
    }

    /// Trains from scratch and replaces any existing artifact. The old file
    /// stays in place until the new table is fully written, so a failed
    /// retrain leaves it untouched.
    pub fn retrain(config: &EngineConfig) -> Result<(Self, TrainReport)> {
        config.validate()?;
        info!(path = %config.model_path.display(), "retraining");
        let (store, report) = train_persistent(config)?;
        let engine = Self::new(
            Arc::new(store),
            Tokenizer::new(config.script),
            config.generation_params(),
        );
        Ok((engine, report))
    }

    /// Trains an unsaved model. Order 1 gives the single-word chat variant.
    pub fn in_memory(pairs: &[QaPair], order: usize, params: GenerationParams) -> Result<Self> {
        let mut store = MemoryStore::new(order);
        Trainer::new(order).train(&mut store, pairs)?;
        Ok(Self::new(Arc::new(store), Tokenizer::default(), params))
    }

    pub fn store(&self) -> &Arc<dyn FrequencyStore> {
        &self.store
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn params(&self) -> GenerationParams {
        self.params
    }

    /// The token a reply to `message` starts from: the last token of the
    /// message, or a random known opener when the message has none.
    pub fn seed_token(&self, message: &str, seed: Option<u64>) -> Option<String> {
        if let Some(last) = self.tokenizer.tokenize(message).pop() {
            return Some(last);
        }
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.store.random_seed(&mut rng)
    }

    /// A fresh generator answering `message`. `None` when there is nothing
    /// to start from (empty message and an empty model).
    pub fn respond(
        &self,
        message: &str,
        params: GenerationParams,
    ) -> Result<Option<Generator<'_, dyn FrequencyStore>>> {
        crate::sampling::validate_temperature(params.temperature)?;
        let Some(seed) = self.seed_token(message, params.seed) else {
            return Ok(None);
        };
        Generator::new(self.store.as_ref(), &seed, params).map(Some)
    }

    /// Runs a whole generation and returns the formatted text.
    pub fn reply(&self, message: &str, params: GenerationParams) -> Result<Reply> {
        let Some(mut generator) = self.respond(message, params)? else {
            return Ok(Reply {
                text: String::new(),
                finish_reason: None,
            });
        };
        let tokens: Vec<String> = generator.by_ref().collect();
        Ok(Reply {
            text: detokenize(&tokens),
            finish_reason: generator.finish_reason(),
        })
    }
}

fn train_persistent(config: &EngineConfig) -> Result<(PersistentStore, TrainReport)> {
    let pairs = load_qa_pairs_from_path(&config.corpus_path, config.corpus_format, config.max_pairs)?;
    let mut store = PersistentStore::create(&config.model_path, config.order)?;
    let report = Trainer::new(config.order)
        .with_tokenizer(Tokenizer::new(config.script))
        .train(&mut store, &pairs)?;
    // Nothing is visible at the model path until the whole table is written.
    let store = store.finish()?;
    Ok((store, report))
}
