// File: src/bin/main.rs
// Chat server: builds (or opens) the trigram model, then serves it.

use chat_core::ChatEngine;
use chat_core::config::EngineConfig;
use chat_core::service::{self, AppState};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chat-server", about = "Statistical trigram chat server")]
struct Cli {
    /// JSON config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model artifact path
    #[arg(long)]
    model_path: Option<PathBuf>,

    /// Training corpus, used only when the model has to be built
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    bind: Option<String>,

    #[arg(long)]
    temperature: Option<f64>,

    #[arg(long)]
    max_len: Option<usize>,

    /// Delay between streamed events, in milliseconds
    #[arg(long)]
    token_delay_ms: Option<u64>,

    /// Rebuild the model from the corpus even if one exists
    #[arg(long)]
    retrain: bool,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<(EngineConfig, bool)> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_file(path)?,
            None => EngineConfig::default(),
        };
        if let Some(p) = self.model_path {
            config.model_path = p;
        }
        if let Some(p) = self.corpus {
            config.corpus_path = p;
        }
        if let Some(b) = self.bind {
            config.bind = b;
        }
        if let Some(t) = self.temperature {
            config.temperature = t;
        }
        if let Some(m) = self.max_len {
            config.max_len = m;
        }
        if let Some(d) = self.token_delay_ms {
            config.token_delay_ms = d;
        }
        config.validate()?;
        Ok((config, self.retrain))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let (config, retrain) = Cli::parse().into_config()?;

    // Training finishes before the listener exists, so no request ever sees
    // a partially built model.
    let build_config = config.clone();
    let engine = tokio::task::spawn_blocking(move || {
        if retrain {
            ChatEngine::retrain(&build_config).map(|(engine, report)| {
                info!(pairs = report.pairs, windows = report.windows, "retrained");
                engine
            })
        } else {
            ChatEngine::from_file_or_train(&build_config)
        }
    })
    .await??;

    let state = Arc::new(AppState::new(engine, &config));
    let app = service::router(state);

    let listener = TcpListener::bind(&config.bind).await?;
    info!("serving chat on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    Ok(())
}
