// File: src/bin/simulator.rs
use chat_core::ChatEngine;
use chat_core::config::EngineConfig;
use chat_core::core::tokenizer::Detokenizer;
use chat_core::corpus::load_qa_pairs_from_path;
use clap::Parser;
use crossterm::style::Stylize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;
use tracing_subscriber::EnvFilter;

/// Terminal chat against a trained model. Type 'exit' to quit.
#[derive(Parser)]
#[command(name = "chat-simulator")]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,

    /// Training corpus
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Context width. 1 trains an in-memory single-word model on startup;
    /// anything else uses the persistent model file.
    #[arg(long)]
    order: Option<usize>,

    #[arg(long)]
    temperature: Option<f64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(p) = cli.corpus {
        config.corpus_path = p;
    }
    if let Some(o) = cli.order {
        config.order = o;
    }
    if let Some(t) = cli.temperature {
        config.temperature = t;
    }
    config.validate()?;

    let engine = if config.order == 1 {
        let pairs =
            load_qa_pairs_from_path(&config.corpus_path, config.corpus_format, config.max_pairs)?;
        println!("{}", format!("Loaded {} QA pairs.", pairs.len()).dim());
        ChatEngine::in_memory(&pairs, 1, config.generation_params())?
    } else {
        ChatEngine::from_file_or_train(&config)?
    };
    println!("{}", "Model ready.".green());

    println!("Statistical chat simulator. Type 'exit' to quit.");
    println!("---------------------------------------------------------------");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("{} ", "You>".bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        if input.eq_ignore_ascii_case("exit") {
            break;
        }
        if input.is_empty() {
            continue;
        }

        print!("{} ", "Bot>".cyan().bold());
        stdout.flush()?;
        if let Some(generator) = engine.respond(input, engine.params())? {
            let mut detok = Detokenizer::new();
            let mut shown = 0;
            for token in generator {
                let text = detok.push(&token);
                print!("{}", &text[shown..]);
                shown = text.len();
                stdout.flush()?;
                thread::sleep(config.token_delay());
            }
        }
        println!();
    }

    println!("\n{}", "Bye!".dim());
    Ok(())
}
