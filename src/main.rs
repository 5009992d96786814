mod cli;
mod config;
mod dispatch;
mod error;
mod provider;
mod ui;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use config::CourierConfig;
use dispatch::Dispatcher;
use provider::{ChatCompletion, ChatMessage, Transcription, chat_payload, transcription_payload};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = CourierConfig::load()?;
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(max_retries) = cli.max_retries {
        config.max_retries = max_retries;
    }

    match cli.command {
        Command::Chat { message, model } => run_chat(&config, &message, model, cli.verbose).await,
        Command::Transcribe { file, language } => {
            run_transcribe(&config, &file, language, cli.verbose).await
        }
        Command::Worker => run_worker(&config).await,
        Command::Status => {
            print_status(&config);
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "courier=debug" } else { "courier=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn run_chat(
    config: &CourierConfig,
    message: &str,
    model: Option<String>,
    verbose: bool,
) -> Result<()> {
    let dispatcher = Dispatcher::from_config(config).await?;
    let model = model.unwrap_or_else(|| config.chat_model.clone());
    let payload = chat_payload(&model, 0.27, &[ChatMessage::user(message)]);

    let progress = ui::JobProgress::start("chat");
    let outcome = dispatcher.submit_chat(payload).await;
    let result = match outcome {
        Ok(response) => {
            let completion: ChatCompletion = serde_json::from_value(response)
                .context("unexpected provider response shape")?;
            progress.succeed();
            println!("{}", completion.first_content().unwrap_or("(empty reply)"));
            Ok(())
        }
        Err(err) => {
            progress.fail(&err.to_string());
            Err(err.into())
        }
    };

    if verbose {
        ui::print_metrics(&dispatcher.metrics());
    }
    dispatcher.shutdown().await;
    result
}

async fn run_transcribe(
    config: &CourierConfig,
    file: &PathBuf,
    language: Option<String>,
    verbose: bool,
) -> Result<()> {
    let audio = std::fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("audio")
        .to_string();
    let payload = transcription_payload(
        &config.transcription_model,
        &audio,
        &filename,
        language.as_deref(),
    );

    let dispatcher = Dispatcher::from_config(config).await?;
    let progress = ui::JobProgress::start("transcribe");
    let outcome = dispatcher.submit_transcription(payload).await;
    let result = match outcome {
        Ok(response) => {
            let transcription: Transcription = serde_json::from_value(response)
                .context("unexpected provider response shape")?;
            progress.succeed();
            println!("{}", transcription.text);
            Ok(())
        }
        Err(err) => {
            progress.fail(&err.to_string());
            Err(err.into())
        }
    };

    if verbose {
        ui::print_metrics(&dispatcher.metrics());
    }
    dispatcher.shutdown().await;
    result
}

async fn run_worker(config: &CourierConfig) -> Result<()> {
    if config.redis_url.is_none() {
        bail!("worker mode requires redis_url (or REDIS_URL) to be configured");
    }
    let dispatcher = Dispatcher::from_config(config).await?;
    tracing::info!("worker running, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    dispatcher.shutdown().await;
    ui::print_metrics(&dispatcher.metrics());
    Ok(())
}

fn print_status(config: &CourierConfig) {
    let mode = if config.redis_url.is_some() {
        "distributed"
    } else {
        "local"
    };
    println!("mode:             {mode}");
    println!("credentials:      {}", config.api_keys.len());
    println!("concurrency:      {}", config.concurrency);
    println!("max retries:      {}", config.max_retries);
    println!("base backoff:     {}ms", config.base_backoff_ms);
    println!("provider api:     {}", config.api_url);
    println!("chat model:       {}", config.chat_model);
    println!("transcribe model: {}", config.transcription_model);
}
