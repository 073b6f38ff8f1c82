//! batchq CLI: run a processing node or inspect stored results.

use std::path::PathBuf;
use std::sync::Arc;

use batchq::client::BatchClient;
use batchq::config::Config;
use batchq::engine::Engine;
use batchq::model::ExtraParams;
use batchq::registry::{ComponentRegistry, ComponentSelection};
use batchq::store::{FileSystemResultStore, ResultStore};
use batchq::telemetry::{TelemetryConfig, init_telemetry};
use batchq::worker::EchoWorker;
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "batchq", about = "Distributed batch processing node")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the processing engine until Ctrl-C
    Serve {
        /// Schedule this many demo items for the echo worker on startup
        #[arg(long, default_value_t = 0)]
        seed: usize,
    },
    /// Print a stored result
    Result {
        /// Derived key (`key-worker_type`)
        key: String,
        /// Filesystem result store directory
        #[arg(long)]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { seed } => cmd_serve(seed).await,
        Command::Result { key, dir } => cmd_result(&key, dir).await,
    }
}

async fn cmd_serve(seed: usize) -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "batchq".to_string(),
        default_filter: config.log_level.clone(),
    })?;

    let selection = match &config.components {
        Some(path) => ComponentSelection::load(path)?,
        None => ComponentSelection::default(),
    };
    let components = ComponentRegistry::with_defaults().build(&selection)?;

    let engine = Engine::builder()
        .components(components.clone())
        .worker(Arc::new(EchoWorker::new()))
        .config(config.engine.clone())
        .build()?;

    let mut events = engine.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) if event.is_error() => error!(seq = event.seq, "{}", event.message()),
                Ok(event) => info!(seq = event.seq, "{}", event.message()),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event log fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let cancel = engine.cancellation_token();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("interrupt received, shutting down");
        cancel.cancel();
    });

    engine.start()?;

    if seed > 0 {
        let client = BatchClient::from_components(&components);
        for n in 0..seed {
            client
                .schedule_work(
                    &format!("demo-{n}"),
                    EchoWorker::DEFAULT_TYPE,
                    Some(format!("demo payload {n}").into_bytes()),
                    ExtraParams::new(),
                )
                .await?;
        }
        info!(count = seed, "demo items scheduled");
    }

    engine.cancellation_token().cancelled().await;
    engine.shutdown().await;
    Ok(())
}

async fn cmd_result(key: &str, dir: PathBuf) -> anyhow::Result<()> {
    let store = FileSystemResultStore::open(dir)?;
    let Some(result) = store.get(key).await? else {
        anyhow::bail!("no result stored for '{key}'");
    };

    println!("Key:       {}", result.key);
    println!("Postponed: {}", result.postpone);
    println!("Size:      {} bytes", result.data.len());
    for (name, value) in result.extra_params.iter() {
        println!("Param:     {name} = {value}");
    }
    match std::str::from_utf8(&result.data) {
        Ok(text) => println!("---\n{text}"),
        Err(_) => println!("--- (binary data)"),
    }
    Ok(())
}
