#![forbid(unsafe_code)]

//! Quarterdeck entry point.
//!
//! One binary, three modes: the public API broker, the generation
//! worker, and a one-shot local `generate` that skips the queue and
//! writes the deck to disk.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use qdeck_broker::AppState;
use qdeck_core::{FiscalQuarter, GenerateRequest};
use qdeck_drive::{DriveClient, FileSink};
use qdeck_gcp_auth::{ServiceAccountKey, ServiceAccountTokenProvider, TokenProvider, scopes};
use qdeck_insights::InsightsClient;
use qdeck_pptx::DeckRenderer;
use qdeck_pubsub::{PubsubClient, PubsubDeckRelay, ReplyListener, ReplyRouter};
use qdeck_worker::{DeckPipeline, RequestWorker};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Quarterly review deck generation services.
#[derive(Parser, Debug)]
#[command(name = "qdeck", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the public generation API.
    Broker(BrokerArgs),
    /// Run the deck generation worker.
    Worker(WorkerArgs),
    /// Generate one deck locally, without the queue.
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
struct PubsubArgs {
    /// Google Cloud project hosting the topics.
    #[arg(long, env = "QDECK_PROJECT_ID")]
    project_id: String,

    /// Path to the service account key JSON.
    #[arg(long, env = "QDECK_SERVICE_ACCOUNT_KEY")]
    service_account_key: PathBuf,

    /// Pub/Sub endpoint override, for emulators.
    #[arg(long, env = "QDECK_PUBSUB_ENDPOINT")]
    pubsub_endpoint: Option<String>,
}

#[derive(Args, Debug)]
struct BrokerArgs {
    #[command(flatten)]
    pubsub: PubsubArgs,

    /// Address the API listens on.
    #[arg(long, env = "QDECK_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    listen_addr: SocketAddr,

    /// Topic generation requests are published to.
    #[arg(long, env = "QDECK_REQUEST_TOPIC", default_value = "deck-requests")]
    request_topic: String,

    /// Subscription the broker pulls replies from.
    #[arg(long, env = "QDECK_REPLY_SUBSCRIPTION", default_value = "deck-replies-broker")]
    reply_subscription: String,

    /// Seconds `/generate` waits for a worker reply.
    #[arg(long, env = "QDECK_RELAY_TIMEOUT_SECS", default_value_t = 600)]
    relay_timeout_secs: u64,
}

#[derive(Args, Debug)]
struct WorkerArgs {
    #[command(flatten)]
    pubsub: PubsubArgs,

    /// Subscription the worker pulls requests from.
    #[arg(long, env = "QDECK_REQUEST_SUBSCRIPTION", default_value = "deck-requests-worker")]
    request_subscription: String,

    /// Topic replies are published to.
    #[arg(long, env = "QDECK_REPLY_TOPIC", default_value = "deck-replies")]
    reply_topic: String,

    /// Insights API endpoint.
    #[arg(long, env = "QDECK_INSIGHTS_URL")]
    insights_url: String,

    /// Path to the deck template.
    #[arg(long, env = "QDECK_TEMPLATE")]
    template: PathBuf,

    /// Drive folder decks are uploaded into; the Drive root if unset.
    #[arg(long, env = "QDECK_DRIVE_FOLDER_ID")]
    drive_folder_id: Option<String>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Quarter number, 1 through 4.
    #[arg(long)]
    quarter: u8,

    /// Calendar year.
    #[arg(long)]
    year: u16,

    /// Insights API endpoint.
    #[arg(long, env = "QDECK_INSIGHTS_URL")]
    insights_url: String,

    /// Path to the deck template.
    #[arg(long, env = "QDECK_TEMPLATE")]
    template: PathBuf,

    /// Directory the finished deck is written to.
    #[arg(long, env = "QDECK_OUTPUT_DIR", default_value = "decks")]
    output_dir: PathBuf,

    /// Optional name for the stored file (stored as `{name}.pptx`).
    #[arg(long)]
    file_id: Option<String>,
}

fn token_provider(args: &PubsubArgs, scopes: &[&str]) -> anyhow::Result<Arc<dyn TokenProvider>> {
    let key = ServiceAccountKey::from_file(&args.service_account_key).with_context(|| {
        format!(
            "loading service account key {}",
            args.service_account_key.display()
        )
    })?;
    Ok(Arc::new(ServiceAccountTokenProvider::new(
        key,
        scopes.iter().copied(),
    )))
}

fn pubsub_client(args: &PubsubArgs, tokens: Arc<dyn TokenProvider>) -> Arc<PubsubClient> {
    let mut client = PubsubClient::new(&args.project_id, tokens);
    if let Some(endpoint) = &args.pubsub_endpoint {
        client = client.with_base_url(endpoint);
    }
    Arc::new(client)
}

fn load_template(path: &PathBuf) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading deck template {}", path.display()))
}

async fn signal_shutdown(tx: watch::Sender<bool>) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Shutdown signal received");
    }
    let _ = tx.send(true);
}

async fn run_broker(args: BrokerArgs) -> anyhow::Result<()> {
    let tokens = token_provider(&args.pubsub, &[scopes::PUBSUB])?;
    let client = pubsub_client(&args.pubsub, tokens);

    let reply_router = Arc::new(ReplyRouter::new());
    let listener = ReplyListener::new(client.clone(), args.reply_subscription, reply_router.clone());
    let listener_handle = listener.handle();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(listener.run(shutdown_rx.clone()));
    tokio::spawn(signal_shutdown(shutdown_tx));

    let relay = Arc::new(PubsubDeckRelay::new(
        client,
        args.request_topic,
        reply_router,
    ));
    let state = AppState {
        relay,
        listener: listener_handle,
        relay_timeout: Duration::from_secs(args.relay_timeout_secs),
    };

    let tcp = TcpListener::bind(args.listen_addr)
        .await
        .with_context(|| format!("binding {}", args.listen_addr))?;
    qdeck_broker::serve(tcp, qdeck_broker::router(state), shutdown_rx).await?;
    Ok(())
}

async fn run_worker(args: WorkerArgs) -> anyhow::Result<()> {
    let tokens = token_provider(&args.pubsub, &[scopes::PUBSUB, scopes::DRIVE_FILE])?;
    let client = pubsub_client(&args.pubsub, tokens.clone());
    let template = load_template(&args.template)?;

    let mut drive = DriveClient::new(tokens);
    if let Some(folder_id) = args.drive_folder_id {
        drive = drive.with_folder(folder_id);
    }

    let pipeline = Arc::new(DeckPipeline::new(
        Arc::new(InsightsClient::new(&args.insights_url)),
        DeckRenderer::new(),
        template,
        Arc::new(drive),
    ));
    let worker = RequestWorker::new(
        client,
        args.request_subscription,
        args.reply_topic,
        pipeline,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(signal_shutdown(shutdown_tx));
    worker.run(shutdown_rx).await;
    Ok(())
}

async fn run_generate(args: GenerateArgs) -> anyhow::Result<()> {
    let quarter = FiscalQuarter::new(args.quarter, args.year)?;
    let mut request = GenerateRequest::new(quarter);
    if let Some(file_id) = args.file_id {
        request = request.with_file_id(file_id);
    }

    let template = load_template(&args.template)?;
    let pipeline = DeckPipeline::new(
        Arc::new(InsightsClient::new(&args.insights_url)),
        DeckRenderer::new(),
        template,
        Arc::new(FileSink::new(args.output_dir)),
    );

    let ready = pipeline.generate(&request).await?;
    println!("{}", ready.presentation_link);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    match Cli::parse().command {
        Command::Broker(args) => run_broker(args).await,
        Command::Worker(args) => run_worker(args).await,
        Command::Generate(args) => run_generate(args).await,
    }
}
