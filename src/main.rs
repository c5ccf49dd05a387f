use anyhow::Context;
use bloomdiet_api::{RestApi, RestConfig, ServingContext, UploadLimits};
use bloomdiet_core::NormalizationPolicy;
use bloomdiet_storage::ArtifactStore;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Diet recommendation inference service
#[derive(Parser, Debug)]
#[command(name = "bloomdiet")]
#[command(about = "Serves a fitted diet-recommendation pipeline over HTTP", long_about = None)]
struct Args {
    /// Path to the fitted pipeline artifact (.json, .json.gz or .bin)
    #[arg(long, default_value = "./models/diet_recommendation_rf_model.json")]
    model_path: PathBuf,

    /// Path to the label codec artifact
    #[arg(long, default_value = "./models/label_encoder.json")]
    labels_path: PathBuf,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// HTTP API port
    #[arg(long, default_value_t = 8000)]
    http_port: u16,

    /// Fields every single-record request must supply
    #[arg(long, value_delimiter = ',', default_value = "gender,age,height_cm,weight_kg")]
    required_fields: Vec<String>,

    /// Maximum size of an uploaded CSV file
    #[arg(long, default_value_t = 10 * 1024 * 1024)]
    max_upload_bytes: usize,

    /// Number of HTTP worker threads (defaults to the CPU count)
    #[arg(long)]
    workers: Option<usize>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting BloomDiet v{}", env!("CARGO_PKG_VERSION"));

    let store = ArtifactStore::new(&args.model_path, &args.labels_path);
    let artifacts = store.load().context("failed to load model artifacts")?;
    info!("Model sha256: {}", artifacts.model_sha256);

    let policy = NormalizationPolicy {
        required: args
            .required_fields
            .iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect(),
        ..NormalizationPolicy::default()
    };
    let state = Arc::new(ServingContext::from_artifacts(artifacts, policy)?);

    let config = RestConfig {
        host: args.host,
        port: args.http_port,
        workers: args.workers,
        limits: UploadLimits {
            max_upload_bytes: args.max_upload_bytes,
            ..UploadLimits::default()
        },
    };
    let http_port = config.port;

    let http_handle = std::thread::spawn(move || {
        let sys = actix_web::rt::System::new();
        sys.block_on(async {
            if let Err(e) = RestApi::start(state, config).await {
                tracing::error!("HTTP server error: {}", e);
            }
        })
    });

    info!("BloomDiet started successfully");
    info!("HTTP API: http://localhost:{}/", http_port);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = tokio::task::spawn_blocking(move || {
            http_handle.join().ok();
        }) => {
            info!("HTTP server stopped");
        }
    }

    info!("Shutting down...");
    Ok(())
}
