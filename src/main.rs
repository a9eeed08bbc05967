use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use emergency_predictor::{
    api::{handle_batch, handle_predict},
    config::Config,
    generator::{write_dataset, GeneratorConfig, SyntheticDataGenerator},
    ml::{Predictor, Trainer},
};
use serde_json::{json, Value};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "emergency-predictor")]
#[command(about = "Emergency type and severity prediction", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a synthetic labeled dataset
    Generate {
        /// Number of hourly records
        #[arg(short, long)]
        records: Option<usize>,

        /// Seed for both random streams
        #[arg(short, long)]
        seed: Option<u64>,

        /// Timestamp of the first record (RFC 3339); defaults to one year ago
        #[arg(long)]
        start: Option<DateTime<Utc>>,

        /// Output CSV path
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Train every classifier family and persist the best one
    Train {
        /// Dataset CSV path
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Artifact directory
        #[arg(short, long)]
        model_dir: Option<PathBuf>,
    },

    /// Predict from a single JSON request
    Predict {
        /// JSON file, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        input: String,

        #[arg(short, long)]
        model_dir: Option<PathBuf>,
    },

    /// Predict from `{"records": [...]}`
    #[command(name = "predict-batch")]
    PredictBatch {
        /// JSON file, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        input: String,

        #[arg(short, long)]
        model_dir: Option<PathBuf>,
    },

    /// Show what the artifact directory holds
    Status {
        #[arg(short, long)]
        model_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });
    config.validate().context("invalid configuration")?;

    init_tracing(&config);
    tracing::info!("Emergency predictor v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Generate {
            records,
            seed,
            start,
            out,
        } => {
            let mut settings = config.generator.clone();
            if let Some(seed) = seed {
                settings.seed = seed;
            }
            let num_records = records.unwrap_or(settings.num_records);
            let out = out.unwrap_or(config.paths.dataset_path.clone());

            let generator = SyntheticDataGenerator::new(GeneratorConfig::from(&settings));
            let samples = match start {
                Some(start) => generator.generate_from(start, num_records),
                None => generator.generate(num_records),
            }
            .context("dataset generation failed")?;

            write_dataset(&out, &samples)
                .with_context(|| format!("failed to write {}", out.display()))?;

            let hits = samples
                .iter()
                .filter(|s| s.emergency_type.is_emergency())
                .count();
            print_json(&json!({
                "path": out.display().to_string(),
                "records": samples.len(),
                "emergencies": hits,
                "seed": settings.seed,
            }))?;
        }

        Commands::Train { data, model_dir } => {
            let data = data.unwrap_or(config.paths.dataset_path.clone());
            let model_dir = model_dir.unwrap_or(config.paths.model_dir.clone());
            let trainer = Trainer::new(config.training.clone(), model_dir);

            // CPU-bound; keep it off the async workers
            let outcome = tokio::task::spawn_blocking(move || trainer.train_file(&data))
                .await
                .context("training task panicked")?
                .context("training failed")?;

            print_json(&json!({
                "run_id": outcome.run_id,
                "best": outcome.best.family_name(),
                "reports": outcome.reports,
            }))?;
        }

        Commands::Predict { input, model_dir } => {
            let predictor = load_predictor(model_dir.as_deref().unwrap_or(&config.paths.model_dir))?;
            let body = read_json(&input)?;
            print_json(&handle_predict(&predictor, &body, Utc::now()))?;
        }

        Commands::PredictBatch { input, model_dir } => {
            let predictor = load_predictor(model_dir.as_deref().unwrap_or(&config.paths.model_dir))?;
            let body = read_json(&input)?;
            print_json(&handle_batch(&predictor, &body, Utc::now()))?;
        }

        Commands::Status { model_dir } => {
            let predictor = Predictor::new(model_dir.unwrap_or(config.paths.model_dir.clone()));
            if let Err(e) = predictor.load() {
                tracing::warn!("No usable model: {}", e);
            }
            print_json(&serde_json::to_value(predictor.status())?)?;
        }
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("emergency_predictor={}", config.observability.log_level).into()
    });

    // Logs go to stderr so stdout stays machine-readable
    if config.observability.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_predictor(model_dir: &Path) -> Result<Predictor> {
    let predictor = Predictor::new(model_dir);
    predictor
        .load()
        .with_context(|| format!("failed to load model from {}", model_dir.display()))?;
    Ok(predictor)
}

fn read_json(input: &str) -> Result<Value> {
    let mut raw = String::new();
    if input == "-" {
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read stdin")?;
    } else {
        raw = std::fs::read_to_string(input).with_context(|| format!("failed to read {}", input))?;
    }
    serde_json::from_str(&raw).context("input is not valid JSON")
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
