use clap::{Args, Parser, Subcommand};
use reqwest::Client;
use std::path::PathBuf;
use vehicle_predictive_maintenance::{
    api::handlers::VehicleTelemetryRequest,
    config::Config,
    logging::init_tracing,
    ml::{ParamGrid, PredictiveMaintenanceModel},
    models::{feature_names, FeatureTable, FeatureVector, TrainingSet},
    synthetic,
};

#[derive(Parser)]
#[command(name = "pm-cli")]
#[command(about = "Vehicle predictive maintenance CLI", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    endpoint: String,

    /// Artifact directory (defaults to model.artifact_dir from configuration)
    #[arg(short, long)]
    artifact_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TelemetryArgs {
    #[arg(long, default_value = "CLI-0001")]
    vehicle_id: String,

    #[arg(long, allow_hyphen_values = true)]
    engine_temp: f64,

    #[arg(long)]
    brake_health: f64,

    #[arg(long)]
    battery_health: f64,

    #[arg(long)]
    vibration_level: f64,

    #[arg(long)]
    oil_level: f64,
}

impl TelemetryArgs {
    fn request(&self) -> VehicleTelemetryRequest {
        VehicleTelemetryRequest::new(
            self.vehicle_id.clone(),
            FeatureVector::new(
                self.engine_temp,
                self.brake_health,
                self.battery_health,
                self.vibration_level,
                self.oil_level,
            ),
        )
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write a synthetic labeled dataset as JSON lines
    Generate {
        #[arg(short, long, default_value = "2000")]
        samples: usize,

        #[arg(long, default_value = "42")]
        seed: u64,

        #[arg(short, long, default_value = "fleet.jsonl")]
        output: PathBuf,
    },

    /// Train, evaluate and save a model
    Train {
        /// JSON-lines training data (synthetic data is generated when omitted)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Synthetic rows to generate when no data file is given
        #[arg(short, long, default_value = "2000")]
        samples: usize,

        /// Search a reduced grid
        #[arg(short, long)]
        quick: bool,
    },

    /// Predict locally from saved artifacts
    Predict {
        #[command(flatten)]
        telemetry: TelemetryArgs,
    },

    /// Predict through a running server
    RemotePredict {
        #[command(flatten)]
        telemetry: TelemetryArgs,
    },

    /// Check server health
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;
    init_tracing(&config.observability);

    let artifact_dir = cli
        .artifact_dir
        .clone()
        .unwrap_or_else(|| config.model.artifact_dir.clone());
    let client = Client::new();

    match cli.command {
        Commands::Generate {
            samples,
            seed,
            output,
        } => {
            let rows = synthetic::generate(samples, seed)?;
            synthetic::write_json_lines(&output, &rows)?;
            println!("Wrote {} rows to {}", rows.len(), output.display());
        }

        Commands::Train {
            data,
            samples,
            quick,
        } => {
            let target = config.training.target_column.clone();
            let training_set = match data {
                Some(path) => {
                    let records = synthetic::read_json_lines(&path)?;
                    TrainingSet::from_records(&records, &target)?
                }
                None => TrainingSet::from_samples(&synthetic::generate(
                    samples,
                    config.training.seed,
                )?),
            };

            let mut training = config.training.to_training_config();
            if quick {
                training = training.with_grid(ParamGrid::quick());
            }

            let mut model = PredictiveMaintenanceModel::new(&artifact_dir, training);
            let outcome = model.train(&training_set, &feature_names(), &target)?;
            model.save()?;

            println!("Best parameters: {}", outcome.best_params);
            println!("Best CV weighted F1: {:.4}", outcome.best_score);
            println!();
            println!("{}", outcome.test_report.render());
            println!("Artifacts saved to {}", artifact_dir.display());
        }

        Commands::Predict { telemetry } => {
            let mut model =
                PredictiveMaintenanceModel::new(&artifact_dir, config.training.to_training_config());
            let features = telemetry.request().validated_features()?;
            let batch = FeatureTable::from_vectors(&[features]);
            let scored = model.predict(&batch)?;

            let records = scored.to_records();
            println!("{}", serde_json::to_string_pretty(&records)?);
        }

        Commands::RemotePredict { telemetry } => {
            let request = telemetry.request();

            let response = client
                .post(format!("{}/predict", cli.endpoint))
                .json(&request)
                .send()
                .await?;

            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Health => {
            let response = client
                .get(format!("{}/health", cli.endpoint))
                .send()
                .await?;

            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}
