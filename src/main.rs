use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;

use novelty_detector::cli::{Cli, Command};
use novelty_detector::config::Config;
use novelty_detector::metrics;
use novelty_detector::ml::{describe_model, run_scoring_session, run_training_session};

const DEFAULT_CONFIG: &str = "config/config.toml";

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    let config = load_config(cli.config)?;
    metrics::init().map_err(|e| anyhow::anyhow!("Metrics registration failed: {}", e))?;

    match cli.command {
        Command::Train { epochs, learning_rate, batch_size } => {
            let mut config = config;
            if let Some(epochs) = epochs {
                config.training.epochs = epochs;
            }
            if let Some(learning_rate) = learning_rate {
                config.training.learning_rate = learning_rate;
            }
            if let Some(batch_size) = batch_size {
                config.training.batch_size = batch_size;
            }
            config.validate()?;

            info!("Starting training for {}", config.model_key());
            match run_training_session(config) {
                Ok(summary) => {
                    if let Some(losses) = summary.last_losses {
                        info!("Final losses: {}", losses.summary());
                    }
                    println!("{}", metrics::gather_text()?);
                }
                Err(e) => {
                    error!("Model training failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Command::Score { frames, labels } => {
            let labels: Option<Vec<bool>> = labels.map(|l| l.into_iter().map(|v| v != 0).collect());
            let session = run_scoring_session(&config, &frames, labels.as_deref())?;

            println!("checkpoint: epoch {}", session.checkpoint_step);
            println!(
                "scored {} patches, dropped {}",
                session.report.len(),
                session.report.dropped
            );
            for summary in &session.frames {
                println!(
                    "{:?}: {} patches, {} anomalous, min score {:.4}, mean score {:.4}, mean reconstruction error {:.6}{}",
                    frames[summary.frame],
                    summary.patches,
                    summary.anomalous_patches,
                    summary.min_score,
                    summary.mean_score,
                    summary.mean_reconstruction_error,
                    if summary.is_anomalous() { "  ANOMALY" } else { "" }
                );
            }
            if let Some(m) = session.metrics {
                println!(
                    "accuracy {:.4}, precision {:.4}, recall {:.4}, f1 {:.4}, roc auc {:.4}",
                    m.accuracy, m.precision, m.recall, m.f1_score, m.roc_auc
                );
            }
        }
        Command::Inspect => {
            let description = describe_model(&config)?;
            println!("model: {}", description.model_key);
            println!("generator parameters: {}", description.generator_parameters);
            println!("discriminator parameters: {}", description.discriminator_parameters);
            if description.snapshots.is_empty() {
                println!("no checkpoints under {:?}", config.paths.checkpoint_dir);
            }
            for snapshot in &description.snapshots {
                println!("  {} (epoch {}, {})", snapshot.file_name, snapshot.step, snapshot.timestamp);
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load(&path)
            .map_err(|e| anyhow::anyhow!("Configuration loading failed for {:?}: {}", path, e)),
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG);
            if default_path.exists() {
                Ok(Config::load(&default_path)?)
            } else {
                warn!("No configuration at {}, using defaults", DEFAULT_CONFIG);
                Ok(Config::default())
            }
        }
    }
}
