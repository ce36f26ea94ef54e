use std::path::PathBuf;
use log::info;
use serde::{Deserialize, Serialize};
use crate::config::Config;
use crate::data::dataset::build_training_set;
use crate::data::frames::load_frame;
use crate::data::patches::{extract_patches, PatchSize};
use crate::error::{Error, Result};

pub mod architecture;
pub mod checkpoint;
pub mod config;
pub mod discriminator;
pub mod evaluation;
pub mod generator;
pub mod inference;
pub mod losses;
pub mod model;
pub mod network;
pub mod training;

pub use architecture::get_device;
pub use checkpoint::{CheckpointManager, SnapshotEntry};
pub use config::{ArchitectureConfig, MLConfigError, TrainingConfig};
pub use discriminator::Discriminator;
pub use evaluation::{ConfusionMatrix, ModelEvaluator, ModelMetrics};
pub use generator::Generator;
pub use inference::{FrameSummary, PatchScore, ScoreReport, Scorer};
pub use losses::LossSnapshot;
pub use model::GanModel;
pub use network::{AdversarialNetwork, NetOutput};
pub use training::{Trainer, TrainingSummary};

/// Loads the configured dataset and trains, resuming from the newest checkpoint.
pub fn run_training_session(config: Config) -> Result<TrainingSummary> {
    let device = get_device();
    let data = build_training_set(&config)?;
    let mut trainer = Trainer::new(config, device)?;
    let summary = trainer.train(&data)?;
    info!(
        "Training finished: {} epochs, {} steps",
        summary.epochs_run, summary.steps
    );
    Ok(summary)
}

pub struct ScoringSession {
    /// Epoch tag of the checkpoint used.
    pub checkpoint_step: u64,
    pub report: ScoreReport,
    pub frames: Vec<FrameSummary>,
    /// Frame-level metrics when ground truth was supplied.
    pub metrics: Option<ModelMetrics>,
}

/// Scores the patches of `frame_paths` with the newest checkpoint. A frame's
/// score is the lowest score among its patches. `anomalous`, when given,
/// holds one ground-truth flag per frame.
pub fn run_scoring_session(
    config: &Config,
    frame_paths: &[PathBuf],
    anomalous: Option<&[bool]>,
) -> Result<ScoringSession> {
    config.validate()?;
    if let Some(labels) = anomalous {
        if labels.len() != frame_paths.len() {
            return Err(Error::InvalidInput(format!(
                "{} frames but {} labels",
                frame_paths.len(),
                labels.len()
            )));
        }
    }

    let mut model = GanModel::new(&config.model, get_device());
    let manager = CheckpointManager::new(config.model_key(), config.training.max_to_keep);
    let (loaded, checkpoint_step) = manager.load(&config.paths.checkpoint_dir, &mut model)?;
    if !loaded {
        return Err(Error::CheckpointNotFound(
            manager.model_dir(&config.paths.checkpoint_dir).display().to_string(),
        ));
    }

    let frames = frame_paths
        .iter()
        .map(|p| load_frame(p))
        .collect::<Result<Vec<_>>>()?;
    let size = PatchSize::new(config.patches.height, config.patches.width);
    let (patches, locations) = extract_patches(&frames, size, config.patches.stride)?;

    let report = Scorer::new(&model, config.training.batch_size)?.score(&patches)?;
    report.write_montages(&patches, &config.paths.sample_dir, &format!("score_{}", checkpoint_step))?;
    let summaries = report.frame_summaries(&locations, config.scoring.threshold)?;

    let metrics = match anomalous {
        Some(labels) => {
            let scores: Vec<f64> = summaries.iter().map(|f| f.min_score).collect();
            let truth: Vec<bool> = summaries.iter().map(|f| labels[f.frame]).collect();
            Some(ModelEvaluator::new(config.scoring.threshold).evaluate(&scores, &truth)?)
        }
        None => None,
    };

    Ok(ScoringSession {
        checkpoint_step,
        report,
        frames: summaries,
        metrics,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescription {
    pub model_key: String,
    pub generator_parameters: i64,
    pub discriminator_parameters: i64,
    pub snapshots: Vec<SnapshotEntry>,
}

pub fn describe_model(config: &Config) -> Result<ModelDescription> {
    config.validate()?;
    let model = GanModel::new(&config.model, tch::Device::Cpu);
    let manager = CheckpointManager::new(config.model_key(), config.training.max_to_keep);
    Ok(ModelDescription {
        model_key: manager.model_key().to_string(),
        generator_parameters: model.generator.parameter_count(),
        discriminator_parameters: model.discriminator.parameter_count(),
        snapshots: manager.list(&config.paths.checkpoint_dir),
    })
}
