use std::path::Path;
use std::time::Instant;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tch::nn::{self, OptimizerConfig};
use tch::{Device, Tensor};
use crate::config::Config;
use crate::data::dataset::TrainingSet;
use crate::data::frames::load_frame;
use crate::data::patches::{extract_patches, patches_to_tensor, tensor_to_patches, NoiseInjector, PatchSize};
use crate::error::{Error, Result};
use crate::logging::LossLog;
use crate::metrics;
use crate::montage::save_montage;
use super::checkpoint::CheckpointManager;
use super::inference::Scorer;
use super::losses::{discriminator_losses, generator_losses, LossSnapshot};
use super::model::GanModel;
use super::network::AdversarialNetwork;

/// Generator updates performed after every discriminator update.
pub const GENERATOR_STEPS: usize = 2;
const LOSS_LOG_FILE: &str = "training_loss.log";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// Epoch tag of the checkpoint training resumed from, if any.
    pub resumed_from: Option<u64>,
    pub epochs_run: usize,
    pub steps: u64,
    pub last_losses: Option<LossSnapshot>,
}

/// Alternates one discriminator update with two generator updates per batch,
/// writes periodic samples and saves a checkpoint after every epoch.
pub struct Trainer {
    config: Config,
    model: GanModel,
    d_optimizer: nn::Optimizer,
    g_optimizer: nn::Optimizer,
    checkpoints: CheckpointManager,
    validation_noise: NoiseInjector,
    counter: u64,
}

impl Trainer {
    pub fn new(config: Config, device: Device) -> Result<Self> {
        config.validate()?;
        tch::manual_seed(config.training.seed as i64);

        let model = GanModel::new(&config.model, device);
        let adam = || nn::Adam { beta1: config.training.beta1, ..Default::default() };
        let d_optimizer = adam().build(model.discriminator.var_store(), config.training.learning_rate)?;
        let g_optimizer = adam().build(model.generator.var_store(), config.training.learning_rate)?;
        let checkpoints = CheckpointManager::new(config.model_key(), config.training.max_to_keep);
        let validation_noise = NoiseInjector::new(config.patches.noise_std, config.training.seed.wrapping_add(2))?;

        info!(
            "Model {}: generator {} parameters, discriminator {} parameters",
            checkpoints.model_key(),
            model.generator.parameter_count(),
            model.discriminator.parameter_count()
        );

        Ok(Self {
            config,
            model,
            d_optimizer,
            g_optimizer,
            checkpoints,
            validation_noise,
            counter: 1,
        })
    }

    pub fn model(&self) -> &GanModel {
        &self.model
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    pub fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    /// One discriminator update on `d_loss`. The reconstruction is computed
    /// outside the graph so no gradient reaches the generator.
    pub fn discriminator_step(&mut self, genuine: &Tensor, noisy: &Tensor) -> f64 {
        let reconstruction = self.model.generator.forward_reusing_params(noisy);
        let real = self.model.discriminator.forward(genuine);
        let fake = self.model.discriminator.forward(&reconstruction.probs);
        let losses = discriminator_losses(&real.logits, &fake.logits);
        self.d_optimizer.backward_step(&losses.total);
        losses.total.double_value(&[])
    }

    /// One generator update on `g_loss`; only generator parameters move.
    pub fn generator_step(&mut self, genuine: &Tensor, noisy: &Tensor) -> f64 {
        let reconstruction = self.model.generator.forward(noisy);
        let fake = self.model.discriminator.forward(&reconstruction.probs);
        let losses = generator_losses(&fake.logits, &reconstruction.logits, genuine, self.config.training.r_alpha);
        self.g_optimizer.backward_step(&losses.total);
        losses.total.double_value(&[])
    }

    /// Full update for one batch followed by a fresh evaluation of every loss.
    pub fn train_step(&mut self, genuine: &Tensor, noisy: &Tensor) -> LossSnapshot {
        self.discriminator_step(genuine, noisy);
        for _ in 0..GENERATOR_STEPS {
            self.generator_step(genuine, noisy);
        }
        self.model.evaluate_losses(genuine, noisy, self.config.training.r_alpha)
    }

    pub fn train(&mut self, data: &TrainingSet) -> Result<TrainingSummary> {
        let training = self.config.training.clone();
        let paths = self.config.paths.clone();
        let device = self.model.device();

        let batches = training.batches_per_epoch(data.len());
        if batches == 0 {
            return Err(Error::DatasetError(format!(
                "{} training patches cannot fill one batch of {}",
                data.len(),
                training.batch_size
            )));
        }

        let (sample_clean, sample_noisy) = data.sample(training.sample_num);
        let sample_inputs = patches_to_tensor(sample_clean, device)?;
        let sample_noisy = patches_to_tensor(sample_noisy, device)?;
        save_montage(sample_clean, &paths.sample_dir.join("train_input_samples.png"))?;

        let mut loss_log = LossLog::open(&paths.log_dir.join(self.checkpoints.model_key()).join(LOSS_LOG_FILE))?;

        let (resumed, tag) = self.checkpoints.load(&paths.checkpoint_dir, &mut self.model)?;
        let start_epoch = if resumed {
            info!(" [*] Load SUCCESS, resuming after epoch {}", tag);
            tag as usize + 1
        } else {
            info!(" [!] Load failed, training from scratch");
            0
        };
        self.counter = 1 + (start_epoch * batches) as u64;
        loss_log.note(&format!(
            "run start: epochs {}..{}, {} batches per epoch, {} patches",
            start_epoch,
            training.epochs,
            batches,
            data.len()
        ))?;

        let mut last_losses = None;
        for epoch in start_epoch..training.epochs {
            for idx in 0..batches {
                let (clean, noisy) = data.batch(idx, training.batch_size);
                let genuine = patches_to_tensor(clean, device)?;
                let noisy = patches_to_tensor(noisy, device)?;

                let started = Instant::now();
                let losses = self.train_step(&genuine, &noisy);
                metrics::record_step(&losses, started.elapsed().as_secs_f64());

                info!("Epoch: [{:2}] [{:4}/{:4}] {}", epoch, idx, batches, losses.summary());
                loss_log.record(epoch, idx, batches, self.counter, &losses)?;
                last_losses = Some(losses);

                if self.counter % training.sample_interval == 0 {
                    self.write_sample(&sample_inputs, &sample_noisy, epoch, idx, &mut loss_log)?;
                }
                self.counter += 1;
            }

            if let Some(frame) = paths.validation_frame.as_deref() {
                self.validate_epoch(frame, epoch, &mut loss_log)?;
            }
            self.checkpoints.save(&paths.checkpoint_dir, epoch as u64, &self.model)?;
            loss_log.flush()?;
        }

        Ok(TrainingSummary {
            resumed_from: if resumed { Some(tag) } else { None },
            epochs_run: training.epochs.saturating_sub(start_epoch),
            steps: self.counter - 1,
            last_losses,
        })
    }

    fn write_sample(
        &self,
        genuine: &Tensor,
        noisy: &Tensor,
        epoch: usize,
        idx: usize,
        loss_log: &mut LossLog,
    ) -> Result<()> {
        let reconstruction = self.model.generator.forward_reusing_params(noisy);
        let losses = self.model.evaluate_losses(genuine, noisy, self.config.training.r_alpha);
        let path = self
            .config
            .paths
            .sample_dir
            .join(format!("z_test_{:02}_{:04}.png", epoch, idx));
        save_montage(&tensor_to_patches(&reconstruction.probs)?, &path)?;

        let msg = format!("[Sample] d_loss: {:.8}, g_loss: {:.8}", losses.d_loss, losses.g_loss);
        info!("{}", msg);
        loss_log.note(&msg)?;
        let msg = format!("Real Probability: {:.8}", losses.real_probability);
        info!("{}", msg);
        loss_log.note(&msg)?;
        metrics::SAMPLE_REAL_PROBABILITY.set(losses.real_probability);
        Ok(())
    }

    /// Scores the patches of the validation frame, writes montages and logs
    /// the losses of its last full batch.
    fn validate_epoch(&mut self, frame_path: &Path, epoch: usize, loss_log: &mut LossLog) -> Result<()> {
        let frame = match load_frame(frame_path) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Skipping validation for epoch {}: {}", epoch, e);
                return Ok(());
            }
        };
        let frames = [frame];
        let size = PatchSize::new(self.config.patches.height, self.config.patches.width);
        let stride = self.config.patches.stride;
        let (clean, _) = extract_patches(&frames, size, stride)?;
        let noisy = self.validation_noise.inject_noise(&frames, size, stride)?;

        let batch_size = self.config.training.batch_size;
        let report = Scorer::new(&self.model, batch_size)?.score(&noisy)?;
        if report.is_empty() {
            warn!(
                "Validation frame has {} patches, fewer than one batch of {}",
                noisy.len(),
                batch_size
            );
            return Ok(());
        }
        report.write_montages(&noisy, &self.config.paths.sample_dir, &format!("validation_{:02}", epoch))?;

        let end = report.len();
        let start = end - batch_size;
        let device = self.model.device();
        let genuine = patches_to_tensor(&clean[start..end], device)?;
        let corrupted = patches_to_tensor(&noisy[start..end], device)?;
        let losses = self.model.evaluate_losses(&genuine, &corrupted, self.config.training.r_alpha);

        let msg = format!("[Validation {}] {}", epoch, losses.summary());
        info!("{}", msg);
        loss_log.note(&msg)?;
        Ok(())
    }
}
