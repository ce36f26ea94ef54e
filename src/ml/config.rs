use serde::{Deserialize, Serialize};
use thiserror::Error;
use super::architecture::SpatialPlan;

#[derive(Error, Debug)]
pub enum MLConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid learning rate: {0}")]
    InvalidLearningRate(f64),
    #[error("Invalid batch size: {0}")]
    InvalidBatchSize(usize),
    #[error("Invalid number of epochs: {0}")]
    InvalidEpochs(usize),
    #[error("Invalid refinement weight: {0}")]
    InvalidRefinementWeight(f64),
    #[error("Invalid filter width for {network}: {value}")]
    InvalidFilterWidth { network: &'static str, value: i64 },
    #[error("Invalid image dimensions: {height}x{width}x{channels}")]
    InvalidDimensions { height: i64, width: i64, channels: i64 },
}

/// Shapes and filter widths shared by the generator and the discriminator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchitectureConfig {
    pub input_height: i64,
    pub input_width: i64,
    pub output_height: i64,
    pub output_width: i64,
    /// Color channels; 1 for grayscale.
    pub c_dim: i64,
    /// Base filter count of the generator; encoder widths are 4x, 8x, 16x, 32x.
    pub gf_dim: i64,
    /// Base filter count of the discriminator.
    pub df_dim: i64,
    /// Latent noise dimensionality. The reconstruction generator is driven by
    /// corrupted images, not latent vectors, so this only takes part in validation.
    pub z_dim: i64,
}

impl Default for ArchitectureConfig {
    fn default() -> Self {
        Self {
            input_height: 45,
            input_width: 45,
            output_height: 45,
            output_width: 45,
            c_dim: 1,
            gf_dim: 16,
            df_dim: 16,
            z_dim: 100,
        }
    }
}

impl ArchitectureConfig {
    pub fn image_dims(&self) -> [i64; 3] {
        [self.c_dim, self.input_height, self.input_width]
    }

    /// Generator encoder widths: 4x, 8x, 16x, 32x the base filter count.
    pub fn generator_widths(&self) -> [i64; 4] {
        stage_widths(self.gf_dim)
    }

    pub fn discriminator_widths(&self) -> [i64; 4] {
        stage_widths(self.df_dim)
    }

    pub fn spatial_plan(&self) -> SpatialPlan {
        SpatialPlan::new(self.input_height, self.input_width)
    }

    pub fn validate(&self) -> Result<(), MLConfigError> {
        // Frames are loaded as single-channel luminance.
        if self.input_height < 1 || self.input_width < 1 || self.c_dim != 1 {
            return Err(MLConfigError::InvalidDimensions {
                height: self.input_height,
                width: self.input_width,
                channels: self.c_dim,
            });
        }

        // The generator reconstructs its input, so both ends share one shape.
        if self.output_height != self.input_height || self.output_width != self.input_width {
            return Err(MLConfigError::InvalidConfig(format!(
                "Output size {}x{} must equal input size {}x{}",
                self.output_height, self.output_width, self.input_height, self.input_width
            )));
        }

        if self.gf_dim < 1 {
            return Err(MLConfigError::InvalidFilterWidth { network: "generator", value: self.gf_dim });
        }
        if self.df_dim < 1 {
            return Err(MLConfigError::InvalidFilterWidth { network: "discriminator", value: self.df_dim });
        }
        if self.z_dim < 1 {
            return Err(MLConfigError::InvalidConfig(format!("z_dim must be positive, got {}", self.z_dim)));
        }

        let plan = self.spatial_plan();
        if plan.height_output_padding() != plan.width_output_padding() {
            return Err(MLConfigError::InvalidConfig(format!(
                "Input size {}x{} needs different decoder output padding per axis ({:?} vs {:?})",
                self.input_height,
                self.input_width,
                plan.height_output_padding(),
                plan.width_output_padding()
            )));
        }

        Ok(())
    }
}

fn stage_widths(base: i64) -> [i64; 4] {
    [base * 4, base * 8, base * 16, base * 32]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub learning_rate: f64,
    /// Adam momentum term.
    pub beta1: f64,
    pub epochs: usize,
    pub batch_size: usize,
    /// Held-out sample batch size used for periodic montages.
    pub sample_num: usize,
    /// Upper bound on the number of training examples per epoch.
    pub train_size: Option<usize>,
    /// Weight of the refinement (reconstruction) term in the generator loss.
    pub r_alpha: f64,
    /// Steps between sample montages.
    pub sample_interval: u64,
    pub seed: u64,
    /// Maximum number of checkpoints retained on disk.
    pub max_to_keep: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.002,
            beta1: 0.5,
            epochs: 40,
            batch_size: 64,
            sample_num: 64,
            train_size: None,
            r_alpha: 0.2,
            sample_interval: 500,
            seed: 42,
            max_to_keep: 40,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), MLConfigError> {
        if self.learning_rate <= 0.0 || self.learning_rate >= 1.0 {
            return Err(MLConfigError::InvalidLearningRate(self.learning_rate));
        }

        if !(0.0..1.0).contains(&self.beta1) {
            return Err(MLConfigError::InvalidConfig(format!("beta1 must lie in [0, 1), got {}", self.beta1)));
        }

        if self.batch_size < 1 {
            return Err(MLConfigError::InvalidBatchSize(self.batch_size));
        }

        if self.epochs < 1 {
            return Err(MLConfigError::InvalidEpochs(self.epochs));
        }

        if !(self.r_alpha >= 0.0) {
            return Err(MLConfigError::InvalidRefinementWeight(self.r_alpha));
        }

        if self.sample_interval < 1 {
            return Err(MLConfigError::InvalidConfig("sample_interval must be at least 1".to_string()));
        }

        if self.max_to_keep < 1 {
            return Err(MLConfigError::InvalidConfig("max_to_keep must be at least 1".to_string()));
        }

        Ok(())
    }

    /// Number of full batches per epoch for `available` training examples.
    pub fn batches_per_epoch(&self, available: usize) -> usize {
        let usable = match self.train_size {
            Some(cap) => available.min(cap),
            None => available,
        };
        usable / self.batch_size
    }
}
