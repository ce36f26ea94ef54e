use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::fs;
use crate::data::dataset::DatasetKind;
use crate::error::{Error, Result};
use crate::ml::config::{ArchitectureConfig, MLConfigError, TrainingConfig};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub model: ArchitectureConfig,
    pub training: TrainingConfig,
    pub dataset: DatasetConfig,
    pub patches: PatchConfig,
    pub paths: PathsConfig,
    pub scoring: ScoringConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DatasetConfig {
    /// `mnist` or `UCSD`.
    pub name: String,
    /// Root directory of the dataset.
    pub address: PathBuf,
    /// Sub-directory name filter for UCSD mode; a trailing `*` matches any suffix.
    pub input_fname_pattern: String,
    /// Digit kept as the normal class in MNIST mode.
    pub attention_label: i64,
    /// Number of frames fetched at random in UCSD mode.
    pub n_fetch_data: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            name: "UCSD".to_string(),
            address: PathBuf::from("./dataset/UCSD_Anomaly_Dataset.v1p2/UCSDped2/Train"),
            input_fname_pattern: "Train*".to_string(),
            attention_label: 1,
            n_fetch_data: 10,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PatchConfig {
    pub height: usize,
    pub width: usize,
    pub stride: usize,
    /// Standard deviation of the additive Gaussian noise.
    pub noise_std: f64,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self { height: 45, width: 45, stride: 10, noise_std: 0.1 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PathsConfig {
    pub checkpoint_dir: PathBuf,
    pub log_dir: PathBuf,
    pub sample_dir: PathBuf,
    /// Frame scored end to end after every epoch.
    pub validation_frame: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from("checkpoint"),
            log_dir: PathBuf::from("log"),
            sample_dir: PathBuf::from("samples"),
            validation_frame: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ScoringConfig {
    /// Patches whose discriminator score falls below this are flagged anomalous.
    pub threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self { threshold: 0.5 }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&config_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        fs::write(path, config_str)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.dataset.name.parse::<DatasetKind>()?;
        self.model.validate()?;
        self.training.validate()?;

        if self.patches.height as i64 != self.model.input_height
            || self.patches.width as i64 != self.model.input_width
        {
            return Err(MLConfigError::InvalidConfig(format!(
                "patch size {}x{} does not match model input {}x{}",
                self.patches.height, self.patches.width, self.model.input_height, self.model.input_width
            ))
            .into());
        }

        if self.patches.stride < 1 {
            return Err(MLConfigError::InvalidConfig("patch stride must be at least 1".to_string()).into());
        }

        if !(self.patches.noise_std >= 0.0) {
            return Err(MLConfigError::InvalidConfig(format!(
                "noise_std must be non-negative, got {}",
                self.patches.noise_std
            ))
            .into());
        }

        if !(0.0..=1.0).contains(&self.scoring.threshold) {
            return Err(Error::ConfigError(format!(
                "scoring threshold must lie in [0, 1], got {}",
                self.scoring.threshold
            )));
        }

        Ok(())
    }

    /// Identity of a trained model: `{dataset}_{batch}_{height}_{width}`.
    pub fn model_key(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.dataset.name, self.training.batch_size, self.model.output_height, self.model.output_width
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model_key(), "UCSD_64_45_45");
    }

    #[test]
    fn test_save_and_load_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.training.epochs = 3;
        config.dataset.name = "mnist".to_string();
        config.save(&path)?;

        let loaded = Config::load(&path)?;
        assert_eq!(loaded.training.epochs, 3);
        assert_eq!(loaded.model_key(), "mnist_64_45_45");
        Ok(())
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(&path, "[training]\nbatch_size = 8\n")?;
        let loaded = Config::load(&path)?;
        assert_eq!(loaded.training.batch_size, 8);
        assert_eq!(loaded.patches.stride, 10);
        Ok(())
    }

    #[test]
    fn test_unknown_dataset_name_is_rejected() {
        let mut config = Config::default();
        config.dataset.name = "svhn".to_string();
        assert!(matches!(config.validate(), Err(Error::UnknownDataset(_))));
    }

    #[test]
    fn test_colour_model_is_rejected() {
        let mut config = Config::default();
        config.model.c_dim = 3;
        assert!(matches!(
            config.validate(),
            Err(Error::MLConfigError(MLConfigError::InvalidDimensions { .. }))
        ));
    }

    #[test]
    fn test_patch_size_must_match_model_input() {
        let mut config = Config::default();
        config.patches.height = 28;
        assert!(config.validate().is_err());
    }
}
