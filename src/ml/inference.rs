use std::collections::BTreeMap;
use std::path::Path;
use log::{debug, info, warn};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tch::Device;
use crate::data::patches::{patches_to_tensor, tensor_to_patches, PatchLocation};
use crate::error::{Error, Result};
use crate::metrics;
use crate::montage::save_montage;
use super::model::GanModel;
use super::network::AdversarialNetwork;

/// Result of scoring a single patch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatchScore {
    /// Position of the patch in the scored input list.
    pub index: usize,
    /// Discriminator probability of the reconstruction, `D(G(x))`. Normal
    /// patches reconstruct well and score high.
    pub score: f64,
    /// Discriminator probability of the raw patch, `D(x)`.
    pub input_score: f64,
    /// Mean squared difference between the patch and its reconstruction.
    pub reconstruction_error: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameSummary {
    pub frame: usize,
    pub patches: usize,
    pub anomalous_patches: usize,
    pub min_score: f64,
    pub mean_score: f64,
    pub mean_reconstruction_error: f64,
}

impl FrameSummary {
    pub fn is_anomalous(&self) -> bool {
        self.anomalous_patches > 0
    }
}

/// Scores and reconstructions of every patch that filled a batch, in input order.
#[derive(Debug, Clone)]
pub struct ScoreReport {
    pub scores: Vec<PatchScore>,
    pub reconstructions: Vec<Array2<f32>>,
    /// Trailing patches left out because they did not fill a batch.
    pub dropped: usize,
}

impl ScoreReport {
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// `D(G(x))` per scored patch, the sequence anomaly decisions use.
    pub fn discriminator_scores(&self) -> Vec<f64> {
        self.scores.iter().map(|s| s.score).collect()
    }

    /// `D(x)` per scored patch: the discriminator applied to the raw input.
    pub fn input_scores(&self) -> Vec<f64> {
        self.scores.iter().map(|s| s.input_score).collect()
    }

    /// Indices of patches scored below `threshold`.
    pub fn anomalies(&self, threshold: f64) -> Vec<usize> {
        self.scores
            .iter()
            .filter(|s| s.score < threshold)
            .map(|s| s.index)
            .collect()
    }

    /// Groups patch results by the frame they were cut from.
    pub fn frame_summaries(&self, locations: &[PatchLocation], threshold: f64) -> Result<Vec<FrameSummary>> {
        let mut grouped: BTreeMap<usize, Vec<&PatchScore>> = BTreeMap::new();
        for score in &self.scores {
            let location = locations.get(score.index).ok_or_else(|| {
                Error::InvalidInput(format!("no location for patch {}", score.index))
            })?;
            grouped.entry(location.frame).or_default().push(score);
        }

        Ok(grouped
            .into_iter()
            .map(|(frame, scores)| {
                let n = scores.len() as f64;
                FrameSummary {
                    frame,
                    patches: scores.len(),
                    anomalous_patches: scores.iter().filter(|s| s.score < threshold).count(),
                    min_score: scores.iter().map(|s| s.score).fold(f64::INFINITY, f64::min),
                    mean_score: scores.iter().map(|s| s.score).sum::<f64>() / n,
                    mean_reconstruction_error: scores.iter().map(|s| s.reconstruction_error).sum::<f64>() / n,
                }
            })
            .collect())
    }

    /// Writes `generated_{tag}.png` and `input_{tag}.png` into `directory`.
    pub fn write_montages(&self, inputs: &[Array2<f32>], directory: &Path, tag: &str) -> Result<()> {
        if self.is_empty() {
            warn!("Nothing scored, skipping montages for {}", tag);
            return Ok(());
        }
        save_montage(&self.reconstructions, &directory.join(format!("generated_{}.png", tag)))?;
        save_montage(&inputs[..self.len()], &directory.join(format!("input_{}.png", tag)))?;
        Ok(())
    }
}

/// Runs a trained generator and discriminator over patches in fixed-size
/// batches. Never updates parameters.
pub struct Scorer<'a> {
    model: &'a GanModel,
    batch_size: usize,
}

impl<'a> Scorer<'a> {
    pub fn new(model: &'a GanModel, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidInput("scoring batch size must be positive".to_string()));
        }
        Ok(Self { model, batch_size })
    }

    pub fn score(&self, patches: &[Array2<f32>]) -> Result<ScoreReport> {
        let batches = patches.len() / self.batch_size;
        let dropped = patches.len() - batches * self.batch_size;
        if dropped > 0 {
            warn!(
                "Dropping {} trailing patches that do not fill a batch of {}",
                dropped, self.batch_size
            );
        }

        let mut scores = Vec::with_capacity(batches * self.batch_size);
        let mut reconstructions = Vec::with_capacity(batches * self.batch_size);
        for batch in 0..batches {
            let offset = batch * self.batch_size;
            let chunk = &patches[offset..offset + self.batch_size];
            let xs = patches_to_tensor(chunk, self.model.device())?;

            let reconstruction = self.model.generator.forward_reusing_params(&xs);
            let fake = self.model.discriminator.forward_reusing_params(&reconstruction.probs);
            let real = self.model.discriminator.forward_reusing_params(&xs);

            let fake_scores = Vec::<f32>::try_from(&fake.probs.to_device(Device::Cpu).flatten(0, -1))?;
            let real_scores = Vec::<f32>::try_from(&real.probs.to_device(Device::Cpu).flatten(0, -1))?;
            let generated = tensor_to_patches(&reconstruction.probs)?;

            for (i, (input, output)) in chunk.iter().zip(generated.into_iter()).enumerate() {
                let reconstruction_error = (input - &output).mapv(|v| v * v).mean().unwrap_or(0.0) as f64;
                scores.push(PatchScore {
                    index: offset + i,
                    score: fake_scores[i] as f64,
                    input_score: real_scores[i] as f64,
                    reconstruction_error,
                });
                reconstructions.push(output);
            }
            debug!("Scored batch {}/{}", batch + 1, batches);
        }

        metrics::PATCHES_SCORED.inc_by(scores.len() as f64);
        info!("Scored {} patches ({} dropped)", scores.len(), dropped);
        Ok(ScoreReport { scores, reconstructions, dropped })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::config::ArchitectureConfig;
    use tempfile::tempdir;

    fn arch() -> ArchitectureConfig {
        ArchitectureConfig {
            input_height: 16,
            input_width: 16,
            output_height: 16,
            output_width: 16,
            c_dim: 1,
            gf_dim: 2,
            df_dim: 2,
            z_dim: 8,
        }
    }

    fn patches(n: usize) -> Vec<Array2<f32>> {
        (0..n)
            .map(|i| Array2::from_shape_fn((16, 16), |(r, c)| ((r + c + i) % 16) as f32 / 16.0))
            .collect()
    }

    #[test]
    fn test_trailing_partial_batch_is_dropped_in_order() -> Result<()> {
        tch::manual_seed(20);
        let model = GanModel::new(&arch(), Device::Cpu);
        let scorer = Scorer::new(&model, 4)?;
        let report = scorer.score(&patches(11))?;

        assert_eq!(report.len(), 8);
        assert_eq!(report.dropped, 3);
        assert_eq!(report.reconstructions.len(), 8);
        let indices: Vec<usize> = report.scores.iter().map(|s| s.index).collect();
        assert_eq!(indices, (0..8).collect::<Vec<_>>());
        for s in &report.scores {
            assert!((0.0..=1.0).contains(&s.score));
            assert!((0.0..=1.0).contains(&s.input_score));
            assert!(s.reconstruction_error >= 0.0);
        }
        Ok(())
    }

    #[test]
    fn test_fewer_patches_than_a_batch_yield_nothing() -> Result<()> {
        let model = GanModel::new(&arch(), Device::Cpu);
        let report = Scorer::new(&model, 4)?.score(&patches(3))?;
        assert!(report.is_empty());
        assert_eq!(report.dropped, 3);
        Ok(())
    }

    #[test]
    fn test_scoring_leaves_parameters_untouched() -> Result<()> {
        tch::manual_seed(21);
        let model = GanModel::new(&arch(), Device::Cpu);
        let before: Vec<_> = model.trainable_variables().iter().map(|t| t.copy()).collect();

        Scorer::new(&model, 4)?.score(&patches(8))?;

        for (a, b) in before.iter().zip(model.trainable_variables().iter()) {
            assert!(a.equal(b));
        }
        Ok(())
    }

    #[test]
    fn test_frame_summaries_group_by_frame() -> Result<()> {
        let report = ScoreReport {
            scores: vec![
                PatchScore { index: 0, score: 0.9, input_score: 0.8, reconstruction_error: 0.01 },
                PatchScore { index: 1, score: 0.2, input_score: 0.3, reconstruction_error: 0.05 },
                PatchScore { index: 2, score: 0.7, input_score: 0.6, reconstruction_error: 0.03 },
            ],
            reconstructions: Vec::new(),
            dropped: 0,
        };
        let locations = vec![
            PatchLocation { frame: 0, row: 0, col: 0 },
            PatchLocation { frame: 0, row: 0, col: 10 },
            PatchLocation { frame: 1, row: 0, col: 0 },
        ];

        let frames = report.frame_summaries(&locations, 0.5)?;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].patches, 2);
        assert!(frames[0].is_anomalous());
        assert!((frames[0].min_score - 0.2).abs() < 1e-12);
        assert!(!frames[1].is_anomalous());
        assert_eq!(report.anomalies(0.5), vec![1]);
        assert_eq!(report.discriminator_scores(), vec![0.9, 0.2, 0.7]);
        assert_eq!(report.input_scores(), vec![0.8, 0.3, 0.6]);
        assert!(report.frame_summaries(&locations[..1], 0.5).is_err());
        Ok(())
    }

    #[test]
    fn test_montages_are_written() -> Result<()> {
        let dir = tempdir()?;
        let model = GanModel::new(&arch(), Device::Cpu);
        let inputs = patches(4);
        let report = Scorer::new(&model, 4)?.score(&inputs)?;
        report.write_montages(&inputs, dir.path(), "3")?;
        assert!(dir.path().join("generated_3.png").exists());
        assert!(dir.path().join("input_3.png").exists());
        Ok(())
    }
}
