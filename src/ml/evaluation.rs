use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub roc_auc: f64,
}

/// Anomalous is the positive class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positives: usize,
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl ConfusionMatrix {
    pub fn total(&self) -> usize {
        self.true_positives + self.true_negatives + self.false_positives + self.false_negatives
    }
}

/// Compares discriminator scores against ground truth. A score below the
/// threshold predicts an anomaly, so lower scores rank as more anomalous.
pub struct ModelEvaluator {
    threshold: f64,
}

impl ModelEvaluator {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// `anomalous[i]` is the ground truth for `scores[i]`.
    pub fn evaluate(&self, scores: &[f64], anomalous: &[bool]) -> Result<ModelMetrics> {
        if scores.len() != anomalous.len() {
            return Err(Error::InvalidInput(format!(
                "{} scores but {} labels",
                scores.len(),
                anomalous.len()
            )));
        }
        if scores.is_empty() {
            return Err(Error::InvalidInput("nothing to evaluate".to_string()));
        }

        let mut confusion_matrix = ConfusionMatrix::default();
        for (&score, &actual) in scores.iter().zip(anomalous.iter()) {
            let predicted = score < self.threshold;
            match (predicted, actual) {
                (true, true) => confusion_matrix.true_positives += 1,
                (false, false) => confusion_matrix.true_negatives += 1,
                (true, false) => confusion_matrix.false_positives += 1,
                (false, true) => confusion_matrix.false_negatives += 1,
            }
        }

        let total = confusion_matrix.total();
        let accuracy = (confusion_matrix.true_positives + confusion_matrix.true_negatives) as f64 / total as f64;

        let precision_denominator = confusion_matrix.true_positives + confusion_matrix.false_positives;
        let precision = if precision_denominator > 0 {
            confusion_matrix.true_positives as f64 / precision_denominator as f64
        } else {
            0.0
        };

        let recall_denominator = confusion_matrix.true_positives + confusion_matrix.false_negatives;
        let recall = if recall_denominator > 0 {
            confusion_matrix.true_positives as f64 / recall_denominator as f64
        } else {
            0.0
        };

        let f1_score = if precision + recall > 0.0 {
            2.0 * (precision * recall) / (precision + recall)
        } else {
            0.0
        };

        Ok(ModelMetrics {
            accuracy,
            precision,
            recall,
            f1_score,
            confusion_matrix,
            roc_auc: roc_auc(scores, anomalous),
        })
    }
}

/// Area under the ROC curve with `1 - score` as the anomaly score, computed
/// from average ranks so tied scores count one half. Returns 0.5 when only
/// one class is present.
pub fn roc_auc(scores: &[f64], anomalous: &[bool]) -> f64 {
    let positives = anomalous.iter().filter(|&&a| a).count();
    let negatives = anomalous.len() - positives;
    if positives == 0 || negatives == 0 {
        return 0.5;
    }

    // Descending score means ascending anomaly score.
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut positive_rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let average_rank = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            if anomalous[k] {
                positive_rank_sum += average_rank;
            }
        }
        i = j + 1;
    }

    let p = positives as f64;
    (positive_rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64)
}
