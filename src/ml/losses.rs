//! Composite adversarial losses. Every term is a batch mean of sigmoid
//! cross-entropy computed on logits.
use serde::{Deserialize, Serialize};
use tch::{Reduction, Tensor};

/// Fixed multiplier applied to the refinement weight in the generator loss.
pub const REFINEMENT_SCALE: f64 = 3.0;

fn bce_with_logits(logits: &Tensor, targets: &Tensor) -> Tensor {
    logits.binary_cross_entropy_with_logits::<Tensor>(targets, None, None, Reduction::Mean)
}

pub struct DiscriminatorLosses {
    pub real: Tensor,
    pub fake: Tensor,
    pub total: Tensor,
}

pub struct GeneratorLosses {
    pub adversarial: Tensor,
    pub refinement: Tensor,
    pub total: Tensor,
}

/// `real_logits` score genuine samples, `fake_logits` score reconstructions.
pub fn discriminator_losses(real_logits: &Tensor, fake_logits: &Tensor) -> DiscriminatorLosses {
    let real = bce_with_logits(real_logits, &real_logits.ones_like());
    let fake = bce_with_logits(fake_logits, &fake_logits.zeros_like());
    let total = &real + &fake;
    DiscriminatorLosses { real, fake, total }
}

/// Non-saturating adversarial term plus the weighted refinement term
/// `3 * r_alpha * BCE(reconstruction_logits, genuine)`.
pub fn generator_losses(
    fake_logits: &Tensor,
    reconstruction_logits: &Tensor,
    genuine: &Tensor,
    r_alpha: f64,
) -> GeneratorLosses {
    let adversarial = bce_with_logits(fake_logits, &fake_logits.ones_like());
    let refinement = bce_with_logits(reconstruction_logits, genuine);
    let total = &adversarial + &refinement * (REFINEMENT_SCALE * r_alpha);
    GeneratorLosses { adversarial, refinement, total }
}

/// Scalar view of one evaluation of every loss term, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossSnapshot {
    pub d_loss_real: f64,
    pub d_loss_fake: f64,
    pub d_loss: f64,
    pub g_adv_loss: f64,
    pub g_r_loss: f64,
    pub g_loss: f64,
    /// Mean discriminator probability on genuine inputs.
    pub real_probability: f64,
    /// Mean discriminator probability on reconstructions.
    pub fake_probability: f64,
}

impl LossSnapshot {
    pub fn new(
        d: &DiscriminatorLosses,
        g: &GeneratorLosses,
        real_probs: &Tensor,
        fake_probs: &Tensor,
    ) -> Self {
        Self {
            d_loss_real: d.real.double_value(&[]),
            d_loss_fake: d.fake.double_value(&[]),
            d_loss: d.total.double_value(&[]),
            g_adv_loss: g.adversarial.double_value(&[]),
            g_r_loss: g.refinement.double_value(&[]),
            g_loss: g.total.double_value(&[]),
            real_probability: real_probs.mean(tch::Kind::Float).double_value(&[]),
            fake_probability: fake_probs.mean(tch::Kind::Float).double_value(&[]),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Fake_d_loss: {:.8}, Real_d_loss: {:.8}, g_loss: {:.8}, g_r_loss: {:.8}",
            self.d_loss_fake, self.d_loss_real, self.g_loss, self.g_r_loss
        )
    }

    pub fn probability_summary(&self) -> String {
        format!(
            "D_real_prob: {:.8}, D_fake_prob: {:.8}",
            self.real_probability, self.fake_probability
        )
    }
}
