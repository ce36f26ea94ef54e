use prometheus::{Counter, Encoder, Gauge, Histogram, Registry, TextEncoder};
use lazy_static::lazy_static;
use std::sync::Once;
use crate::ml::losses::LossSnapshot;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref TRAINING_STEPS: Counter = Counter::new(
        "training_steps_total",
        "Total number of adversarial training steps"
    ).unwrap();

    pub static ref DISCRIMINATOR_LOSS: Gauge = Gauge::new(
        "discriminator_loss",
        "Discriminator loss at the last training step"
    ).unwrap();

    pub static ref GENERATOR_LOSS: Gauge = Gauge::new(
        "generator_loss",
        "Generator loss at the last training step"
    ).unwrap();

    pub static ref REFINEMENT_LOSS: Gauge = Gauge::new(
        "generator_refinement_loss",
        "Reconstruction term of the generator loss at the last training step"
    ).unwrap();

    pub static ref SAMPLE_REAL_PROBABILITY: Gauge = Gauge::new(
        "sample_real_probability",
        "Mean discriminator probability on the held-out sample batch"
    ).unwrap();

    pub static ref STEP_LATENCY: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "training_step_seconds",
            "Wall time of one discriminator and two generator updates"
        ).buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0])
    ).unwrap();

    pub static ref PATCHES_SCORED: Counter = Counter::new(
        "patches_scored_total",
        "Total number of patches scored"
    ).unwrap();
}

static INIT: Once = Once::new();

/// Registers every metric with the crate registry. Safe to call more than once.
pub fn init() -> Result<(), prometheus::Error> {
    let mut result = Ok(());
    INIT.call_once(|| {
        result = register_all();
    });
    result
}

fn register_all() -> Result<(), prometheus::Error> {
    REGISTRY.register(Box::new(TRAINING_STEPS.clone()))?;
    REGISTRY.register(Box::new(DISCRIMINATOR_LOSS.clone()))?;
    REGISTRY.register(Box::new(GENERATOR_LOSS.clone()))?;
    REGISTRY.register(Box::new(REFINEMENT_LOSS.clone()))?;
    REGISTRY.register(Box::new(SAMPLE_REAL_PROBABILITY.clone()))?;
    REGISTRY.register(Box::new(STEP_LATENCY.clone()))?;
    REGISTRY.register(Box::new(PATCHES_SCORED.clone()))?;
    Ok(())
}

pub fn record_step(losses: &LossSnapshot, seconds: f64) {
    TRAINING_STEPS.inc();
    DISCRIMINATOR_LOSS.set(losses.d_loss);
    GENERATOR_LOSS.set(losses.g_loss);
    REFINEMENT_LOSS.set(losses.g_r_loss);
    STEP_LATENCY.observe(seconds);
}

/// Text exposition of everything registered so far.
pub fn gather_text() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent_and_gathers() {
        assert!(init().is_ok());
        assert!(init().is_ok());
        PATCHES_SCORED.inc_by(3.0);
        let text = gather_text().unwrap();
        assert!(text.contains("patches_scored_total"));
        assert!(text.contains("training_step_seconds"));
    }
}
