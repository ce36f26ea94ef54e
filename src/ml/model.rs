use std::collections::HashSet;
use tch::{Device, Tensor};
use super::config::ArchitectureConfig;
use super::discriminator::Discriminator;
use super::generator::Generator;
use super::losses::{discriminator_losses, generator_losses, LossSnapshot};
use super::network::AdversarialNetwork;

/// The two co-adversarial networks. Each one owns its own parameter store;
/// nothing is shared between them.
pub struct GanModel {
    arch: ArchitectureConfig,
    device: Device,
    pub generator: Generator,
    pub discriminator: Discriminator,
}

/// Parameters grouped by the network that owns them.
pub struct ParameterPartition {
    pub generator: Vec<Tensor>,
    pub discriminator: Vec<Tensor>,
}

impl ParameterPartition {
    pub fn total(&self) -> usize {
        self.generator.len() + self.discriminator.len()
    }

    /// True when no tensor storage is owned by both networks.
    pub fn is_disjoint(&self) -> bool {
        let g: HashSet<usize> = self.generator.iter().map(|t| t.data_ptr() as usize).collect();
        self.discriminator.iter().all(|t| !g.contains(&(t.data_ptr() as usize)))
    }
}

impl GanModel {
    pub fn new(arch: &ArchitectureConfig, device: Device) -> Self {
        Self {
            arch: arch.clone(),
            device,
            generator: Generator::new(arch, device),
            discriminator: Discriminator::new(arch, device),
        }
    }

    pub fn arch(&self) -> &ArchitectureConfig {
        &self.arch
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn networks(&self) -> [&dyn AdversarialNetwork; 2] {
        [&self.generator, &self.discriminator]
    }

    pub fn partition(&self) -> ParameterPartition {
        ParameterPartition {
            generator: self.generator.trainable_variables(),
            discriminator: self.discriminator.trainable_variables(),
        }
    }

    /// Every trainable tensor of the model.
    pub fn trainable_variables(&self) -> Vec<Tensor> {
        self.networks().iter().flat_map(|n| n.trainable_variables()).collect()
    }

    /// Every stored tensor (including batch-norm running statistics), keyed by
    /// `<network>.<variable>`, sorted by name.
    pub fn named_variables(&self) -> Vec<(String, Tensor)> {
        let mut named: Vec<(String, Tensor)> = self
            .networks()
            .iter()
            .flat_map(|network| {
                network
                    .var_store()
                    .variables()
                    .into_iter()
                    .map(move |(name, tensor)| (format!("{}.{}", network.name(), name), tensor))
            })
            .collect();
        named.sort_by(|a, b| a.0.cmp(&b.0));
        named
    }

    /// Evaluates every loss term without recording gradients. The genuine batch
    /// and the noisy batch are always both supplied.
    pub fn evaluate_losses(&self, genuine: &Tensor, noisy: &Tensor, r_alpha: f64) -> LossSnapshot {
        let reconstruction = self.generator.forward_reusing_params(noisy);
        let real = self.discriminator.forward_reusing_params(genuine);
        let fake = self.discriminator.forward_reusing_params(&reconstruction.probs);

        tch::no_grad(|| {
            let d = discriminator_losses(&real.logits, &fake.logits);
            let g = generator_losses(&fake.logits, &reconstruction.logits, genuine, r_alpha);
            LossSnapshot::new(&d, &g, &real.probs, &fake.probs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Kind;

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

    #[test]
    fn test_partition_is_disjoint_and_exhaustive() {
        let model = GanModel::new(&arch(), Device::Cpu);
        let partition = model.partition();
        assert!(partition.is_disjoint());
        assert_eq!(partition.total(), model.trainable_variables().len());
        assert!(!partition.generator.is_empty());
        assert!(!partition.discriminator.is_empty());

        let all: HashSet<usize> = model.trainable_variables().iter().map(|t| t.data_ptr() as usize).collect();
        let union: HashSet<usize> = partition
            .generator
            .iter()
            .chain(partition.discriminator.iter())
            .map(|t| t.data_ptr() as usize)
            .collect();
        assert_eq!(all, union);
    }

    #[test]
    fn test_named_variables_are_prefixed_by_owner() {
        let model = GanModel::new(&arch(), Device::Cpu);
        let named = model.named_variables();
        assert!(named.iter().all(|(n, _)| n.starts_with("generator.") || n.starts_with("discriminator.")));
        assert!(named.iter().any(|(n, _)| n.ends_with("running_mean")));
    }

    #[test]
    fn test_evaluate_losses_is_non_negative() {
        tch::manual_seed(6);
        let model = GanModel::new(&arch(), Device::Cpu);
        let genuine = Tensor::rand([4, 1, 16, 16], (Kind::Float, Device::Cpu));
        let noisy = (&genuine + Tensor::randn([4, 1, 16, 16], (Kind::Float, Device::Cpu)) * 0.1).clamp(0.0, 1.0);
        let losses = model.evaluate_losses(&genuine, &noisy, 0.2);
        assert!(losses.d_loss_real >= 0.0);
        assert!(losses.d_loss_fake >= 0.0);
        assert!(losses.g_loss >= losses.g_adv_loss);
        assert!((losses.d_loss - losses.d_loss_real - losses.d_loss_fake).abs() < 1e-5);
    }
}
