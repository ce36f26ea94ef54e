use tch::{nn, nn::Module, nn::ModuleT, Device, Tensor};
use super::architecture::{assert_channels, conv_config, lrelu, KERNEL_SIZE};
use super::config::ArchitectureConfig;
use super::network::{AdversarialNetwork, NetOutput};

#[derive(Debug)]
struct ConvStage {
    conv: nn::Conv2D,
    bn: nn::BatchNorm,
    out_channels: i64,
}

/// Real/fake classifier: four strided conv stages followed by a single
/// linear projection to one logit per batch element.
pub struct Discriminator {
    var_store: nn::VarStore,
    stages: Vec<ConvStage>,
    head: nn::Linear,
}

impl Discriminator {
    pub fn new(arch: &ArchitectureConfig, device: Device) -> Self {
        let var_store = nn::VarStore::new(device);
        let root = var_store.root();
        let widths = arch.discriminator_widths();

        let mut stages = Vec::with_capacity(widths.len());
        let mut in_channels = arch.c_dim;
        for (i, &out_channels) in widths.iter().enumerate() {
            let conv = nn::conv2d(
                &root / format!("h{}_conv", i),
                in_channels,
                out_channels,
                KERNEL_SIZE,
                conv_config(),
            );
            let bn = nn::batch_norm2d(&root / format!("bn{}", i), out_channels, Default::default());
            stages.push(ConvStage { conv, bn, out_channels });
            in_channels = out_channels;
        }

        let (bottom_h, bottom_w) = arch.spatial_plan().bottleneck();
        let head = nn::linear(&root / "h3_lin", in_channels * bottom_h * bottom_w, 1, Default::default());

        Self { var_store, stages, head }
    }
}

impl AdversarialNetwork for Discriminator {
    fn name(&self) -> &'static str {
        "discriminator"
    }

    fn forward_t(&self, xs: &Tensor, train: bool) -> NetOutput {
        let batch_size = xs.size()[0];
        let mut h = xs.shallow_clone();
        for (i, stage) in self.stages.iter().enumerate() {
            h = lrelu(&stage.bn.forward_t(&stage.conv.forward(&h), train));
            assert_channels(self.name(), &format!("h{}", i), &h, stage.out_channels);
        }
        let logits = self.head.forward(&h.view([batch_size, -1]));
        NetOutput::from_logits(logits)
    }

    fn var_store(&self) -> &nn::VarStore {
        &self.var_store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Kind;

    fn arch() -> ArchitectureConfig {
        ArchitectureConfig {
            input_height: 45,
            input_width: 45,
            output_height: 45,
            output_width: 45,
            c_dim: 1,
            gf_dim: 2,
            df_dim: 2,
            z_dim: 8,
        }
    }

    #[test]
    fn test_one_probability_per_sample() {
        tch::manual_seed(3);
        let discriminator = Discriminator::new(&arch(), Device::Cpu);
        let xs = Tensor::rand([6, 1, 45, 45], (Kind::Float, Device::Cpu));
        let out = discriminator.forward(&xs);
        assert_eq!(out.probs.size(), vec![6, 1]);
        assert!(out.probs.min().double_value(&[]) >= 0.0);
        assert!(out.probs.max().double_value(&[]) <= 1.0);
    }

    #[test]
    fn test_same_parameters_score_real_and_fake() {
        tch::manual_seed(4);
        let discriminator = Discriminator::new(&arch(), Device::Cpu);
        let xs = Tensor::rand([4, 1, 45, 45], (Kind::Float, Device::Cpu));
        let a = discriminator.forward_reusing_params(&xs);
        let b = discriminator.forward_reusing_params(&xs);
        assert!(a.logits.equal(&b.logits));
        assert!(discriminator.forward(&xs).logits.detach().equal(&a.logits));
    }

    #[test]
    fn test_head_matches_bottleneck() {
        let discriminator = Discriminator::new(&arch(), Device::Cpu);
        let variables = discriminator.var_store().variables();
        let weight = &variables["h3_lin.weight"];
        // 32 * df_dim channels over a 3x3 bottleneck.
        assert_eq!(weight.size(), vec![1, 64 * 9]);
    }
}
