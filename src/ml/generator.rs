//! Convolutional encoder-decoder that reconstructs clean images from
//! (possibly noise-corrupted) inputs.
use tch::{nn, nn::Module, nn::ModuleT, Device, Tensor};
use super::architecture::{
    assert_channels, conv_config, conv_transpose_config, lrelu, KERNEL_SIZE, STAGES,
};
use super::config::ArchitectureConfig;
use super::network::{AdversarialNetwork, NetOutput};

#[derive(Debug)]
struct EncoderStage {
    conv: nn::Conv2D,
    bn: nn::BatchNorm,
    out_channels: i64,
}

#[derive(Debug)]
struct DecoderStage {
    deconv: nn::ConvTranspose2D,
    bn: nn::BatchNorm,
    out_channels: i64,
}

pub struct Generator {
    var_store: nn::VarStore,
    encoder: Vec<EncoderStage>,
    decoder: Vec<DecoderStage>,
}

impl Generator {
    pub fn new(arch: &ArchitectureConfig, device: Device) -> Self {
        let var_store = nn::VarStore::new(device);
        let root = var_store.root();
        let widths = arch.generator_widths();

        let mut encoder = Vec::with_capacity(STAGES);
        let mut in_channels = arch.c_dim;
        for (i, &out_channels) in widths.iter().enumerate() {
            let conv = nn::conv2d(
                &root / format!("encoder_h{}_conv", i),
                in_channels,
                out_channels,
                KERNEL_SIZE,
                conv_config(),
            );
            let bn = nn::batch_norm2d(&root / format!("bn{}", i), out_channels, Default::default());
            encoder.push(EncoderStage { conv, bn, out_channels });
            in_channels = out_channels;
        }

        // Mirror the encoder: 32x -> 16x -> 8x -> 4x -> image channels.
        let decoder_widths = [widths[2], widths[1], widths[0], arch.c_dim];
        let output_padding = arch.spatial_plan().height_output_padding();
        let mut decoder = Vec::with_capacity(STAGES);
        for (i, &out_channels) in decoder_widths.iter().enumerate() {
            let level = STAGES - 1 - i;
            let deconv = nn::conv_transpose2d(
                &root / format!("decoder_h{}_deconv", level),
                in_channels,
                out_channels,
                KERNEL_SIZE,
                conv_transpose_config(output_padding[i]),
            );
            let bn = nn::batch_norm2d(&root / format!("bn{}", STAGES + i), out_channels, Default::default());
            decoder.push(DecoderStage { deconv, bn, out_channels });
            in_channels = out_channels;
        }

        Self { var_store, encoder, decoder }
    }
}

impl AdversarialNetwork for Generator {
    fn name(&self) -> &'static str {
        "generator"
    }

    fn forward_t(&self, xs: &Tensor, train: bool) -> NetOutput {
        let mut h = xs.shallow_clone();
        for (i, stage) in self.encoder.iter().enumerate() {
            h = lrelu(&stage.bn.forward_t(&stage.conv.forward(&h), train));
            assert_channels(self.name(), &format!("encoder_h{}", i), &h, stage.out_channels);
        }

        let last = self.decoder.len() - 1;
        for (i, stage) in self.decoder.iter().enumerate() {
            h = stage.bn.forward_t(&stage.deconv.forward(&h), train);
            if i != last {
                h = lrelu(&h);
            }
            assert_channels(self.name(), &format!("decoder_h{}", last - i), &h, stage.out_channels);
        }

        NetOutput::from_logits(h)
    }

    fn var_store(&self) -> &nn::VarStore {
        &self.var_store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Kind;

    fn small_arch(size: i64) -> ArchitectureConfig {
        ArchitectureConfig {
            input_height: size,
            input_width: size,
            output_height: size,
            output_width: size,
            c_dim: 1,
            gf_dim: 2,
            df_dim: 2,
            z_dim: 8,
        }
    }

    #[test]
    fn test_output_matches_configured_shape() {
        tch::manual_seed(0);
        for size in [16, 28, 45] {
            let arch = small_arch(size);
            let generator = Generator::new(&arch, Device::Cpu);
            let xs = Tensor::rand([4, 1, size, size], (Kind::Float, Device::Cpu));
            let out = generator.forward(&xs);
            assert_eq!(out.probs.size(), vec![4, arch.c_dim, arch.output_height, arch.output_width]);
            assert_eq!(out.logits.size(), out.probs.size());
        }
    }

    #[test]
    fn test_reconstruction_is_bounded() {
        tch::manual_seed(1);
        let generator = Generator::new(&small_arch(16), Device::Cpu);
        let xs = Tensor::rand([4, 1, 16, 16], (Kind::Float, Device::Cpu));
        let out = generator.forward_reusing_params(&xs);
        assert!(out.probs.min().double_value(&[]) >= 0.0);
        assert!(out.probs.max().double_value(&[]) <= 1.0);
    }

    #[test]
    fn test_reuse_is_deterministic() {
        tch::manual_seed(2);
        let generator = Generator::new(&small_arch(16), Device::Cpu);
        let xs = Tensor::rand([4, 1, 16, 16], (Kind::Float, Device::Cpu));
        let first = generator.forward_reusing_params(&xs);
        let second = generator.forward_reusing_params(&xs);
        assert!(first.probs.equal(&second.probs));
        assert!(first.logits.equal(&second.logits));

        let tracked = generator.forward(&xs);
        assert!(tracked.probs.detach().equal(&first.probs));
    }

    #[test]
    fn test_parameters_live_in_own_store() {
        let generator = Generator::new(&small_arch(16), Device::Cpu);
        let names = generator.var_store().variables();
        assert!(names.keys().any(|n| n.starts_with("encoder_h0_conv")));
        assert!(names.keys().any(|n| n.starts_with("decoder_h0_deconv")));
        // 4 conv + 4 deconv (weight, bias) and 8 batch norms (weight, bias).
        assert_eq!(generator.trainable_variables().len(), 32);
    }
}
