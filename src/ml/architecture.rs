//! Layer geometry shared by the generator and discriminator: kernel sizes,
//! strides, the per-stage spatial sizes and the activation used between stages.
use tch::{nn, Device, Tensor};

pub const KERNEL_SIZE: i64 = 5;
pub const STRIDE: i64 = 2;
pub const PADDING: i64 = 2;
pub const LEAK: f64 = 0.2;
pub const STAGES: usize = 4;

/// Output size of a "same"-padded strided convolution.
pub fn conv_out_size_same(size: i64, stride: i64) -> i64 {
    (size + stride - 1) / stride
}

/// Spatial sizes seen at each encoder stage, input first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpatialPlan {
    pub heights: [i64; STAGES + 1],
    pub widths: [i64; STAGES + 1],
}

impl SpatialPlan {
    pub fn new(height: i64, width: i64) -> Self {
        let mut heights = [height; STAGES + 1];
        let mut widths = [width; STAGES + 1];
        for stage in 1..=STAGES {
            heights[stage] = conv_out_size_same(heights[stage - 1], STRIDE);
            widths[stage] = conv_out_size_same(widths[stage - 1], STRIDE);
        }
        Self { heights, widths }
    }

    /// Spatial size after the last encoder stage.
    pub fn bottleneck(&self) -> (i64, i64) {
        (self.heights[STAGES], self.widths[STAGES])
    }

    /// Output padding of each decoder stage, deepest first, so that every
    /// transposed convolution restores the size of the matching encoder input.
    pub fn height_output_padding(&self) -> [i64; STAGES] {
        decoder_output_padding(&self.heights)
    }

    pub fn width_output_padding(&self) -> [i64; STAGES] {
        decoder_output_padding(&self.widths)
    }
}

fn decoder_output_padding(sizes: &[i64; STAGES + 1]) -> [i64; STAGES] {
    let mut padding = [0; STAGES];
    for (i, pad) in padding.iter_mut().enumerate() {
        let from = sizes[STAGES - i];
        let to = sizes[STAGES - i - 1];
        *pad = to - transposed_out_size(from, 0);
    }
    padding
}

/// Output size of a transposed convolution with the shared kernel geometry.
pub fn transposed_out_size(size: i64, output_padding: i64) -> i64 {
    (size - 1) * STRIDE - 2 * PADDING + KERNEL_SIZE + output_padding
}

pub fn conv_config() -> nn::ConvConfig {
    nn::ConvConfig { stride: STRIDE, padding: PADDING, ..Default::default() }
}

pub fn conv_transpose_config(output_padding: i64) -> nn::ConvTransposeConfig {
    nn::ConvTransposeConfig {
        stride: STRIDE,
        padding: PADDING,
        output_padding,
        ..Default::default()
    }
}

pub fn lrelu(xs: &Tensor) -> Tensor {
    xs.maximum(&(xs * LEAK))
}

/// Panics when a stage produced the wrong channel count. This is a mismatch
/// between the network definition and its configured filter widths.
pub fn assert_channels(network: &str, stage: &str, xs: &Tensor, expected: i64) {
    let channels = xs.size()[1];
    assert_eq!(
        channels, expected,
        "{} stage {} produced {} channels, expected {}",
        network, stage, channels, expected
    );
}

/// Attempts to get the CUDA device if available, otherwise falls back to CPU.
pub fn get_device() -> Device {
    if tch::utils::has_cuda() {
        log::info!("CUDA detected by tch, attempting to use GPU.");
        Device::cuda_if_available()
    } else {
        log::info!("CUDA not detected by tch, using CPU.");
        Device::Cpu
    }
}
