//! Patch extraction and synthetic corruption of frames.
use ndarray::{s, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tch::{Device, Tensor};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchSize {
    pub height: usize,
    pub width: usize,
}

impl PatchSize {
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }
}

/// Top-left corner of a patch inside the frame it was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatchLocation {
    pub frame: usize,
    pub row: usize,
    pub col: usize,
}

/// Cuts every frame into overlapping patches, row-major within a frame and
/// frame by frame. Frames smaller than the patch contribute nothing.
pub fn extract_patches(
    frames: &[Array2<f32>],
    size: PatchSize,
    stride: usize,
) -> Result<(Vec<Array2<f32>>, Vec<PatchLocation>)> {
    if stride == 0 {
        return Err(Error::InvalidInput("patch stride must be positive".to_string()));
    }
    if size.height == 0 || size.width == 0 {
        return Err(Error::InvalidInput(format!(
            "patch size must be positive, got {}x{}",
            size.height, size.width
        )));
    }

    let mut patches = Vec::new();
    let mut locations = Vec::new();
    for (frame_idx, frame) in frames.iter().enumerate() {
        let (rows, cols) = frame.dim();
        if rows < size.height || cols < size.width {
            continue;
        }
        for row in (0..=rows - size.height).step_by(stride) {
            for col in (0..=cols - size.width).step_by(stride) {
                patches.push(
                    frame
                        .slice(s![row..row + size.height, col..col + size.width])
                        .to_owned(),
                );
                locations.push(PatchLocation { frame: frame_idx, row, col });
            }
        }
    }
    Ok((patches, locations))
}

/// Adds clamped Gaussian noise to frames. Seeded, so a run is reproducible.
pub struct NoiseInjector {
    rng: StdRng,
    normal: Normal<f32>,
}

impl NoiseInjector {
    pub fn new(std_dev: f64, seed: u64) -> Result<Self> {
        let normal = Normal::new(0.0, std_dev as f32)
            .map_err(|e| Error::InvalidInput(format!("noise std {}: {}", std_dev, e)))?;
        Ok(Self { rng: StdRng::seed_from_u64(seed), normal })
    }

    pub fn corrupt(&mut self, frame: &Array2<f32>) -> Array2<f32> {
        frame.mapv(|v| (v + self.normal.sample(&mut self.rng)).clamp(0.0, 1.0))
    }

    /// Noisy patches index-aligned with `extract_patches(frames, size, stride)`:
    /// each frame is corrupted once, then cut the same way.
    pub fn inject_noise(
        &mut self,
        frames: &[Array2<f32>],
        size: PatchSize,
        stride: usize,
    ) -> Result<Vec<Array2<f32>>> {
        let noisy: Vec<Array2<f32>> = frames.iter().map(|f| self.corrupt(f)).collect();
        let (patches, _) = extract_patches(&noisy, size, stride)?;
        Ok(patches)
    }
}

/// Stacks equally sized patches into a `[N, 1, H, W]` float tensor.
pub fn patches_to_tensor(patches: &[Array2<f32>], device: Device) -> Result<Tensor> {
    let (height, width) = match patches.first() {
        Some(p) => p.dim(),
        None => return Err(Error::InvalidInput("no patches to stack".to_string())),
    };

    let mut data = Vec::with_capacity(patches.len() * height * width);
    for patch in patches {
        if patch.dim() != (height, width) {
            return Err(Error::InvalidInput(format!(
                "patch of shape {:?} does not match {:?}",
                patch.dim(),
                (height, width)
            )));
        }
        data.extend(patch.iter().copied());
    }

    Ok(Tensor::from_slice(&data)
        .view([patches.len() as i64, 1, height as i64, width as i64])
        .to_device(device))
}

/// Splits a `[N, 1, H, W]` tensor back into `N` patches.
pub fn tensor_to_patches(xs: &Tensor) -> Result<Vec<Array2<f32>>> {
    let size = xs.size();
    if size.len() != 4 || size[1] != 1 || size[2] == 0 || size[3] == 0 {
        return Err(Error::InvalidInput(format!("expected a [N, 1, H, W] tensor, got {:?}", size)));
    }
    let (height, width) = (size[2] as usize, size[3] as usize);
    let flat = Vec::<f32>::try_from(
        &xs.detach().to_device(Device::Cpu).to_kind(tch::Kind::Float).flatten(0, -1),
    )?;
    flat.chunks(height * width)
        .map(|chunk| Ok(Array2::from_shape_vec((height, width), chunk.to_vec())?))
        .collect()
}
