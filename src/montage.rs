//! Tiles a batch of patches into one image for visual inspection.
use std::fs;
use std::path::Path;
use log::debug;
use ndarray::{s, Array2};
use crate::data::frames::frame_to_gray;
use crate::error::{Error, Result};

const BORDER: usize = 1;
const BORDER_VALUE: f32 = 0.5;

/// Grid shape for `n` tiles: `ceil(sqrt(n))` rows and as many columns as
/// needed to hold the rest.
pub fn grid_shape(n: usize) -> (usize, usize) {
    if n == 0 {
        return (0, 0);
    }
    let rows = (n as f64).sqrt().ceil() as usize;
    let cols = (n + rows - 1) / rows;
    (rows, cols)
}

/// Lays out equally sized patches row by row with a thin gray border.
pub fn montage(patches: &[Array2<f32>]) -> Result<Array2<f32>> {
    let (height, width) = match patches.first() {
        Some(p) => p.dim(),
        None => return Err(Error::InvalidInput("cannot build a montage of zero patches".to_string())),
    };
    let (rows, cols) = grid_shape(patches.len());

    let mut canvas = Array2::from_elem(
        (rows * (height + BORDER) + BORDER, cols * (width + BORDER) + BORDER),
        BORDER_VALUE,
    );
    for (i, patch) in patches.iter().enumerate() {
        if patch.dim() != (height, width) {
            return Err(Error::InvalidInput(format!(
                "montage tile {} has shape {:?}, expected {:?}",
                i,
                patch.dim(),
                (height, width)
            )));
        }
        let top = BORDER + (i / cols) * (height + BORDER);
        let left = BORDER + (i % cols) * (width + BORDER);
        canvas
            .slice_mut(s![top..top + height, left..left + width])
            .assign(patch);
    }
    Ok(canvas)
}

pub fn save_montage(patches: &[Array2<f32>], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let canvas = montage(patches)?;
    frame_to_gray(&canvas).save(path)?;
    debug!("Wrote montage of {} patches to {:?}", patches.len(), path);
    Ok(())
}
