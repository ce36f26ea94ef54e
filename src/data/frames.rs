use std::path::Path;
use image::GrayImage;
use log::debug;
use ndarray::Array2;
use crate::error::{Error, Result};

/// Reads an image file as a grayscale frame with values in [0, 1].
pub fn load_frame(path: &Path) -> Result<Array2<f32>> {
    let img = image::open(path)
        .map_err(|e| Error::DatasetError(format!("failed to read frame {:?}: {}", path, e)))?
        .to_luma8();
    debug!("Loaded frame {:?} ({}x{})", path, img.width(), img.height());
    Ok(gray_to_frame(&img))
}

pub fn gray_to_frame(img: &GrayImage) -> Array2<f32> {
    let (width, height) = img.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(r, c)| {
        img.get_pixel(c as u32, r as u32)[0] as f32 / 255.0
    })
}

/// Quantizes a [0, 1] frame to 8 bits; out-of-range values are clamped.
pub fn frame_to_gray(frame: &Array2<f32>) -> GrayImage {
    let (rows, cols) = frame.dim();
    GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        let v = frame[[y as usize, x as usize]].clamp(0.0, 1.0);
        image::Luma([(v * 255.0).round() as u8])
    })
}
