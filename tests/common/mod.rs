use std::fs;
use std::path::{Path, PathBuf};
use ndarray::Array2;
use novelty_detector::config::Config;
use novelty_detector::data::frames::frame_to_gray;
use novelty_detector::error::Result;
use novelty_detector::ml::ArchitectureConfig;

// Helper to create a small, fast configuration rooted in `dir`
pub fn create_test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.model = ArchitectureConfig {
        input_height: 16,
        input_width: 16,
        output_height: 16,
        output_width: 16,
        c_dim: 1,
        gf_dim: 2,
        df_dim: 2,
        z_dim: 8,
    };
    config.patches.height = 16;
    config.patches.width = 16;
    config.patches.stride = 8;
    config.training.batch_size = 4;
    config.training.sample_num = 4;
    config.training.epochs = 2;
    config.training.sample_interval = 2;
    config.dataset.address = dir.join("dataset");
    config.dataset.n_fetch_data = 3;
    config.paths.checkpoint_dir = dir.join("checkpoint");
    config.paths.log_dir = dir.join("log");
    config.paths.sample_dir = dir.join("samples");
    config
}

/// Smooth synthetic frame; `shift` varies the pattern between frames.
pub fn create_test_frame(rows: usize, cols: usize, shift: usize) -> Array2<f32> {
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        0.3 + 0.4 * (((r + c + shift) % 20) as f32 / 20.0)
    })
}

/// Writes `per_dir` PNG frames into each of the named sub-directories.
pub fn write_frame_dirs(root: &Path, dirs: &[&str], per_dir: usize, rows: usize, cols: usize) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for (d, name) in dirs.iter().enumerate() {
        let dir = root.join(name);
        fs::create_dir_all(&dir)?;
        for i in 0..per_dir {
            let path = dir.join(format!("{:03}.png", i));
            frame_to_gray(&create_test_frame(rows, cols, d * per_dir + i)).save(&path)?;
            written.push(path);
        }
    }
    Ok(written)
}
