use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use log::{info, warn};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use crate::config::Config;
use crate::error::{Error, Result};
use super::frames::load_frame;
use super::patches::{extract_patches, NoiseInjector, PatchLocation, PatchSize};

const MNIST_SIDE: usize = 28;
const FRAME_EXTENSIONS: [&str; 6] = ["tif", "tiff", "png", "jpg", "jpeg", "bmp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Mnist,
    Ucsd,
}

impl FromStr for DatasetKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mnist" => Ok(DatasetKind::Mnist),
            "ucsd" => Ok(DatasetKind::Ucsd),
            _ => Err(Error::UnknownDataset(s.to_string())),
        }
    }
}

/// Clean patches of the normal class with their index-aligned noisy copies.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub clean: Vec<Array2<f32>>,
    pub noisy: Vec<Array2<f32>>,
    pub locations: Vec<PatchLocation>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.clean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clean.is_empty()
    }

    /// Batch `idx` of size `batch_size` as `(clean, noisy)`.
    pub fn batch(&self, idx: usize, batch_size: usize) -> (&[Array2<f32>], &[Array2<f32>]) {
        let start = idx * batch_size;
        let end = (start + batch_size).min(self.len());
        (&self.clean[start..end], &self.noisy[start..end])
    }

    /// Leading `n` examples, held out for periodic sample montages.
    pub fn sample(&self, n: usize) -> (&[Array2<f32>], &[Array2<f32>]) {
        let n = n.min(self.len());
        (&self.clean[..n], &self.noisy[..n])
    }
}

/// Loads the normal-class frames of the configured dataset. MNIST digits of
/// `attention_label` are returned as 28x28 frames; UCSD returns a random
/// subset of `n_fetch_data` frames.
pub fn load_frames(config: &Config, rng: &mut StdRng) -> Result<Vec<Array2<f32>>> {
    let kind: DatasetKind = config.dataset.name.parse()?;
    match kind {
        DatasetKind::Mnist => load_mnist_digits(&config.dataset.address, config.dataset.attention_label),
        DatasetKind::Ucsd => {
            let paths = collect_frame_paths(&config.dataset.address, &config.dataset.input_fname_pattern)?;
            let selected = select_frames(&paths, config.dataset.n_fetch_data, rng);
            info!("Fetched {} of {} frames", selected.len(), paths.len());
            selected.iter().map(|p| load_frame(p)).collect()
        }
    }
}

pub fn build_training_set(config: &Config) -> Result<TrainingSet> {
    let mut rng = StdRng::seed_from_u64(config.training.seed);
    let frames = load_frames(config, &mut rng)?;

    let size = PatchSize::new(config.patches.height, config.patches.width);
    let stride = config.patches.stride;
    let (clean, locations) = extract_patches(&frames, size, stride)?;
    let mut injector = NoiseInjector::new(config.patches.noise_std, config.training.seed.wrapping_add(1))?;
    let noisy = injector.inject_noise(&frames, size, stride)?;

    if clean.is_empty() {
        return Err(Error::DatasetError(format!(
            "no {}x{} patches could be cut from {} frames",
            size.height,
            size.width,
            frames.len()
        )));
    }
    info!("Training set: {} patches from {} frames", clean.len(), frames.len());
    Ok(TrainingSet { clean, noisy, locations })
}

/// Loads the MNIST training images of one digit.
pub fn load_mnist_digits(address: &Path, attention_label: i64) -> Result<Vec<Array2<f32>>> {
    let mnist = tch::vision::mnist::load_dir(address)?;
    let keep = mnist.train_labels.eq(attention_label).nonzero().squeeze_dim(1);
    let images = mnist.train_images.index_select(0, &keep);
    let count = images.size()[0] as usize;
    let flat = Vec::<f32>::try_from(&images.to_kind(tch::Kind::Float).flatten(0, -1))?;
    info!("MNIST: {} training images with label {}", count, attention_label);
    digits_from_flat(&flat, count)
}

fn digits_from_flat(flat: &[f32], count: usize) -> Result<Vec<Array2<f32>>> {
    let side = MNIST_SIDE * MNIST_SIDE;
    if flat.len() != count * side {
        return Err(Error::DatasetError(format!(
            "expected {} pixels for {} digits, got {}",
            count * side,
            count,
            flat.len()
        )));
    }
    flat.chunks(side)
        .map(|chunk| Ok(Array2::from_shape_vec((MNIST_SIDE, MNIST_SIDE), chunk.to_vec())?))
        .collect()
}

/// `Train*` matches any name starting with `Train`; without a trailing `*`
/// the name must match exactly.
pub fn matches_pattern(name: &str, pattern: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => name == pattern,
    }
}

/// Frame files inside the sub-directories of `address` matching `pattern`,
/// sorted by directory then file name.
pub fn collect_frame_paths(address: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(address)
        .map_err(|e| Error::DatasetError(format!("cannot list {:?}: {}", address, e)))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| matches_pattern(n, pattern))
                .unwrap_or(false)
        })
        .collect();
    dirs.sort();

    let mut frames = Vec::new();
    for dir in dirs {
        let mut files: Vec<PathBuf> = match fs::read_dir(&dir) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| is_frame_file(path))
                .collect(),
            Err(e) => {
                warn!("Skipping unreadable directory {:?}: {}", dir, e);
                continue;
            }
        };
        files.sort();
        frames.extend(files);
    }

    if frames.is_empty() {
        return Err(Error::DatasetError(format!(
            "no frames under {:?} matching {}",
            address, pattern
        )));
    }
    Ok(frames)
}

fn is_frame_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
}

/// Random subset of `n` paths without repetition, kept in listing order.
pub fn select_frames(paths: &[PathBuf], n: usize, rng: &mut StdRng) -> Vec<PathBuf> {
    if n >= paths.len() {
        return paths.to_vec();
    }
    let mut picked: Vec<usize> = (0..paths.len()).collect::<Vec<_>>()
        .choose_multiple(rng, n)
        .copied()
        .collect();
    picked.sort_unstable();
    picked.into_iter().map(|i| paths[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frames::frame_to_gray;
    use tempfile::tempdir;

    #[test]
    fn test_dataset_kind_parsing() {
        assert_eq!("mnist".parse::<DatasetKind>().unwrap(), DatasetKind::Mnist);
        assert_eq!("UCSD".parse::<DatasetKind>().unwrap(), DatasetKind::Ucsd);
        assert!(matches!("cifar".parse::<DatasetKind>(), Err(Error::UnknownDataset(_))));
    }

    #[test]
    fn test_pattern_matching() {
        assert!(matches_pattern("Train001", "Train*"));
        assert!(!matches_pattern("Test001", "Train*"));
        assert!(matches_pattern("Train001", "Train001"));
        assert!(!matches_pattern("Train0012", "Train001"));
    }

    #[test]
    fn test_select_frames_without_repetition() {
        let paths: Vec<PathBuf> = (0..20).map(|i| PathBuf::from(format!("{:03}.tif", i))).collect();
        let mut rng = StdRng::seed_from_u64(3);
        let picked = select_frames(&paths, 5, &mut rng);
        assert_eq!(picked.len(), 5);
        let mut dedup = picked.clone();
        dedup.dedup();
        assert_eq!(dedup.len(), 5);
        assert_eq!(select_frames(&paths, 50, &mut rng).len(), 20);
    }

    #[test]
    fn test_digits_from_flat() -> Result<()> {
        let flat = vec![0.5f32; 2 * 784];
        let digits = digits_from_flat(&flat, 2)?;
        assert_eq!(digits.len(), 2);
        assert_eq!(digits[0].dim(), (28, 28));
        assert!(digits_from_flat(&flat, 3).is_err());
        Ok(())
    }

    #[test]
    fn test_ucsd_training_set_from_directory() -> Result<()> {
        let dir = tempdir()?;
        for sub in ["Train001", "Train002", "Test001"] {
            fs::create_dir(dir.path().join(sub))?;
            for i in 0..3 {
                let frame = Array2::from_shape_fn((60, 60), |(r, c)| ((r * c + i) % 7) as f32 / 7.0);
                frame_to_gray(&frame).save(dir.path().join(sub).join(format!("{:03}.png", i)))?;
            }
        }
        fs::write(dir.path().join("Train001").join("notes.txt"), "not a frame")?;

        let paths = collect_frame_paths(dir.path(), "Train*")?;
        assert_eq!(paths.len(), 6);

        let mut config = Config::default();
        config.dataset.address = dir.path().to_path_buf();
        config.dataset.n_fetch_data = 4;
        let set = build_training_set(&config)?;
        // 60x60 frames, 45x45 patches, stride 10: rows 0,10 cols 0,10 per frame.
        assert_eq!(set.len(), 4 * 4);
        assert_eq!(set.noisy.len(), set.len());
        assert_eq!(set.sample(64).0.len(), set.len());
        let (clean, noisy) = set.batch(1, 5);
        assert_eq!((clean.len(), noisy.len()), (5, 5));
        Ok(())
    }

    #[test]
    fn test_unknown_dataset_is_rejected() {
        let mut config = Config::default();
        config.dataset.name = "cifar".to_string();
        assert!(matches!(build_training_set(&config), Err(Error::UnknownDataset(_))));
    }
}
