//! Frame loading, patch extraction and training-set assembly.
pub mod dataset;
pub mod frames;
pub mod patches;

pub use dataset::{build_training_set, load_frames, DatasetKind, TrainingSet};
pub use frames::load_frame;
pub use patches::{extract_patches, patches_to_tensor, tensor_to_patches, NoiseInjector, PatchLocation, PatchSize};
