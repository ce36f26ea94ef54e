mod common;

use std::fs;
use ndarray::Array2;
use novelty_detector::data::build_training_set;
use novelty_detector::data::frames::frame_to_gray;
use novelty_detector::error::{Error, Result};
use novelty_detector::ml::{describe_model, run_scoring_session, run_training_session};
use tempfile::tempdir;

use common::{create_test_config, write_frame_dirs};

#[test_log::test]
fn test_train_then_score_end_to_end() -> Result<()> {
    let dir = tempdir()?;
    let config = create_test_config(dir.path());
    write_frame_dirs(&config.dataset.address, &["Train001", "Train002"], 2, 32, 32)?;

    // 3 frames of 32x32 with 16x16 patches at stride 8: 9 patches each.
    let data = build_training_set(&config)?;
    assert_eq!(data.len(), 27);

    let summary = run_training_session(config.clone())?;
    assert_eq!(summary.epochs_run, 2);
    assert_eq!(summary.steps, 2 * 6);

    let description = describe_model(&config)?;
    assert_eq!(description.model_key, "UCSD_4_16_16");
    assert_eq!(description.snapshots.len(), 2);

    let test_dir = dir.path().join("test");
    fs::create_dir_all(&test_dir)?;
    let normal = test_dir.join("normal.png");
    let odd = test_dir.join("odd.png");
    frame_to_gray(&common::create_test_frame(32, 32, 1)).save(&normal)?;
    frame_to_gray(&Array2::from_shape_fn((32, 32), |(r, c)| ((r * 7 + c * 13) % 2) as f32)).save(&odd)?;

    let frames = vec![normal, odd];
    let session = run_scoring_session(&config, &frames, Some(&[false, true]))?;
    assert_eq!(session.checkpoint_step, 1);
    // 18 patches in batches of 4: 16 scored, 2 dropped.
    assert_eq!(session.report.len(), 16);
    assert_eq!(session.report.dropped, 2);
    assert_eq!(session.frames.len(), 2);
    let metrics = session.metrics.expect("labels were supplied");
    assert_eq!(metrics.confusion_matrix.total(), 2);
    assert!(config.paths.sample_dir.join("generated_score_1.png").exists());
    Ok(())
}

#[test_log::test]
fn test_scoring_without_checkpoint_fails() -> Result<()> {
    let dir = tempdir()?;
    let config = create_test_config(dir.path());
    let frames = write_frame_dirs(&dir.path().join("frames"), &["Test001"], 1, 32, 32)?;
    let result = run_scoring_session(&config, &frames, None);
    assert!(matches!(result, Err(Error::CheckpointNotFound(_))));
    Ok(())
}

#[test_log::test]
fn test_unknown_dataset_is_fatal() {
    let dir = tempdir().unwrap();
    let mut config = create_test_config(dir.path());
    config.dataset.name = "svhn".to_string();
    assert!(matches!(run_scoring_session(&config, &[], None), Err(Error::UnknownDataset(_))));
    assert!(matches!(describe_model(&config), Err(Error::UnknownDataset(_))));
    assert!(matches!(run_training_session(config), Err(Error::UnknownDataset(_))));
}
