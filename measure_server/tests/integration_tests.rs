use std::path::PathBuf;

use anyhow::Result;
use image::RgbImage;
use measure_server::nn::{
    default_model_dir, FaceDetector, MoveNetModel, PoseEstimator, UltrafaceModel,
    UltrafaceVariant,
};

fn model_dir() -> PathBuf {
    std::env::var_os("MEASURE_MODELS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(default_model_dir)
}

/// Downloads the face model on first use.
#[tokio::test]
#[ignore]
async fn test_ultraface_640_finds_no_face_in_a_blank_frame() -> Result<()> {
    let model = UltrafaceModel::new(UltrafaceVariant::W640H480, 0.5, 0.5, &model_dir()).await?;

    let faces = model.detect_faces(&RgbImage::new(640, 480))?;
    assert!(faces.is_empty());

    Ok(())
}

/// Needs `movenet-singlepose-lightning.onnx` in the model directory.
#[tokio::test]
#[ignore]
async fn test_movenet_sees_nobody_in_a_blank_frame() -> Result<()> {
    let model = MoveNetModel::new(0.2, &model_dir()).await?;

    let pose = model.estimate_pose(&RgbImage::new(640, 480))?;
    assert!(pose.is_none());

    Ok(())
}
