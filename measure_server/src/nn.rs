//! Pretrained face and pose models run with tract.
//!
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::RgbImage;
use ndarray::s;
use tract_onnx::prelude::*;

use crate::{
    landmarks::{Keypoint, Landmark, Pose},
    utils::download_file,
};

type NnModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;
type NnOut = TVec<TValue>;

/// Bounding box `[x_top_left, y_top_left, x_bottom_right, y_bottom_right]` in
/// coordinates relative to the image size.
pub type Bbox = [f32; 4];

/// Positive additive constant to avoid divide-by-zero.
const EPS: f32 = 1.0e-7;

pub trait FaceDetector: Send + Sync {
    /// Faces found in the frame with their confidence, most confident first.
    fn detect_faces(&self, frame: &RgbImage) -> Result<Vec<(Bbox, f32)>>;
}

pub trait PoseEstimator: Send + Sync {
    /// Keypoints of the person in the frame, `None` if nobody is visible.
    fn estimate_pose(&self, frame: &RgbImage) -> Result<Option<Pose>>;
}

/// An ONNX file and where to fetch it from if it is missing.
#[derive(Clone, Copy, Debug)]
pub struct ModelSource {
    pub file_name: &'static str,
    pub url: Option<&'static str>,
}

impl ModelSource {
    /// Path of the model in `model_dir`, downloading it first if needed.
    pub async fn ensure(&self, model_dir: &Path) -> Result<PathBuf> {
        let path = model_dir.join(self.file_name);
        if path.exists() {
            return Ok(path);
        }

        match self.url {
            Some(url) => {
                log::info!("Downloading model {} from {}", self.file_name, url);
                tokio::fs::create_dir_all(model_dir).await?;
                download_file(&reqwest::Client::new(), url, &path)
                    .await
                    .with_context(|| format!("failed to download {url}"))?;
                Ok(path)
            }
            None => bail!(
                "model {} not found, place it at {}",
                self.file_name,
                path.display()
            ),
        }
    }
}

/// Default directory models are stored in.
pub fn default_model_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("measure_server")
}

#[derive(Clone, Copy, Debug)]
pub enum UltrafaceVariant {
    W640H480,
    W320H240,
}

impl UltrafaceVariant {
    pub fn width_height(&self) -> (u32, u32) {
        match self {
            Self::W640H480 => (640, 480),
            Self::W320H240 => (320, 240),
        }
    }

    pub fn source(&self) -> ModelSource {
        match self {
            Self::W640H480 => ModelSource {
                file_name: "ultraface-RFB-640.onnx",
                url: Some("https://github.com/onnx/models/raw/main/validated/vision/body_analysis/ultraface/models/version-RFB-640.onnx"),
            },
            Self::W320H240 => ModelSource {
                file_name: "ultraface-RFB-320.onnx",
                url: Some("https://github.com/onnx/models/raw/main/validated/vision/body_analysis/ultraface/models/version-RFB-320.onnx"),
            },
        }
    }
}

pub struct UltrafaceModel {
    model: NnModel,
    width: u32,
    height: u32,
    max_iou: f32,
    min_confidence: f32,
}

impl UltrafaceModel {
    pub async fn new(
        variant: UltrafaceVariant,
        max_iou: f32,
        min_confidence: f32,
        model_dir: &Path,
    ) -> Result<Self> {
        let path = variant.source().ensure(model_dir).await?;
        let (width, height) = variant.width_height();
        let model = load_model(&path, tvec!(1, 3, height as usize, width as usize))?;
        log::info!("Loaded face model {}", path.display());

        Ok(Self {
            model,
            width,
            height,
            max_iou,
            min_confidence,
        })
    }

    fn preproc(&self, input: &RgbImage) -> Tensor {
        let resized: RgbImage = image::imageops::resize(
            input,
            self.width,
            self.height,
            image::imageops::FilterType::Triangle,
        );

        tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, self.width as usize),
            |(_, c, y, x)| {
                // Note: Mean/std are from MobileNet, not from Ultraface, but work well
                let mean = [0.485, 0.456, 0.406][c];
                let std = [0.229, 0.224, 0.225][c];
                (resized[(x as _, y as _)][c] as f32 / 255.0 - mean) / std
            },
        )
        .into()
    }

}

impl FaceDetector for UltrafaceModel {
    fn detect_faces(&self, frame: &RgbImage) -> Result<Vec<(Bbox, f32)>> {
        let raw_nn_out = self.model.run(tvec!(self.preproc(frame).into_tvalue()))?;
        decode_ultraface(raw_nn_out, self.min_confidence, self.max_iou)
    }
}

/// Single-person MoveNet pose estimator.
pub struct MoveNetModel {
    model: NnModel,
    input_size: u32,
    min_score: f32,
}

impl MoveNetModel {
    pub const SOURCE: ModelSource = ModelSource {
        file_name: "movenet-singlepose-lightning.onnx",
        url: None,
    };

    pub async fn new(min_score: f32, model_dir: &Path) -> Result<Self> {
        let path = Self::SOURCE.ensure(model_dir).await?;
        let input_size = 192;
        let model = load_model(
            &path,
            tvec!(1, input_size as usize, input_size as usize, 3),
        )?;
        log::info!("Loaded pose model {}", path.display());

        Ok(Self {
            model,
            input_size,
            min_score,
        })
    }

    fn preproc(&self, input: &RgbImage) -> Tensor {
        let resized: RgbImage = image::imageops::resize(
            input,
            self.input_size,
            self.input_size,
            image::imageops::FilterType::Triangle,
        );

        tract_ndarray::Array4::from_shape_fn(
            (1, self.input_size as usize, self.input_size as usize, 3),
            |(_, y, x, c)| resized[(x as _, y as _)][c] as f32,
        )
        .into()
    }

}

impl PoseEstimator for MoveNetModel {
    fn estimate_pose(&self, frame: &RgbImage) -> Result<Option<Pose>> {
        let raw_nn_out = self.model.run(tvec!(self.preproc(frame).into_tvalue()))?;
        decode_movenet(raw_nn_out, self.min_score)
    }
}

/// Faces from the raw Ultraface outputs, most confident first.
///
/// Output 0 holds `[background, face]` scores per anchor, output 1 the boxes of the anchors.
fn decode_ultraface(
    raw_nn_out: NnOut,
    min_confidence: f32,
    max_iou: f32,
) -> Result<Vec<(Bbox, f32)>> {
    let confidences = raw_nn_out[0]
        .to_array_view::<f32>()?
        .slice(s![0, .., 1])
        .to_vec();

    let bboxes: Vec<f32> = raw_nn_out[1].to_array_view::<f32>()?.iter().cloned().collect();
    let bboxes: Vec<Bbox> = bboxes
        .chunks_exact(4)
        .map(|x| [x[0], x[1], x[2], x[3]])
        .collect();

    let mut bboxes_with_confidences: Vec<_> = bboxes
        .into_iter()
        .zip(confidences)
        .filter(|(_, confidence)| *confidence > min_confidence)
        .collect();

    bboxes_with_confidences.sort_by(|a, b| a.1.total_cmp(&b.1));

    Ok(non_maximum_suppression(bboxes_with_confidences, max_iou))
}

/// Pose from the raw MoveNet output, `None` below a mean keypoint score of `min_score`.
fn decode_movenet(raw_nn_out: NnOut, min_score: f32) -> Result<Option<Pose>> {
    // Output is [1, 1, 17, 3] holding (y, x, score) per keypoint
    let output = raw_nn_out[0].to_array_view::<f32>()?;
    let output = output.into_shape((Landmark::COUNT, 3))?;

    let mut keypoints = [Keypoint::default(); Landmark::COUNT];
    for (i, keypoint) in keypoints.iter_mut().enumerate() {
        *keypoint = Keypoint::new(output[[i, 1]], output[[i, 0]], output[[i, 2]]);
    }

    let pose = Pose::new(keypoints);
    match pose.score() {
        score if score >= min_score => Ok(Some(pose)),
        _ => Ok(None),
    }
}

fn load_model(path: &Path, input_shape: TVec<usize>) -> Result<NnModel> {
    let input_fact = InferenceFact::dt_shape(f32::datum_type(), input_shape);
    let model = tract_onnx::onnx()
        .model_for_path(path)?
        .with_input_fact(0, input_fact)?
        .into_optimized()?
        .into_runnable()?;

    Ok(model)
}

/// Run non-maximum-suppression on candidate bounding boxes.
///
/// Start with the most confident bounding box and iterate over all other bounding boxes in the
/// order of sinking confidence. Grow the vector of selected bounding boxes by adding only those
/// candidates which do not have a maximum IoU `max_iou` with already chosen bounding boxes.
fn non_maximum_suppression(
    mut sorted_bboxes_with_confidences: Vec<(Bbox, f32)>,
    max_iou: f32,
) -> Vec<(Bbox, f32)> {
    let mut selected: Vec<(Bbox, f32)> = vec![];
    'candidates: loop {
        // Get next most confident bbox from the back of ascending-sorted vector.
        // All boxes fulfill the minimum confidence criterium.
        match sorted_bboxes_with_confidences.pop() {
            Some((bbox, confidence)) => {
                // Check for overlap with any of the selected bboxes
                for (selected_bbox, _) in selected.iter() {
                    if iou(&bbox, selected_bbox) > max_iou {
                        continue 'candidates;
                    }
                }

                // bbox has no large overlap with any of the selected ones, add it
                selected.push((bbox, confidence))
            }
            None => break 'candidates,
        }
    }

    selected
}

/// Calculate the intersection-over-union metric for two bounding boxes.
fn iou(bbox_a: &Bbox, bbox_b: &Bbox) -> f32 {
    // Calculate corner points of overlap box
    // If the boxes do not overlap, the corner-points will be ill defined, i.e. the top left
    // corner point will be below and to the right of the bottom right corner point. In this case,
    // the area will be zero.
    let overlap_box: Bbox = [
        f32::max(bbox_a[0], bbox_b[0]),
        f32::max(bbox_a[1], bbox_b[1]),
        f32::min(bbox_a[2], bbox_b[2]),
        f32::min(bbox_a[3], bbox_b[3]),
    ];

    let overlap_area = bbox_area(&overlap_box);

    // Avoid division-by-zero with `EPS`
    overlap_area / (bbox_area(bbox_a) + bbox_area(bbox_b) - overlap_area + EPS)
}

/// Calculate the area enclosed by a bounding box.
///
/// If the bounding box is ill-defined by having the bottom-right point above/to the left of the
/// top-left point, the area is zero.
fn bbox_area(bbox: &Bbox) -> f32 {
    let width = bbox[2] - bbox[0];
    let height = bbox[3] - bbox[1];
    if width < 0.0 || height < 0.0 {
        return 0.0;
    }

    width * height
}
