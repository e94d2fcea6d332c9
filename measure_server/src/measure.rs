//! Body measurements from a detected pose.
use serde::Serialize;

use crate::{
    calibration::{CalibrationFactors, WaistSpan, HEAD_OFFSET_PX, MIN_LANDMARK_CONFIDENCE},
    landmarks::{Landmark, Pose},
};

/// Torso measurements in centimeters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct BodyMeasurements {
    pub shoulder_width: f32,
    pub chest_circumference: f32,
    pub waist_circumference: f32,
}

/// Euclidean distance between two pixel positions.
pub fn pixel_distance(a: (i32, i32), b: (i32, i32)) -> f32 {
    let dx = (b.0 - a.0) as f32;
    let dy = (b.1 - a.1) as f32;
    (dx * dx + dy * dy).sqrt()
}

/// Shoulder width and the chest and waist circumferences derived from it.
///
/// Needs both shoulders and both hips to be confidently visible.
pub fn body_measurements(
    pose: &Pose,
    width: u32,
    height: u32,
    factors: &CalibrationFactors,
) -> Option<BodyMeasurements> {
    let torso = [
        Landmark::LeftShoulder,
        Landmark::RightShoulder,
        Landmark::LeftHip,
        Landmark::RightHip,
    ];
    if torso
        .iter()
        .any(|landmark| !pose.get(*landmark).is_visible(MIN_LANDMARK_CONFIDENCE))
    {
        return None;
    }

    let left_shoulder = pose.get(Landmark::LeftShoulder).to_pixel(width, height);
    let right_shoulder = pose.get(Landmark::RightShoulder).to_pixel(width, height);
    let left_hip = pose.get(Landmark::LeftHip).to_pixel(width, height);
    let right_hip = pose.get(Landmark::RightHip).to_pixel(width, height);

    let shoulder_width_px = pixel_distance(left_shoulder, right_shoulder);
    let waist_width_px = match factors.waist_span {
        WaistSpan::Horizontal => (right_hip.0 - left_hip.0).abs() as f32,
        WaistSpan::Euclidean => pixel_distance(left_hip, right_hip),
    };

    let shoulder_width = factors.width_cm(shoulder_width_px);
    let waist_width = factors.width_cm(waist_width_px);

    Some(BodyMeasurements {
        shoulder_width,
        chest_circumference: factors.chest_circumference_cm(shoulder_width),
        waist_circumference: factors.waist_circumference_cm(waist_width),
    })
}

/// Head and foot points used for the height estimate.
///
/// The head point is the nose moved down by [`HEAD_OFFSET_PX`], the foot point
/// is whichever ankle the model is more confident about.
pub fn height_points(pose: &Pose, width: u32, height: u32) -> Option<((i32, i32), (i32, i32))> {
    let left_ankle = pose.get(Landmark::LeftAnkle);
    let right_ankle = pose.get(Landmark::RightAnkle);
    let ankle = if left_ankle.confidence > right_ankle.confidence {
        left_ankle
    } else {
        right_ankle
    };

    let foot = ankle.to_pixel(width, height);
    let (head_x, head_y) = pose.get(Landmark::Nose).to_pixel(width, height);
    let head = (head_x, head_y + HEAD_OFFSET_PX);

    // A zero coordinate means the keypoint sits on the border, i.e. was not found
    if foot.0 == 0 || foot.1 == 0 || head.0 == 0 || head.1 == 0 {
        return None;
    }

    Some((head, foot))
}

/// Body height in whole centimeters.
pub fn height_cm(pose: &Pose, width: u32, height: u32, factors: &CalibrationFactors) -> Option<f32> {
    let (head, foot) = height_points(pose, width, height)?;
    Some(factors.height_cm(pixel_distance(head, foot)))
}
