//! Empirical pixel-to-centimeter calibration.
//!
//! None of these factors are derived. They were tuned by hand against tape
//! measurements taken at the recommended standing distance of about three
//! meters, see [`PERFECT_DISTANCE_CM`].
use std::ops::Range;

use clap::ValueEnum;

/// Distance from the camera at which the reference photo was taken.
pub const KNOWN_DISTANCE_CM: f32 = 230.0;

/// Real width of the face in the reference photo.
pub const KNOWN_FACE_WIDTH_CM: f32 = 14.3;

/// Standing distances at which body measurements are trustworthy.
pub const PERFECT_DISTANCE_CM: Range<i32> = 290..310;

/// Pixels the nose keypoint is shifted down to stand in for the head point.
pub const HEAD_OFFSET_PX: i32 = 20;

/// Minimum keypoint confidence for torso landmarks.
pub const MIN_LANDMARK_CONFIDENCE: f32 = 0.5;

/// How the waist width is spanned between the two hip keypoints.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WaistSpan {
    /// Only the horizontal offset `|x_right - x_left|`.
    Horizontal,
    /// Straight-line pixel distance.
    Euclidean,
}

/// Named sets of calibration factors.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum CalibrationProfile {
    /// Factors used by the web measurement flow.
    #[default]
    Web,
    /// Generic anthropometric factors: circumference is 2.5 times the width.
    Anthropometric,
}

/// Scalar factors converting pixel distances into centimeters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationFactors {
    /// Head-to-ankle pixel distance to body height.
    pub height: f32,
    /// Shoulder and hip pixel distances to widths.
    pub width: f32,
    /// Shoulder width to chest circumference.
    pub chest: f32,
    /// Waist width to waist circumference.
    pub waist: f32,
    pub waist_span: WaistSpan,
    /// Decimal places kept for widths and circumferences. Height is always
    /// whole centimeters.
    pub decimals: u32,
}

impl CalibrationFactors {
    pub const WEB: Self = Self {
        height: 0.48,
        width: 0.48,
        chest: 1.2,
        waist: 1.7,
        waist_span: WaistSpan::Horizontal,
        decimals: 1,
    };

    pub const ANTHROPOMETRIC: Self = Self {
        height: 0.5,
        width: 0.264,
        chest: 2.5,
        waist: 2.5,
        waist_span: WaistSpan::Euclidean,
        decimals: 0,
    };

    /// Body height in whole centimeters.
    pub fn height_cm(&self, pixel_distance: f32) -> f32 {
        round_to(pixel_distance * self.height, 0)
    }

    /// Shoulder or waist width in centimeters.
    pub fn width_cm(&self, pixel_distance: f32) -> f32 {
        round_to(pixel_distance * self.width, self.decimals)
    }

    pub fn chest_circumference_cm(&self, shoulder_width_cm: f32) -> f32 {
        round_to(shoulder_width_cm * self.chest, self.decimals)
    }

    pub fn waist_circumference_cm(&self, waist_width_cm: f32) -> f32 {
        round_to(waist_width_cm * self.waist, self.decimals)
    }
}

impl Default for CalibrationFactors {
    fn default() -> Self {
        Self::WEB
    }
}

impl From<CalibrationProfile> for CalibrationFactors {
    fn from(profile: CalibrationProfile) -> Self {
        match profile {
            CalibrationProfile::Web => Self::WEB,
            CalibrationProfile::Anthropometric => Self::ANTHROPOMETRIC,
        }
    }
}

/// Round half-to-even to the given number of decimal places.
pub fn round_to(value: f32, decimals: u32) -> f32 {
    let scale = 10_f32.powi(decimals as i32);
    (value * scale).round_ties_even() / scale
}

/// Estimate the focal length in pixels from a reference photo.
pub fn focal_length(measured_distance: f32, real_width: f32, width_in_reference_px: f32) -> f32 {
    (width_in_reference_px * measured_distance) / real_width
}

/// Monocular distance estimate from the apparent width of an object.
///
/// Returns `None` if the object has no pixel width.
pub fn estimate_distance(focal_length: f32, real_width: f32, width_in_frame_px: f32) -> Option<f32> {
    if width_in_frame_px <= 0.0 {
        return None;
    }
    Some((real_width * focal_length) / width_in_frame_px)
}

/// Hint shown to the person in front of the camera.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DistanceGuidance {
    Perfect,
    TooClose,
    TooFar,
}

impl DistanceGuidance {
    pub fn for_distance(distance_cm: i32) -> Self {
        if PERFECT_DISTANCE_CM.contains(&distance_cm) {
            Self::Perfect
        } else if distance_cm < PERFECT_DISTANCE_CM.start {
            Self::TooClose
        } else {
            Self::TooFar
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Perfect => "Perfect distance for measurement!",
            Self::TooClose => "Too close - move back!",
            Self::TooFar => "Too far - move closer!",
        }
    }

    pub fn is_perfect(&self) -> bool {
        matches!(self, Self::Perfect)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn height_is_whole_centimeters() {
        let factors = CalibrationFactors::WEB;
        assert_eq!(factors.height_cm(350.0), 168.0);
        assert_eq!(factors.height_cm(351.0), 168.0);
        assert_eq!(factors.height_cm(352.3), 169.0);

        let factors = CalibrationFactors::ANTHROPOMETRIC;
        assert_eq!(factors.height_cm(356.0), 178.0);
    }

    #[test]
    fn rounding_is_half_to_even() {
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(3.5, 0), 4.0);
        assert_eq!(round_to(-0.5, 0), 0.0);
        assert_eq!(round_to(12.34, 1), 12.3);
    }

    #[test]
    fn circumferences_build_on_rounded_widths() {
        let factors = CalibrationFactors::WEB;
        let shoulder = factors.width_cm(100.0);
        assert_eq!(shoulder, 48.0);
        assert_eq!(factors.chest_circumference_cm(shoulder), 57.6);

        let waist = factors.width_cm(70.0);
        assert_eq!(waist, 33.6);
        assert_eq!(factors.waist_circumference_cm(waist), 57.1);
    }

    #[test]
    fn anthropometric_profile_uses_whole_centimeters() {
        let factors = CalibrationFactors::from(CalibrationProfile::Anthropometric);
        let shoulder = factors.width_cm(180.0);
        assert_eq!(shoulder, 48.0);
        assert_eq!(factors.chest_circumference_cm(shoulder), 120.0);
    }

    #[test]
    fn focal_length_and_distance_are_inverse() {
        let focal = focal_length(KNOWN_DISTANCE_CM, KNOWN_FACE_WIDTH_CM, 143.0);
        assert!((focal - 2300.0).abs() < 1e-3);

        let distance = estimate_distance(focal, KNOWN_FACE_WIDTH_CM, 143.0).unwrap();
        assert!((distance - KNOWN_DISTANCE_CM).abs() < 1e-3);

        let distance = estimate_distance(focal, KNOWN_FACE_WIDTH_CM, 110.0).unwrap();
        assert!((distance - 299.0).abs() < 1e-3);
    }

    #[test]
    fn no_distance_without_a_face() {
        assert_eq!(estimate_distance(2300.0, KNOWN_FACE_WIDTH_CM, 0.0), None);
    }

    #[test]
    fn guidance_bands() {
        assert_eq!(DistanceGuidance::for_distance(289), DistanceGuidance::TooClose);
        assert_eq!(DistanceGuidance::for_distance(290), DistanceGuidance::Perfect);
        assert_eq!(DistanceGuidance::for_distance(309), DistanceGuidance::Perfect);
        assert_eq!(DistanceGuidance::for_distance(310), DistanceGuidance::TooFar);
    }
}
