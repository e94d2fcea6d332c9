//! Body keypoints as produced by single-person pose estimators.

/// Index of the 17 COCO keypoints.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(usize)]
pub enum Landmark {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl Landmark {
    pub const COUNT: usize = 17;
}

/// Limbs drawn between keypoints.
pub const SKELETON: [(Landmark, Landmark); 16] = [
    (Landmark::Nose, Landmark::LeftEye),
    (Landmark::Nose, Landmark::RightEye),
    (Landmark::LeftEye, Landmark::LeftEar),
    (Landmark::RightEye, Landmark::RightEar),
    (Landmark::LeftShoulder, Landmark::RightShoulder),
    (Landmark::LeftShoulder, Landmark::LeftElbow),
    (Landmark::LeftElbow, Landmark::LeftWrist),
    (Landmark::RightShoulder, Landmark::RightElbow),
    (Landmark::RightElbow, Landmark::RightWrist),
    (Landmark::LeftShoulder, Landmark::LeftHip),
    (Landmark::RightShoulder, Landmark::RightHip),
    (Landmark::LeftHip, Landmark::RightHip),
    (Landmark::LeftHip, Landmark::LeftKnee),
    (Landmark::LeftKnee, Landmark::LeftAnkle),
    (Landmark::RightHip, Landmark::RightKnee),
    (Landmark::RightKnee, Landmark::RightAnkle),
];

/// A keypoint in normalized image coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Keypoint {
    /// Horizontal position, 0.0 is the left image border.
    pub x: f32,
    /// Vertical position, 0.0 is the top image border.
    pub y: f32,
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    pub fn is_visible(&self, min_confidence: f32) -> bool {
        self.confidence >= min_confidence
    }

    /// Pixel position in an image of the given size, truncated towards zero.
    pub fn to_pixel(&self, width: u32, height: u32) -> (i32, i32) {
        (
            (self.x * width as f32) as i32,
            (self.y * height as f32) as i32,
        )
    }
}

/// The keypoints of one person.
#[derive(Clone, Debug, PartialEq)]
pub struct Pose {
    keypoints: [Keypoint; Landmark::COUNT],
}

impl Pose {
    pub fn new(keypoints: [Keypoint; Landmark::COUNT]) -> Self {
        Self { keypoints }
    }

    pub fn get(&self, landmark: Landmark) -> &Keypoint {
        &self.keypoints[landmark as usize]
    }

    pub fn set(&mut self, landmark: Landmark, keypoint: Keypoint) {
        self.keypoints[landmark as usize] = keypoint;
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Mean confidence over all keypoints.
    pub fn score(&self) -> f32 {
        self.keypoints.iter().map(|kp| kp.confidence).sum::<f32>() / Landmark::COUNT as f32
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::new([Keypoint::default(); Landmark::COUNT])
    }
}
