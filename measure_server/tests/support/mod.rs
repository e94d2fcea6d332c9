//! Fakes shared by the integration tests.
#![allow(dead_code)]

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::Result;
use async_trait::async_trait;
use image::RgbImage;
use measure_server::{
    app::{AppState, Settings},
    landmarks::{Keypoint, Landmark, Pose},
    mailer::{MailError, ReportMailer},
    nn::{Bbox, FaceDetector, PoseEstimator},
    overlay::Overlay,
    pubsub::FrameHub,
    session::Session,
    speech::Announcer,
    store::{Measurement, MemoryStore, NewMeasurement},
    streams::encode_jpeg,
};

/// Detects one face spanning a quarter of the frame width.
pub struct OneFace;

impl FaceDetector for OneFace {
    fn detect_faces(&self, _frame: &RgbImage) -> Result<Vec<(Bbox, f32)>> {
        Ok(vec![([0.25, 0.25, 0.5, 0.5], 0.9)])
    }
}

/// Sees a person standing upright in the middle of the frame.
pub struct Standing;

impl PoseEstimator for Standing {
    fn estimate_pose(&self, _frame: &RgbImage) -> Result<Option<Pose>> {
        let mut pose = Pose::default();
        pose.set(Landmark::Nose, Keypoint::new(0.5, 0.125, 0.9));
        pose.set(Landmark::LeftShoulder, Keypoint::new(0.25, 0.25, 0.9));
        pose.set(Landmark::RightShoulder, Keypoint::new(0.75, 0.25, 0.9));
        pose.set(Landmark::LeftHip, Keypoint::new(0.375, 0.5, 0.9));
        pose.set(Landmark::RightHip, Keypoint::new(0.625, 0.5, 0.9));
        pose.set(Landmark::LeftAnkle, Keypoint::new(0.5, 0.875, 0.9));
        Ok(Some(pose))
    }
}

/// Records sent reports, or fails every delivery.
#[derive(Default)]
pub struct FakeMailer {
    pub fail: bool,
    /// Recipient, name, measurement id and PDF size of each report.
    pub sent: Mutex<Vec<(String, String, i64, usize)>>,
}

impl FakeMailer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ReportMailer for FakeMailer {
    async fn send_report(
        &self,
        to: &str,
        name: &str,
        measurement: &Measurement,
        pdf: Vec<u8>,
    ) -> Result<(), MailError> {
        if self.fail {
            let error = "nobody"
                .parse::<lettre::Address>()
                .expect_err("not an address");
            return Err(MailError::Address(error));
        }
        self.sent.lock().unwrap().push((
            to.to_owned(),
            name.to_owned(),
            measurement.id,
            pdf.len(),
        ));
        Ok(())
    }
}

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    encode_jpeg(&RgbImage::new(width, height)).expect("encode")
}

pub fn record(timestamp: &str, height: f32) -> NewMeasurement {
    NewMeasurement {
        timestamp: Some(timestamp.into()),
        height,
        shoulder_width: 44.5,
        chest_circumference: 53.4,
        waist_circumference: 61.2,
    }
}

pub fn app_state(
    mailer: Arc<dyn ReportMailer>,
    downloads_dir: PathBuf,
    countdown: Duration,
) -> Arc<AppState> {
    Arc::new(AppState {
        store: Arc::new(MemoryStore::new()),
        mailer,
        hub: Arc::new(FrameHub::new()),
        session: Session::new(),
        faces: Arc::new(OneFace),
        poses: Some(Arc::new(Standing)),
        focal_length: Some(160.0 * 300.0 / 14.3),
        overlay: Arc::new(Overlay::without_text()),
        announcer: Announcer::silent(),
        settings: Settings {
            countdown,
            downloads_dir,
            ..Settings::default()
        },
    })
}
