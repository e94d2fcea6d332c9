//! Shared application state and the HTTP router.
use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
    routing::{delete, get, post},
    Extension, Router,
};

use crate::{
    calibration::{CalibrationFactors, KNOWN_FACE_WIDTH_CM},
    endpoints,
    mailer::ReportMailer,
    nn::{FaceDetector, PoseEstimator},
    overlay::Overlay,
    pubsub::FrameHub,
    session::Session,
    speech::Announcer,
    store::MeasurementStore,
};

/// Tunables of the measurement flow.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Camera whose frames the video feeds show.
    pub camera: String,
    pub countdown: Duration,
    pub factors: CalibrationFactors,
    pub known_face_width_cm: f32,
    pub downloads_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            camera: common::DEFAULT_CAMERA_NAME.into(),
            countdown: Duration::from_secs(8),
            factors: CalibrationFactors::default(),
            known_face_width_cm: KNOWN_FACE_WIDTH_CM,
            downloads_dir: PathBuf::from("static/downloads"),
        }
    }
}

pub struct AppState {
    pub store: Arc<dyn MeasurementStore>,
    pub mailer: Arc<dyn ReportMailer>,
    pub hub: Arc<FrameHub>,
    pub session: Session,
    pub faces: Arc<dyn FaceDetector>,
    /// `None` if the pose model could not be loaded.
    pub poses: Option<Arc<dyn PoseEstimator>>,
    /// Estimated from the reference image, `None` if that failed.
    pub focal_length: Option<f32>,
    pub overlay: Arc<Overlay>,
    pub announcer: Announcer,
    pub settings: Settings,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(endpoints::index))
        .route("/healthcheck", get(endpoints::healthcheck))
        .route("/face_detection", get(endpoints::face_detection))
        .route("/body_detection", get(endpoints::body_detection))
        .route("/measurements", get(endpoints::measurements))
        .route("/api/measurements", get(endpoints::api_measurements))
        .route("/api/measurements/:id", delete(endpoints::api_delete_measurement))
        .route("/api/measurements.csv", get(endpoints::api_measurements_csv))
        .route("/api/latest-measurement", get(endpoints::api_latest_measurement))
        .route("/api/statistics", get(endpoints::api_statistics))
        .route("/video_feed_face", get(endpoints::video_feed_face))
        .route("/video_feed_body", get(endpoints::video_feed_body))
        .route("/switch_to_body", get(endpoints::switch_to_body))
        .route("/switch_to_face", get(endpoints::switch_to_face))
        .route("/email_form", get(endpoints::email_form))
        .route("/send_measurements", post(endpoints::send_measurements))
        .route("/static/downloads/:file", get(endpoints::download))
        .layer(Extension(state))
}
