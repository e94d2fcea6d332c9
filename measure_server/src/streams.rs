//! Annotated MJPEG streams of the camera frames.
//!
//! Frames are taken from the hub, analyzed on the blocking thread pool and
//! re-encoded as items of a `multipart/x-mixed-replace` response.
use std::{
    io::Cursor,
    sync::{Arc, Mutex},
    time::Instant,
};

use anyhow::{bail, Result};
use async_stream::stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, ColorType, ImageFormat, RgbImage};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use crate::{
    app::AppState,
    calibration::{
        estimate_distance, focal_length, CalibrationFactors, DistanceGuidance, KNOWN_DISTANCE_CM,
        KNOWN_FACE_WIDTH_CM,
    },
    measure::{body_measurements, height_points, pixel_distance},
    meter::METER,
    nn::{Bbox, FaceDetector, PoseEstimator},
    overlay::Overlay,
    pubsub::CameraFrame,
    session::{CaptureSession, CaptureStep, SessionMode},
    store::NewMeasurement,
    utils::as_jpeg_stream_item,
};

/// Size of the frames of the body measurement stream.
pub const BODY_FRAME_SIZE: (u32, u32) = (700, 500);

const JPEG_QUALITY: u8 = 80;

pub type StreamItem = Result<Bytes, std::io::Error>;

/// An annotated face distance frame.
#[derive(Debug)]
pub struct FaceFrame {
    pub jpeg: Vec<u8>,
    /// Rounded distance to the most confident face.
    pub distance_cm: Option<i32>,
}

/// An annotated body measurement frame.
///
/// `step` is valid even when encoding failed.
#[derive(Debug)]
pub struct BodyFrame {
    pub jpeg: Result<Vec<u8>>,
    pub step: CaptureStep,
}

pub fn decode_jpeg(data: &[u8]) -> Result<RgbImage> {
    Ok(image::load_from_memory_with_format(data, ImageFormat::Jpeg)?.to_rgb8())
}

pub fn encode_jpeg(frame: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY).encode(
        frame,
        frame.width(),
        frame.height(),
        ColorType::Rgb8,
    )?;
    Ok(buf.into_inner())
}

/// Whole pixels a face box spans horizontally.
fn face_width_px(bbox: &Bbox, frame_width: u32) -> f32 {
    ((bbox[2] - bbox[0]) * frame_width as f32).trunc()
}

/// Focal length from a photo of a face at the known calibration distance.
pub fn calibrate_focal_length(faces: &dyn FaceDetector, reference: &RgbImage) -> Result<f32> {
    let detections = faces.detect_faces(reference)?;
    let Some((bbox, _)) = detections.first() else {
        bail!("no face found in the reference image");
    };
    let width_px = face_width_px(bbox, reference.width());
    if width_px <= 0.0 {
        bail!("face in the reference image has no width");
    }
    Ok(focal_length(KNOWN_DISTANCE_CM, KNOWN_FACE_WIDTH_CM, width_px))
}

/// Mark faces and show the distance to the most confident one.
pub fn render_face_frame(
    faces: &dyn FaceDetector,
    overlay: &Overlay,
    focal_length: f32,
    known_face_width_cm: f32,
    jpeg: &[u8],
) -> Result<FaceFrame> {
    let mut frame = decode_jpeg(jpeg)?;
    let detections = faces.detect_faces(&frame)?;

    for (bbox, _) in detections.iter() {
        overlay.face_box(&mut frame, bbox);
    }

    let distance_cm = detections.first().and_then(|(bbox, _)| {
        estimate_distance(focal_length, known_face_width_cm, face_width_px(bbox, frame.width()))
    });
    let distance_cm = distance_cm.map(|cm| cm.round_ties_even() as i32);
    if let Some(cm) = distance_cm {
        overlay.distance(&mut frame, cm, DistanceGuidance::for_distance(cm));
    }

    Ok(FaceFrame {
        jpeg: encode_jpeg(&frame)?,
        distance_cm,
    })
}

/// Measure the person in the frame and advance the capture countdown.
pub fn annotate_body_frame(
    poses: &dyn PoseEstimator,
    overlay: &Overlay,
    factors: &CalibrationFactors,
    capture: &mut CaptureSession,
    now: Instant,
    jpeg: &[u8],
) -> Result<(RgbImage, CaptureStep)> {
    let mut frame = decode_jpeg(jpeg)?;
    let (width, height) = frame.dimensions();

    let step = match poses.estimate_pose(&frame)? {
        Some(pose) => {
            overlay.pose(&mut frame, &pose);

            if let Some(body) = body_measurements(&pose, width, height, factors) {
                capture.update_body(body);
                overlay.body(&mut frame, &body);
            }

            if let Some((head, foot)) = height_points(&pose, width, height) {
                let height_cm = factors.height_cm(pixel_distance(head, foot));
                capture.update_height(height_cm);
                overlay.height(&mut frame, head, foot, height_cm);
            }

            let step = capture.observe(now, true);
            if let CaptureStep::Counting(remaining) = step {
                overlay.countdown(&mut frame, remaining);
            }
            if capture.is_captured() {
                overlay.saved(&mut frame);
            }
            step
        }
        None => capture.observe(now, false),
    };

    Ok((frame, step))
}

/// Resize an annotated body frame, draw the frame rate and encode it.
pub fn finish_body_frame(overlay: &Overlay, frame: &RgbImage, fps: Option<f32>) -> Result<Vec<u8>> {
    let (out_width, out_height) = BODY_FRAME_SIZE;
    let mut frame = image::imageops::resize(frame, out_width, out_height, FilterType::Triangle);
    if let Some(fps) = fps {
        overlay.fps(&mut frame, fps);
    }
    encode_jpeg(&frame)
}

/// Annotate and encode a body frame.
pub fn render_body_frame(
    poses: &dyn PoseEstimator,
    overlay: &Overlay,
    factors: &CalibrationFactors,
    capture: &mut CaptureSession,
    now: Instant,
    fps: Option<f32>,
    jpeg: &[u8],
) -> Result<BodyFrame> {
    let (frame, step) = annotate_body_frame(poses, overlay, factors, capture, now, jpeg)?;
    Ok(BodyFrame {
        jpeg: finish_body_frame(overlay, &frame, fps),
        step,
    })
}

/// Wait for the next frame, skipping over frames a slow consumer missed.
async fn next_frame(frames: &mut BroadcastStream<CameraFrame>) -> Option<CameraFrame> {
    while let Some(item) = frames.next().await {
        match item {
            Ok(frame) => return Some(frame),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                log::debug!("Stream lagged, skipped {skipped} frames")
            }
        }
    }
    None
}

/// Face distance stream, ends as soon as the session leaves face distance mode.
pub fn face_distance_stream(state: Arc<AppState>) -> impl Stream<Item = StreamItem> {
    stream! {
        let Some(focal_length) = state.focal_length else {
            log::error!("No focal length available, face distance stream is empty");
            return;
        };

        let rx = state.hub.get_broadcast_receiver(&state.settings.camera).await;
        let mut frames = BroadcastStream::new(rx);
        log::info!("Face distance stream of camera {} started", &state.settings.camera);

        while let Some(frame) = next_frame(&mut frames).await {
            if state.session.mode() != SessionMode::FaceDistance {
                log::info!("Leaving face distance mode, closing stream");
                break;
            }

            let seq = frame.seq;
            let faces = Arc::clone(&state.faces);
            let overlay = Arc::clone(&state.overlay);
            let known_width = state.settings.known_face_width_cm;
            let rendered = tokio::task::spawn_blocking(move || {
                render_face_frame(faces.as_ref(), &overlay, focal_length, known_width, &frame.jpeg)
            })
            .await;

            match rendered {
                Ok(Ok(face_frame)) => {
                    METER.tick_face();
                    yield Ok::<_, std::io::Error>(as_jpeg_stream_item(&face_frame.jpeg));
                }
                Ok(Err(e)) => log::warn!("Skipping frame {seq}: {e:#}"),
                Err(e) => {
                    log::error!("Face frame task failed: {e}");
                    break;
                }
            }
        }
    }
}

/// Body measurement stream with its own capture countdown.
pub fn body_measurement_stream(state: Arc<AppState>) -> impl Stream<Item = StreamItem> {
    stream! {
        let Some(poses) = state.poses.clone() else {
            log::error!("No pose model available, body measurement stream is empty");
            return;
        };

        let rx = state.hub.get_broadcast_receiver(&state.settings.camera).await;
        let mut frames = BroadcastStream::new(rx);
        let capture = Arc::new(Mutex::new(CaptureSession::new(state.settings.countdown)));
        let mut previous: Option<Instant> = None;
        log::info!("Body measurement stream of camera {} started", &state.settings.camera);

        while let Some(frame) = next_frame(&mut frames).await {
            let now = Instant::now();
            let fps = previous.map(|t| 1.0 / now.duration_since(t).as_secs_f32().max(f32::EPSILON));
            previous = Some(now);

            let seq = frame.seq;
            let poses = Arc::clone(&poses);
            let overlay = Arc::clone(&state.overlay);
            let capture = Arc::clone(&capture);
            let factors = state.settings.factors;
            let rendered = tokio::task::spawn_blocking(move || {
                let mut capture = capture.lock().unwrap_or_else(|e| e.into_inner());
                render_body_frame(poses.as_ref(), &overlay, &factors, &mut capture, now, fps, &frame.jpeg)
            })
            .await;

            match rendered {
                Ok(Ok(BodyFrame { jpeg, step })) => {
                    if let CaptureStep::Capture(record) = step {
                        save_capture(&state, record).await;
                    }
                    match jpeg {
                        Ok(jpeg) => {
                            METER.tick_body();
                            yield Ok::<_, std::io::Error>(as_jpeg_stream_item(&jpeg));
                        }
                        Err(e) => log::warn!("Skipping frame {seq}: {e:#}"),
                    }
                }
                Ok(Err(e)) => log::warn!("Skipping frame {seq}: {e:#}"),
                Err(e) => {
                    log::error!("Body frame task failed: {e}");
                    break;
                }
            }
        }
    }
}

async fn save_capture(state: &AppState, record: NewMeasurement) {
    match state.store.insert(record).await {
        Ok(Some(row)) => log::info!("Captured measurement {}: {} cm tall", row.id, row.height),
        Ok(None) => log::warn!("Measurement table returned no row for the capture"),
        Err(e) => log::error!("Failed to save measurement: {e}"),
    }
    state.announcer.announce("Measurement complete");
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;
    use crate::landmarks::{Keypoint, Landmark, Pose};

    struct OneFace;

    impl FaceDetector for OneFace {
        fn detect_faces(&self, _frame: &RgbImage) -> Result<Vec<(Bbox, f32)>> {
            Ok(vec![([0.25, 0.25, 0.5, 0.5], 0.9)])
        }
    }

    struct NoFace;

    impl FaceDetector for NoFace {
        fn detect_faces(&self, _frame: &RgbImage) -> Result<Vec<(Bbox, f32)>> {
            Ok(vec![])
        }
    }

    struct Standing;

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

    struct Nobody;

    impl PoseEstimator for Nobody {
        fn estimate_pose(&self, _frame: &RgbImage) -> Result<Option<Pose>> {
            Ok(None)
        }
    }

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        encode_jpeg(&RgbImage::new(width, height)).expect("encode")
    }

    #[test]
    fn face_distance_from_box_width() -> Result<()> {
        // 640 px wide frame, the box spans 160 px
        let focal_length = 160.0 * 300.0 / 14.3;
        let frame = render_face_frame(
            &OneFace,
            &Overlay::without_text(),
            focal_length,
            14.3,
            &jpeg(640, 480),
        )?;

        assert_eq!(frame.distance_cm, Some(300));
        assert!(decode_jpeg(&frame.jpeg).is_ok());
        Ok(())
    }

    #[test]
    fn focal_length_from_reference() -> Result<()> {
        let reference = RgbImage::new(640, 480);
        let focal = calibrate_focal_length(&OneFace, &reference)?;
        assert!((focal - 160.0 * 230.0 / 14.3).abs() < 1e-2);
        assert!(calibrate_focal_length(&NoFace, &reference).is_err());
        Ok(())
    }

    #[test]
    fn no_face_no_distance() -> Result<()> {
        let frame = render_face_frame(&NoFace, &Overlay::without_text(), 1000.0, 14.3, &jpeg(320, 240))?;
        assert_eq!(frame.distance_cm, None);
        Ok(())
    }

    #[test]
    fn body_frame_is_measured_and_resized() -> Result<()> {
        let mut capture = CaptureSession::new(Duration::from_secs(8));
        let frame = render_body_frame(
            &Standing,
            &Overlay::without_text(),
            &CalibrationFactors::WEB,
            &mut capture,
            Instant::now(),
            Some(25.0),
            &jpeg(400, 400),
        )?;

        assert_eq!(frame.step, CaptureStep::Counting(8));
        assert_eq!(decode_jpeg(&frame.jpeg?)?.dimensions(), BODY_FRAME_SIZE);
        Ok(())
    }

    #[test]
    fn capture_carries_the_measured_values() -> Result<()> {
        let mut capture = CaptureSession::new(Duration::ZERO);
        let frame = render_body_frame(
            &Standing,
            &Overlay::without_text(),
            &CalibrationFactors::WEB,
            &mut capture,
            Instant::now(),
            None,
            &jpeg(400, 400),
        )?;

        match frame.step {
            CaptureStep::Capture(record) => {
                // Shoulders 200 px apart, hips 100 px, head 70 px to ankle 350 px
                assert_eq!(record.shoulder_width, 96.0);
                assert_eq!(record.chest_circumference, 115.2);
                assert_eq!(record.waist_circumference, 81.6);
                assert_eq!(record.height, 134.0);
            }
            other => panic!("expected a capture, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn capture_is_handed_out_before_encoding() -> Result<()> {
        let mut capture = CaptureSession::new(Duration::ZERO);
        let (frame, step) = annotate_body_frame(
            &Standing,
            &Overlay::without_text(),
            &CalibrationFactors::WEB,
            &mut capture,
            Instant::now(),
            &jpeg(400, 400),
        )?;

        assert!(matches!(step, CaptureStep::Capture(_)));
        assert!(capture.is_captured());
        assert_eq!(frame.dimensions(), (400, 400));
        Ok(())
    }

    #[test]
    fn nobody_in_frame_keeps_waiting() -> Result<()> {
        let mut capture = CaptureSession::new(Duration::ZERO);
        let frame = render_body_frame(
            &Nobody,
            &Overlay::without_text(),
            &CalibrationFactors::WEB,
            &mut capture,
            Instant::now(),
            None,
            &jpeg(320, 240),
        )?;

        assert_eq!(frame.step, CaptureStep::Waiting);
        assert!(!capture.is_captured());
        Ok(())
    }
}
