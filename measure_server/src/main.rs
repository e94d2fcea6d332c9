//! Measurement server binary.
//!
use std::{net::SocketAddr, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::Parser;
use env_logger::TimestampPrecision;
use measure_server::{
    app::{build_router, AppState, Settings},
    calibration::KNOWN_FACE_WIDTH_CM,
    config::Args,
    data_socket::spawn_data_socket,
    mailer::SmtpMailer,
    meter::spawn_meter_logger,
    nn::{
        default_model_dir, FaceDetector, MoveNetModel, PoseEstimator, UltrafaceModel,
        UltrafaceVariant,
    },
    overlay::Overlay,
    pubsub::FrameHub,
    session::Session,
    speech::Announcer,
    store::{MeasurementStore, MemoryStore, PostgrestStore},
    streams::calibrate_focal_length,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logger
    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let store: Arc<dyn MeasurementStore> = match (args.table.credentials(), args.in_memory) {
        (_, true) => {
            log::warn!("Keeping measurements in memory, they are lost on exit");
            Arc::new(MemoryStore::new())
        }
        (Some((url, key)), false) => {
            log::info!("Storing measurements at {url}");
            Arc::new(PostgrestStore::new(url, key))
        }
        (None, false) => {
            bail!("SUPABASE_URL and SUPABASE_KEY must be set, or pass --in-memory")
        }
    };

    let mailer = SmtpMailer::new(
        &args.smtp.smtp_server,
        args.smtp.smtp_port,
        &args.smtp.email_sender,
        &args.smtp.email_password,
    )
    .context("failed to set up SMTP transport")?;

    // Load models
    let models_dir = args.models_dir.clone().unwrap_or_else(default_model_dir);
    let faces = UltrafaceModel::new(UltrafaceVariant::W640H480, 0.5, 0.5, &models_dir).await?;
    let poses: Option<Arc<dyn PoseEstimator>> = match MoveNetModel::new(0.2, &models_dir).await {
        Ok(poses) => Some(Arc::new(poses)),
        Err(e) => {
            log::error!("Body measurement disabled: {e:#}");
            None
        }
    };

    let focal_length = image::open(&args.reference_image)
        .with_context(|| format!("failed to read {}", args.reference_image.display()))
        .and_then(|reference| calibrate_focal_length(&faces, &reference.to_rgb8()));
    let focal_length = match focal_length {
        Ok(focal_length) => {
            log::info!("Calibrated focal length: {focal_length}");
            Some(focal_length)
        }
        Err(e) => {
            log::error!("Face distance disabled: {e:#}");
            None
        }
    };

    let faces: Arc<dyn FaceDetector> = Arc::new(faces);

    let hub = Arc::new(FrameHub::new());

    // Create socket to receive camera frames via network
    spawn_data_socket(Arc::clone(&hub), &args.socket_address).await?;

    spawn_meter_logger();

    let state = Arc::new(AppState {
        store,
        mailer: Arc::new(mailer),
        hub,
        session: Session::new(),
        faces,
        poses,
        focal_length,
        overlay: Arc::new(Overlay::load_or_shapes_only(&args.font)),
        announcer: Announcer::new(args.speech_command.as_deref()),
        settings: Settings {
            camera: args.camera.clone(),
            countdown: args.countdown(),
            factors: args.factors(),
            known_face_width_cm: KNOWN_FACE_WIDTH_CM,
            downloads_dir: args.downloads_dir.clone(),
        },
    });

    // Serve HTTP server
    let addr: SocketAddr = args.server_address.parse()?;
    log::info!("Serving web app on http://{addr}");
    axum::Server::bind(&addr)
        .serve(build_router(state).into_make_service())
        .await?;

    Ok(())
}
