mod support;

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use bytes::Bytes;
use futures::StreamExt;
use measure_server::{
    app::AppState,
    pubsub::CameraFrame,
    session::SessionMode,
    streams::{body_measurement_stream, face_distance_stream},
};
use support::{app_state, jpeg, FakeMailer};
use tokio::{task::JoinHandle, time::timeout};

const PART_HEADER: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";

/// Keep publishing frames until the stream has subscribed and consumed some.
async fn publish_frames(state: &Arc<AppState>) -> JoinHandle<()> {
    let tx = state.hub.get_broadcast_sender(&state.settings.camera).await;
    let data = Bytes::from(jpeg(400, 400));
    tokio::spawn(async move {
        for seq in 0..200 {
            let _ = tx.send(CameraFrame {
                seq,
                jpeg: data.clone(),
            });
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
}

fn state(countdown: Duration) -> Arc<AppState> {
    app_state(
        Arc::new(FakeMailer::default()),
        std::env::temp_dir(),
        countdown,
    )
}

#[tokio::test]
async fn body_stream_captures_once() -> Result<()> {
    let state = state(Duration::ZERO);
    let stream = body_measurement_stream(Arc::clone(&state));
    futures::pin_mut!(stream);
    let publisher = publish_frames(&state).await;

    let first = timeout(Duration::from_secs(10), stream.next())
        .await?
        .expect("frame")?;
    assert!(first.starts_with(PART_HEADER));
    assert!(first.ends_with(b"\r\n\r\n"));

    let rows = state.store.all().await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].shoulder_width, 96.0);
    assert_eq!(rows[0].height, 134.0);

    timeout(Duration::from_secs(10), stream.next())
        .await?
        .expect("frame")?;
    assert_eq!(state.store.all().await?.len(), 1);

    publisher.abort();
    Ok(())
}

#[tokio::test]
async fn face_stream_ends_with_face_mode() -> Result<()> {
    let state = state(Duration::from_secs(8));
    state.session.set_mode(SessionMode::FaceDistance);
    let stream = face_distance_stream(Arc::clone(&state));
    futures::pin_mut!(stream);
    let publisher = publish_frames(&state).await;

    let first = timeout(Duration::from_secs(10), stream.next())
        .await?
        .expect("frame")?;
    assert!(first.starts_with(PART_HEADER));

    state.session.set_mode(SessionMode::BodyMeasurement);
    assert!(timeout(Duration::from_secs(10), stream.next()).await?.is_none());

    publisher.abort();
    Ok(())
}

#[tokio::test]
async fn body_stream_is_empty_without_pose_model() -> Result<()> {
    let mut state = state(Duration::ZERO);
    Arc::get_mut(&mut state).expect("unique").poses = None;

    let stream = body_measurement_stream(Arc::clone(&state));
    futures::pin_mut!(stream);
    assert!(timeout(Duration::from_secs(1), stream.next()).await?.is_none());
    assert!(state.store.all().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn face_stream_is_empty_without_focal_length() -> Result<()> {
    let mut state = state(Duration::from_secs(8));
    Arc::get_mut(&mut state).expect("unique").focal_length = None;
    state.session.set_mode(SessionMode::FaceDistance);

    let stream = face_distance_stream(state);
    futures::pin_mut!(stream);
    assert!(timeout(Duration::from_secs(1), stream.next()).await?.is_none());
    Ok(())
}
