//! Endpoints of HTTP server.
//!
use std::{path::Path as FsPath, sync::Arc};

use anyhow::Result;
use axum::{
    body::StreamBody,
    extract::{Form, Path},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Extension, Json,
};
use chrono::Local;
use serde::Deserialize;

use crate::{
    app::AppState,
    pages,
    report::{self, Statistics},
    session::{Client, Flash, SessionMode},
    store::Measurement,
    streams::{body_measurement_stream, face_distance_stream},
};

pub const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Route under which PDFs are offered when e-mail delivery fails.
pub const DOWNLOADS_ROUTE: &str = "/static/downloads";

/// Health check endpoint.
pub async fn healthcheck() -> &'static str {
    "healthy"
}

pub async fn index(
    Extension(state): Extension<Arc<AppState>>,
    client: Client,
) -> (Client, Html<String>) {
    let page = pages::index(&state.session.take_flashes(&client));
    (client, page)
}

pub async fn face_detection(
    Extension(state): Extension<Arc<AppState>>,
    client: Client,
) -> (Client, Html<String>) {
    state.session.set_mode(SessionMode::FaceDistance);
    let page = pages::face_detection(&state.session.take_flashes(&client));
    (client, page)
}

pub async fn body_detection(
    Extension(state): Extension<Arc<AppState>>,
    client: Client,
) -> (Client, Html<String>) {
    state.session.set_mode(SessionMode::BodyMeasurement);
    state.announcer.announce("Starting body measurement");
    let last = latest_or_none(&state).await;
    let page = pages::body_detection(&state.session.take_flashes(&client), last.as_ref());
    (client, page)
}

pub async fn measurements(
    Extension(state): Extension<Arc<AppState>>,
    client: Client,
) -> (Client, Html<String>) {
    let all = all_or_empty(&state).await;
    let latest = latest_or_none(&state).await;
    let page = pages::measurements(&state.session.take_flashes(&client), &all, latest.as_ref());
    (client, page)
}

pub async fn api_measurements(Extension(state): Extension<Arc<AppState>>) -> Json<Vec<Measurement>> {
    Json(all_or_empty(&state).await)
}

/// The newest record, `{}` if there is none.
pub async fn api_latest_measurement(Extension(state): Extension<Arc<AppState>>) -> Response {
    match latest_or_none(&state).await {
        Some(measurement) => Json(measurement).into_response(),
        None => Json(serde_json::json!({})).into_response(),
    }
}

pub async fn api_delete_measurement(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, String)> {
    match state.store.delete(id).await {
        Ok(true) => {
            log::info!("Deleted measurement {id}");
            Ok(StatusCode::NO_CONTENT)
        }
        Ok(false) => Err((StatusCode::NOT_FOUND, format!("no measurement with id {id}"))),
        Err(e) => {
            log::error!("Failed to delete measurement {id}: {e}");
            Err((StatusCode::BAD_GATEWAY, e.to_string()))
        }
    }
}

pub async fn api_measurements_csv(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let all = all_or_empty(&state).await;
    let csv = report::to_csv(&all).map_err(|e| {
        log::error!("CSV export failed: {e:#}");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
        (
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"measurement_history.csv\"",
        ),
    ];
    Ok((headers, csv))
}

pub async fn api_statistics(Extension(state): Extension<Arc<AppState>>) -> Json<Statistics> {
    Json(Statistics::of(&all_or_empty(&state).await))
}

pub async fn video_feed_face(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    log::info!("Face distance feed requested");

    // Set body and headers for multipart streaming
    let body = StreamBody::new(face_distance_stream(state));
    let headers = [(header::CONTENT_TYPE, MJPEG_CONTENT_TYPE)];

    (headers, body)
}

pub async fn video_feed_body(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    log::info!("Body measurement feed requested");

    let body = StreamBody::new(body_measurement_stream(state));
    let headers = [(header::CONTENT_TYPE, MJPEG_CONTENT_TYPE)];

    (headers, body)
}

pub async fn switch_to_body(Extension(state): Extension<Arc<AppState>>) -> Redirect {
    state.session.set_mode(SessionMode::BodyMeasurement);
    Redirect::to("/body_detection")
}

pub async fn switch_to_face() -> Redirect {
    Redirect::to("/face_detection")
}

pub async fn email_form(Extension(state): Extension<Arc<AppState>>, client: Client) -> Response {
    match latest_or_none(&state).await {
        Some(latest) => {
            let page = pages::email_form(&state.session.take_flashes(&client), &latest);
            (client, page).into_response()
        }
        None => {
            state.session.flash(&client, Flash::error("No measurements available"));
            (client, Redirect::to("/measurements")).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EmailParams {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// E-mail the latest measurement as PDF, offering a download if sending fails.
pub async fn send_measurements(
    Extension(state): Extension<Arc<AppState>>,
    client: Client,
    Form(params): Form<EmailParams>,
) -> (Client, Redirect) {
    let flash = deliver_report(&state, params).await;
    state.session.flash(&client, flash);
    (client, Redirect::to("/email_form"))
}

/// Send the report and describe the outcome.
async fn deliver_report(state: &AppState, params: EmailParams) -> Flash {
    let Some(email) = params.email.filter(|email| !email.trim().is_empty()) else {
        return Flash::error("Please provide an email address");
    };
    let name = params
        .name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "User".into());

    let Some(measurement) = latest_or_none(state).await else {
        return Flash::error("No measurements available");
    };

    let pdf = match report::measurement_pdf(&measurement) {
        Ok(pdf) => pdf,
        Err(e) => {
            log::error!("PDF generation failed: {e:#}");
            return Flash::error(format!("Error generating PDF: {e}"));
        }
    };

    match state
        .mailer
        .send_report(email.trim(), &name, &measurement, pdf.clone())
        .await
    {
        Ok(()) => Flash::success("Measurement results sent successfully to your email!"),
        Err(e) => {
            log::warn!("E-mail to {email} failed: {e}");
            match save_download(&state.settings.downloads_dir, &pdf).await {
                Ok(file_name) => Flash::warning(format!("Email could not be sent: {e}."))
                    .with_link(
                        format!("{DOWNLOADS_ROUTE}/{file_name}"),
                        "Click here to download your PDF",
                    ),
                Err(save_error) => {
                    log::error!("Saving PDF for download failed: {save_error:#}");
                    Flash::error(format!("Email could not be sent: {e}."))
                }
            }
        }
    }
}

/// Serve a PDF stored for download.
pub async fn download(
    Extension(state): Extension<Arc<AppState>>,
    Path(file): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let valid = file.ends_with(".pdf")
        && !file.starts_with('.')
        && !file.contains(['/', '\\'])
        && !file.contains("..");
    if !valid {
        return Err(StatusCode::NOT_FOUND);
    }

    let data = tokio::fs::read(state.settings.downloads_dir.join(&file))
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_owned()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file}\""),
        ),
    ];
    Ok((headers, data))
}

/// Write `pdf` to the downloads directory and return its file name.
async fn save_download(dir: &FsPath, pdf: &[u8]) -> Result<String> {
    tokio::fs::create_dir_all(dir).await?;
    let file_name = format!("measurements_{}.pdf", Local::now().format("%Y%m%d_%H%M%S"));
    tokio::fs::write(dir.join(&file_name), pdf).await?;
    log::info!("Stored PDF at {}", dir.join(&file_name).display());
    Ok(file_name)
}

async fn all_or_empty(state: &AppState) -> Vec<Measurement> {
    state.store.all().await.unwrap_or_else(|e| {
        log::error!("Failed to fetch measurements: {e}");
        Vec::new()
    })
}

async fn latest_or_none(state: &AppState) -> Option<Measurement> {
    state.store.latest().await.unwrap_or_else(|e| {
        log::error!("Failed to fetch latest measurement: {e}");
        None
    })
}
