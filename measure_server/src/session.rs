//! Per-process and per-stream measurement state.
use std::{
    collections::HashMap,
    convert::Infallible,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderValue},
    response::{IntoResponseParts, ResponseParts},
};
use serde::Serialize;

use crate::{measure::BodyMeasurements, store::NewMeasurement};

/// Which measurement page the user is on.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    #[default]
    Idle,
    FaceDistance,
    BodyMeasurement,
}

/// The shared, user-facing session. Flash messages are kept per client.
#[derive(Debug, Default)]
pub struct Session {
    mode: Mutex<SessionMode>,
    flashes: Mutex<HashMap<String, Vec<Flash>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> SessionMode {
        *self.mode.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_mode(&self, mode: SessionMode) {
        let mut current = self.mode.lock().unwrap_or_else(|e| e.into_inner());
        if *current != mode {
            log::info!("Session mode {:?} -> {:?}", *current, mode);
        }
        *current = mode;
    }

    pub fn flash(&self, client: &Client, flash: Flash) {
        log::debug!("Flash {:?} for {}: {}", flash.category, client.id, flash.message);
        self.flashes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(client.id.clone())
            .or_default()
            .push(flash);
    }

    /// Take all flash messages pending for `client`.
    pub fn take_flashes(&self, client: &Client) -> Vec<Flash> {
        self.flashes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&client.id)
            .unwrap_or_default()
    }
}

/// Name of the cookie identifying a browser.
pub const CLIENT_COOKIE: &str = "measure_client";

static CLIENT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A browser, identified by the [`CLIENT_COOKIE`] cookie.
///
/// Requests without the cookie get a new id, which the response hands out.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Client {
    id: String,
    fresh: bool,
}

impl Client {
    pub fn new() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let count = CLIENT_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("{nanos:x}-{count:x}"),
            fresh: true,
        }
    }

    /// A client known by `id`.
    pub fn existing(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fresh: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Client id carried in a `Cookie` header value.
    fn from_cookie_header(value: &str) -> Option<Self> {
        value
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, id)| {
                *name == CLIENT_COOKIE
                    && !id.is_empty()
                    && id.chars().all(|c| c.is_ascii_hexdigit() || c == '-')
            })
            .map(|(_, id)| Self::existing(id))
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Client {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let known = parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(Client::from_cookie_header);
        Ok(known.unwrap_or_default())
    }
}

impl IntoResponseParts for Client {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if self.fresh {
            let cookie = format!("{CLIENT_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax", self.id);
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                res.headers_mut().insert(header::SET_COOKIE, value);
            }
        }
        Ok(res)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlashCategory {
    Success,
    Error,
    Warning,
}

impl FlashCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }
}

/// One-shot message shown on the next rendered page.
#[derive(Clone, Debug, PartialEq)]
pub struct Flash {
    pub category: FlashCategory,
    pub message: String,
    /// Target and label of an optional link appended to the message.
    pub link: Option<(String, String)>,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(FlashCategory::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(FlashCategory::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(FlashCategory::Warning, message)
    }

    pub fn with_link(mut self, href: impl Into<String>, label: impl Into<String>) -> Self {
        self.link = Some((href.into(), label.into()));
        self
    }

    fn new(category: FlashCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            link: None,
        }
    }
}

/// Where a capture countdown stands after observing a frame.
#[derive(Clone, Debug, PartialEq)]
pub enum CaptureStep {
    /// No person seen yet, the countdown has not started.
    Waiting,
    /// Whole seconds left until the values are captured.
    Counting(u64),
    /// The countdown just ran out. Carries the record to persist.
    Capture(NewMeasurement),
    /// The values were captured on an earlier frame.
    Done,
}

/// Countdown and running values of one body-measurement stream.
///
/// The countdown starts with the first frame showing a person. Once it runs
/// out, the latest values are handed out exactly once.
#[derive(Debug)]
pub struct CaptureSession {
    duration: Duration,
    started: Option<Instant>,
    captured: bool,
    height: f32,
    body: BodyMeasurements,
}

impl CaptureSession {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            started: None,
            captured: false,
            height: 0.0,
            body: BodyMeasurements::default(),
        }
    }

    pub fn update_height(&mut self, height: f32) {
        self.height = height;
    }

    pub fn update_body(&mut self, body: BodyMeasurements) {
        self.body = body;
    }

    pub fn is_captured(&self) -> bool {
        self.captured
    }

    /// Advance the countdown for a frame taken at `now`.
    ///
    /// Frames without a person neither start nor advance the countdown.
    pub fn observe(&mut self, now: Instant, person_visible: bool) -> CaptureStep {
        if self.captured {
            return CaptureStep::Done;
        }
        if !person_visible {
            return match self.started {
                None => CaptureStep::Waiting,
                Some(started) => CaptureStep::Counting(self.remaining(started, now)),
            };
        }

        let started = *self.started.get_or_insert(now);
        match self.remaining(started, now) {
            0 => {
                self.captured = true;
                CaptureStep::Capture(NewMeasurement::now(self.height, &self.body))
            }
            remaining => CaptureStep::Counting(remaining),
        }
    }

    fn remaining(&self, started: Instant, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(started).as_secs();
        self.duration.as_secs().saturating_sub(elapsed)
    }
}
