use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use tokio::{task::JoinHandle, time::interval};

pub static METER: Meter = Meter::new();

/// Frame counters, read and reset by the meter logger.
#[derive(Default)]
pub struct Meter {
    received_frames: AtomicU64,
    face_frames: AtomicU64,
    body_frames: AtomicU64,
}

impl Meter {
    pub const fn new() -> Meter {
        Meter {
            received_frames: AtomicU64::new(0),
            face_frames: AtomicU64::new(0),
            body_frames: AtomicU64::new(0),
        }
    }

    pub fn tick_received(&self) {
        self.received_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tick_face(&self) {
        self.face_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tick_body(&self) {
        self.body_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_reset_received(&self) -> u64 {
        self.received_frames.swap(0, Ordering::Relaxed)
    }

    pub fn get_reset_face(&self) -> u64 {
        self.face_frames.swap(0, Ordering::Relaxed)
    }

    pub fn get_reset_body(&self) -> u64 {
        self.body_frames.swap(0, Ordering::Relaxed)
    }
}

pub fn spawn_meter_logger() -> JoinHandle<()> {
    tokio::spawn(async {
        let mut log_interval = interval(Duration::from_secs(2));
        log_interval.tick().await;

        loop {
            let start = Instant::now();
            log_interval.tick().await;

            let elapsed = start.elapsed().as_secs_f32();
            let counts = [
                ("Received", METER.get_reset_received()),
                ("Face distance", METER.get_reset_face()),
                ("Body measurement", METER.get_reset_body()),
            ];

            for (name, frames) in counts {
                if frames > 0 {
                    log::info!("{name} frames per second: {:.2}", frames as f32 / elapsed);
                }
            }
        }
    })
}
