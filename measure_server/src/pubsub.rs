//! Named broadcast channels connecting camera connections to video streams.
use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::{broadcast, Mutex};

/// Frames kept per camera for subscribers that fall behind.
const CHANNEL_CAPACITY: usize = 20;

/// A JPEG frame as received from a camera.
#[derive(Clone, Debug)]
pub struct CameraFrame {
    pub seq: u64,
    pub jpeg: Bytes,
}

pub type FrameSender = broadcast::Sender<CameraFrame>;
pub type FrameReceiver = broadcast::Receiver<CameraFrame>;

/// Broadcast hub with one channel per camera name.
///
/// Publishers and subscribers may show up in any order, whoever comes first
/// creates the channel.
#[derive(Default)]
pub struct FrameHub {
    map: Mutex<HashMap<String, FrameSender>>,
}

impl FrameHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_broadcast_sender(&self, name: &str) -> FrameSender {
        let mut map = self.map.lock().await;
        map.entry(name.to_owned())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    pub async fn get_broadcast_receiver(&self, name: &str) -> FrameReceiver {
        let mut map = self.map.lock().await;
        match map.get(name) {
            Some(tx) => tx.subscribe(),
            None => {
                let (tx, rx) = broadcast::channel(CHANNEL_CAPACITY);
                map.insert(name.to_owned(), tx);
                rx
            }
        }
    }

    /// Number of streams currently watching a camera.
    pub async fn subscriber_count(&self, name: &str) -> usize {
        let map = self.map.lock().await;
        map.get(name).map_or(0, |tx| tx.receiver_count())
    }
}
