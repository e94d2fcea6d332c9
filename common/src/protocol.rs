//! Protocol definition for the data socket.
//!
//! A camera sender opens a TCP connection, announces the camera name with a
//! [`ProtoMsg::ConnectReq`] and then pushes JPEG frames as
//! [`ProtoMsg::FrameMsg`], each one length-delimited on the wire.
use serde::{Deserialize, Serialize};

/// Definition of protocol messages.
#[derive(Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ProtoMsg {
    ConnectReq(String),
    FrameMsg(FrameMsg),
}

/// A single JPEG-encoded camera frame.
#[derive(Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FrameMsg {
    /// Name of the camera the frame was captured by.
    pub id: String,
    /// Capture counter, increasing by one per frame of a connection.
    pub seq: u64,
    pub data: Vec<u8>,
}

impl FrameMsg {
    pub fn new(id: String, seq: u64, data: Vec<u8>) -> Self {
        Self { id, seq, data }
    }
}

impl ProtoMsg {
    pub fn serialize(&self) -> Result<Vec<u8>, Box<bincode::ErrorKind>> {
        bincode::serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, Box<bincode::ErrorKind>> {
        bincode::deserialize(bytes)
    }
}
