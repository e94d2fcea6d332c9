//! Capture webcam frames and push them to the measurement server.
pub mod sender;
pub mod sensors;

/// Error type.
pub type Error = Box<dyn std::error::Error>;
