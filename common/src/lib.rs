//! Common code shared between `measure_server` and `cam_sender`.
pub mod protocol;

/// Error type.
pub type Error = Box<dyn std::error::Error>;

/// Default address of the data socket frames are pushed to.
pub const DEFAULT_SOCKET_ADDRESS: &str = "127.0.0.1:3001";

/// Default name under which a camera publishes its frames.
pub const DEFAULT_CAMERA_NAME: &str = "camera";
