//! Command line and environment configuration of the measurement server.
use std::{path::PathBuf, time::Duration};

use clap::Parser;
use common::{DEFAULT_CAMERA_NAME, DEFAULT_SOCKET_ADDRESS};

use crate::calibration::{CalibrationFactors, CalibrationProfile};

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about = "Body measurement web app")]
pub struct Args {
    /// Address the web app listens on
    #[clap(long, default_value = "127.0.0.1:5000")]
    pub server_address: String,

    /// Address of the data socket cameras send frames to
    #[clap(long, default_value = DEFAULT_SOCKET_ADDRESS)]
    pub socket_address: String,

    /// Name of the camera whose frames are measured
    #[clap(long, default_value = DEFAULT_CAMERA_NAME)]
    pub camera: String,

    #[clap(flatten)]
    pub table: TableArgs,

    #[clap(flatten)]
    pub smtp: SmtpArgs,

    /// Photo of a face taken at the known calibration distance
    #[clap(long, default_value = "Ref_image.jpg")]
    pub reference_image: PathBuf,

    /// Where PDFs are stored when e-mail delivery fails
    #[clap(long, default_value = "static/downloads")]
    pub downloads_dir: PathBuf,

    /// Directory of the ONNX models, defaults to the user cache directory
    #[clap(long)]
    pub models_dir: Option<PathBuf>,

    /// TrueType font used for frame annotations
    #[clap(long, default_value = "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf")]
    pub font: PathBuf,

    /// Seconds between the first detected person and the capture
    #[clap(long, default_value_t = 8)]
    pub countdown_secs: u64,

    /// Pixel to centimeter conversion factors
    #[clap(long, value_enum, default_value_t = CalibrationProfile::Web)]
    pub calibration: CalibrationProfile,

    /// Text-to-speech command, the announcement is passed as last argument
    #[clap(long, env = "SPEECH_COMMAND")]
    pub speech_command: Option<String>,

    /// Keep measurements in memory instead of the hosted table
    #[clap(long)]
    pub in_memory: bool,
}

impl Args {
    pub fn countdown(&self) -> Duration {
        Duration::from_secs(self.countdown_secs)
    }

    pub fn factors(&self) -> CalibrationFactors {
        self.calibration.into()
    }
}

/// Credentials of the hosted measurement table.
#[derive(clap::Args, Debug, Clone)]
pub struct TableArgs {
    /// Base URL of the hosted table service
    #[clap(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    /// API key of the hosted table service
    #[clap(long, env = "SUPABASE_KEY", hide_env_values = true)]
    pub supabase_key: Option<String>,
}

impl TableArgs {
    /// URL and key, if both are configured and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.supabase_url.as_deref(), self.supabase_key.as_deref()) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => Some((url, key)),
            _ => None,
        }
    }
}

/// Outgoing mail server settings.
#[derive(clap::Args, Debug, Clone)]
pub struct SmtpArgs {
    #[clap(long, env = "EMAIL_SENDER", default_value = "your_email@gmail.com")]
    pub email_sender: String,

    #[clap(
        long,
        env = "EMAIL_PASSWORD",
        default_value = "your_app_password",
        hide_env_values = true,
        hide_default_value = true
    )]
    pub email_password: String,

    #[clap(long, env = "SMTP_SERVER", default_value = "smtp.gmail.com")]
    pub smtp_server: String,

    #[clap(long, env = "SMTP_PORT", default_value_t = 587)]
    pub smtp_port: u16,
}
