//! Sensors module.
//!
use rscam::{Camera, Config, Frame};
use simple_error::simple_error;

use crate::Error;

pub type CaptureFn = Box<dyn Fn() -> Option<Frame> + Send + Sync>;

/// Camera device and capture parameters.
#[derive(Clone, Debug)]
pub struct CameraSettings {
    pub device: String,
    /// FourCC pixel format, `MJPG` yields frames that are already JPEG.
    pub format: String,
    /// Capture resolution, the maximum supported one if unset.
    pub resolution: Option<(u32, u32)>,
    /// Frame interval as (numerator, denominator), the fastest one if unset.
    pub frame_rate: Option<(u32, u32)>,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device: "/dev/video0".into(),
            format: "MJPG".into(),
            resolution: None,
            frame_rate: None,
        }
    }
}

/// Get a capture function to a video device on a Linux machine.
pub fn get_capture_fn_linux(settings: &CameraSettings) -> Result<CaptureFn, Error> {
    let mut cam = Camera::new(&settings.device)?;
    log_supported_formats(&cam, &settings.format);
    let format = settings.format.as_bytes();

    log::info!("Using camera {}", &settings.device);

    let resolution = settings
        .resolution
        .map(Ok)
        .unwrap_or_else(|| get_max_resolution(&cam, format))?;

    let frame_rate = settings
        .frame_rate
        .map(Ok)
        .unwrap_or_else(|| get_max_frame_rate(&cam, format, resolution))?;

    log::info!(
        "Capturing {}x{} at interval {}/{}",
        resolution.0,
        resolution.1,
        frame_rate.0,
        frame_rate.1
    );

    cam.start(&Config {
        interval: frame_rate,
        resolution,
        format,
        ..Default::default()
    })?;

    let callback = move || cam.capture().ok();
    Ok(Box::new(callback))
}

/// Get the maximum supported resolution for the given format.
fn get_max_resolution(cam: &Camera, format: &[u8]) -> Result<(u32, u32), Error> {
    let resolution_info = cam.resolutions(format)?;
    log::debug!("Found resolutions: {:?}", &resolution_info);
    match resolution_info {
        rscam::ResolutionInfo::Discretes(resolutions) => resolutions
            .iter()
            .max_by_key(|res| res.0 * res.1)
            .copied(),
        rscam::ResolutionInfo::Stepwise { max, .. } => Some(max),
    }
    .ok_or_else(|| simple_error!("No resolution found").into())
}

/// Get the maximum supported frame rate for the given format and resolution.
fn get_max_frame_rate(
    cam: &Camera,
    format: &[u8],
    resolution: (u32, u32),
) -> Result<(u32, u32), Error> {
    let interval_info = cam.intervals(format, resolution)?;
    log::debug!("Found frame rates: {:?}", &interval_info);
    match interval_info {
        // Intervals are seconds per frame, the shortest one is the fastest rate
        rscam::IntervalInfo::Discretes(intervals) => intervals
            .iter()
            .filter(|(_, denominator)| *denominator > 0)
            .min_by(|a, b| {
                let a = a.0 as f64 / a.1 as f64;
                let b = b.0 as f64 / b.1 as f64;
                a.total_cmp(&b)
            })
            .copied(),
        rscam::IntervalInfo::Stepwise { min, .. } => Some(min),
    }
    .ok_or_else(|| simple_error!("No frame rate found").into())
}

fn log_supported_formats(cam: &Camera, format: &str) {
    let formats: Vec<_> = cam.formats().filter_map(|fmt| fmt.ok()).collect();
    log::debug!(
        "Supported formats: {:?}, using format {:?}",
        formats,
        format
    );
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn get_cam_info_if_available() -> Result<(), Error> {
        let settings = CameraSettings::default();
        let cam = Camera::new(&settings.device);

        match cam {
            Err(err) => println!("Could not initialize camera (maybe non available): {err}"),
            Ok(cam) => {
                let format = settings.format.as_bytes();

                let selected_resolution = get_max_resolution(&cam, format)?;
                let selected_rate = get_max_frame_rate(&cam, format, selected_resolution)?;
                println!("Selected {selected_resolution:?} at {selected_rate:?}");
            }
        }

        Ok(())
    }
}
