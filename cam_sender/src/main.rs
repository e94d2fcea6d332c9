use cam_sender::{
    sender::send_frames,
    sensors::{get_capture_fn_linux, CameraSettings},
    Error,
};
use clap::Parser;
use env_logger::TimestampPrecision;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// Address of the data socket of the measurement server
    #[clap(long, default_value = common::DEFAULT_SOCKET_ADDRESS)]
    address: String,

    /// Camera name that this sender publishes to
    #[clap(long, default_value = common::DEFAULT_CAMERA_NAME)]
    camera: String,

    /// Video device to capture from
    #[clap(long, default_value = "/dev/video0")]
    device: String,

    /// Capture width, needs --height as well
    #[clap(long, requires = "height")]
    width: Option<u32>,

    /// Capture height, needs --width as well
    #[clap(long, requires = "width")]
    height: Option<u32>,

    /// Frames per second, the fastest supported rate if unset
    #[clap(long)]
    fps: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    log::info!("Launching camera sender for camera {}", &args.camera);

    let settings = CameraSettings {
        device: args.device.clone(),
        resolution: args.width.zip(args.height),
        frame_rate: args.fps.map(|fps| (1, fps)),
        ..Default::default()
    };
    let capture_fn = get_capture_fn_linux(&settings)?;

    // Capturing blocks, so it lives on its own thread
    let (tx, rx) = mpsc::channel(2);
    std::thread::spawn(move || loop {
        match capture_fn() {
            Some(frame) => {
                if tx.blocking_send(frame[..].to_vec()).is_err() {
                    log::info!("Sender closed, stopping capture");
                    break;
                }
            }
            None => log::error!("Unable to capture frame, trying again..."),
        }
    });

    let sent = send_frames(&args.address, &args.camera, rx).await?;
    log::info!("Sent {} frames", sent);

    Ok(())
}
