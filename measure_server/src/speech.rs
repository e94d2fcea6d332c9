//! Spoken announcements.
use std::{process::Command, thread::JoinHandle};

/// Speaks short messages through an external text-to-speech command.
///
/// Each announcement runs on its own thread so request handling never waits
/// for the speech to finish. Without a command, messages are only logged.
#[derive(Clone, Debug, Default)]
pub struct Announcer {
    command: Option<Vec<String>>,
}

impl Announcer {
    /// `command` is split on whitespace, the message is passed as the last argument,
    /// e.g. `espeak -s 150`.
    pub fn new(command: Option<&str>) -> Self {
        let command = command
            .map(|cmd| cmd.split_whitespace().map(str::to_owned).collect::<Vec<_>>())
            .filter(|parts| !parts.is_empty());
        Self { command }
    }

    pub fn silent() -> Self {
        Self::default()
    }

    pub fn announce(&self, text: &str) -> Option<JoinHandle<()>> {
        log::info!("Announcing: {text}");
        let (program, args) = self.command.as_ref()?.split_first()?;

        let mut cmd = Command::new(program);
        cmd.args(args).arg(text);
        let spawned = std::thread::Builder::new()
            .name("announcer".into())
            .spawn(move || match cmd.status() {
                Ok(status) if status.success() => {}
                Ok(status) => log::warn!("Speech command exited with {status}"),
                Err(e) => log::warn!("Speech command failed: {e}"),
            });

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::warn!("Could not start speech thread: {e}");
                None
            }
        }
    }
}
