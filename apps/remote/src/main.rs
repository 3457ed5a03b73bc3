use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
    thread,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use camera_core::{
    config::DEFAULT_CONFIG_PATH, load_settings_from, CameraEvent, CameraHandle, Controller,
    HttpTransport, LinkMonitor, PollSchedule, SystemProbe,
};
use clap::Parser;
use rtp_stream::{FrameReceiver, RecvTimeoutError};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Half-press, shoot and watch live view on a WiFi camera")]
struct Args {
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Overrides the configured camera address.
    #[arg(long)]
    gateway: Option<String>,
    /// Writes live-view frames and downloaded images here.
    #[arg(long)]
    frames_dir: Option<PathBuf>,
    /// Starts streaming as soon as the camera is in rec mode.
    #[arg(long)]
    live_view: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RemoteCommand {
    Focus,
    Unfocus,
    Shutter,
    Release,
    Click,
    LiveView(bool),
    LastImage,
    Quit,
}

impl FromStr for RemoteCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let command = match (words.next(), words.next()) {
            (Some("focus"), None) => Self::Focus,
            (Some("unfocus"), None) => Self::Unfocus,
            (Some("shutter"), None) => Self::Shutter,
            (Some("release"), None) => Self::Release,
            (Some("click"), None) => Self::Click,
            (Some("liveview"), Some("on")) => Self::LiveView(true),
            (Some("liveview"), Some("off")) => Self::LiveView(false),
            (Some("lastimage"), None) => Self::LastImage,
            (Some("quit" | "exit"), None) => Self::Quit,
            _ => bail!("unknown command {line:?}"),
        };
        if words.next().is_some() {
            bail!("unexpected arguments in {line:?}");
        }
        Ok(command)
    }
}

fn apply(handle: &CameraHandle, command: RemoteCommand) -> Result<()> {
    match command {
        RemoteCommand::Focus => handle.focus_pressed()?,
        RemoteCommand::Unfocus => handle.focus_released()?,
        RemoteCommand::Shutter => handle.shutter_pressed()?,
        RemoteCommand::Release => handle.shutter_released()?,
        RemoteCommand::Click => {
            handle.shutter_pressed()?;
            handle.shutter_released()?;
        }
        RemoteCommand::LiveView(enabled) => handle.set_live_view_enabled(enabled)?,
        RemoteCommand::LastImage => handle.fetch_last_image()?,
        RemoteCommand::Quit => {}
    }
    Ok(())
}

fn spawn_frame_writer(frames: FrameReceiver, dir: PathBuf) -> Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("frame-writer".into())
        .spawn(move || loop {
            match frames.recv_timeout(Duration::from_millis(500)) {
                Ok(frame) => {
                    let path = dir.join(format!("frame_{:06}.jpg", frame.number));
                    if let Err(err) = fs::write(&path, &frame.data) {
                        warn!(path = %path.display(), error = %err, "failed to write frame");
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        })
        .context("failed to start frame writer")
}

fn save_image(dir: &Path, data: &[u8]) -> Result<PathBuf> {
    let mut index = 0;
    let path = loop {
        let candidate = dir.join(format!("image_{index:04}.jpg"));
        if !candidate.exists() {
            break candidate;
        }
        index += 1;
    };
    fs::write(&path, data).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

async fn print_events(handle: CameraHandle, frames_dir: Option<PathBuf>) {
    let mut events = handle.subscribe_events();
    loop {
        match events.recv().await {
            Ok(event) => {
                if let (CameraEvent::ImageReceived { data, .. }, Some(dir)) = (&event, &frames_dir) {
                    match save_image(dir, data) {
                        Ok(path) => info!(path = %path.display(), "image saved"),
                        Err(err) => warn!(error = %err, "image not saved"),
                    }
                }
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(err) => warn!(error = %err, "unprintable event"),
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "event output fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings_from(&args.config);
    if let Some(gateway) = args.gateway {
        settings.gateway = gateway;
    }
    if let Some(dir) = &args.frames_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    info!(gateway = %settings.gateway, "starting camera remote");

    let transport = HttpTransport::new(&settings.user_agent)?;
    let (handle, frames, controller) = Controller::spawn(settings.clone(), Arc::new(transport))?;
    let printer = tokio::spawn(print_events(handle.clone(), args.frames_dir.clone()));
    let writer = match args.frames_dir {
        Some(dir) => Some(spawn_frame_writer(frames, dir)?),
        None => None,
    };

    let camera = settings
        .gateway_ip()
        .with_context(|| format!("gateway {} is not an IPv4 address", settings.gateway))?;
    let mut monitor = LinkMonitor::spawn(
        Box::new(SystemProbe),
        camera,
        PollSchedule::from_settings(&settings),
        handle.clone(),
    )
    .context("failed to start link monitor")?;

    if args.live_view {
        handle.set_live_view_enabled(true)?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.parse::<RemoteCommand>() {
            Ok(RemoteCommand::Quit) => break,
            Ok(command) => apply(&handle, command)?,
            Err(err) => warn!(error = %err, "ignoring input"),
        }
    }

    monitor.stop();
    handle.shutdown()?;
    controller.await.context("camera controller panicked")?;
    printer.abort();
    if let Some(writer) = writer {
        // Frame queue disconnects once the controller and its socket are gone.
        let _ = writer.join();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_line_commands() {
        assert_eq!("focus".parse::<RemoteCommand>().expect("focus"), RemoteCommand::Focus);
        assert_eq!(
            "  liveview   on ".parse::<RemoteCommand>().expect("liveview"),
            RemoteCommand::LiveView(true)
        );
        assert_eq!(
            "liveview off".parse::<RemoteCommand>().expect("liveview"),
            RemoteCommand::LiveView(false)
        );
        assert_eq!("exit".parse::<RemoteCommand>().expect("exit"), RemoteCommand::Quit);
    }

    #[test]
    fn rejects_unknown_input() {
        assert!("liveview".parse::<RemoteCommand>().is_err());
        assert!("focus now".parse::<RemoteCommand>().is_err());
        assert!("zoom".parse::<RemoteCommand>().is_err());
    }

    #[test]
    fn saved_images_do_not_overwrite() {
        let dir = std::env::temp_dir().join(format!("remote_images_{}", std::process::id()));
        fs::create_dir_all(&dir).expect("dir");
        let first = save_image(&dir, b"one").expect("first");
        let second = save_image(&dir, b"two").expect("second");
        assert_ne!(first, second);
        assert_eq!(fs::read(&second).expect("read"), b"two");
        fs::remove_dir_all(&dir).expect("cleanup");
    }
}
