//! microchurch-meet - meeting room for micro-church gatherings
//!
//! Browse scheduled meetings and join a simulated live room from the terminal.

mod config;
mod models;
mod room;
mod store;
mod tui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{Config, DeviceBackend};
use room::headless::run_headless;
use room::sim_devices::{PromptOutcome, SimulatedDevices};
use room::{MeetingController, RoomDriver};
use store::{FileMeetingStore, MeetingStore};
use tui::log_capture::LogBuffer;
use tui::{App, RoomOptions};

#[derive(Parser)]
#[command(name = "microchurch-meet")]
#[command(about = "Meeting room for micro-church gatherings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List upcoming meetings
    Meetings {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the share link for a meeting
    Link {
        /// Meeting ID (from `meetings` output)
        meeting_id: String,
    },

    /// Open the meeting room in the terminal
    Room {
        /// Go straight to the join form for this meeting
        #[arg(short, long)]
        meeting: Option<String>,

        /// Name to join with; with --meeting, joins right away
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Join a meeting headless, let the simulation run, and log every transition
    Simulate {
        /// Meeting ID to join
        #[arg(short, long)]
        meeting: String,

        /// Name to join with
        #[arg(short, long)]
        name: String,

        /// How long to stay in the room
        #[arg(short, long, default_value = "20")]
        seconds: u64,

        /// Simulate the user refusing camera access
        #[arg(long)]
        deny_camera: bool,
    },

    /// Show the effective configuration
    Config {
        /// Write the configuration file (defaults filled in)
        #[arg(long)]
        init: bool,
    },

    /// Test camera capture: open the camera and count frames
    #[cfg(feature = "video-capture")]
    CamTest {
        /// Capture duration in seconds
        #[arg(short, long, default_value = "3")]
        seconds: u64,
    },
}

/// Route logs to stderr, or into `capture` while the TUI owns the terminal.
fn init_logging(verbose: bool, capture: Option<LogBuffer>) {
    let filter = if verbose { "debug" } else { "info" };
    let (tui_layer, stderr_layer) = match capture {
        Some(buffer) => (
            Some(
                fmt::layer()
                    .with_writer(buffer)
                    .with_ansi(false)
                    .with_target(false),
            ),
            None,
        ),
        None => (
            None,
            Some(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            ),
        ),
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tui_layer)
        .with(stderr_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let capture = matches!(cli.command, Commands::Room { .. }).then(LogBuffer::new);
    init_logging(cli.verbose, capture.clone());

    let config = Config::load(cli.config.as_deref())?;
    let catalog = FileMeetingStore::new(config.meetings_path()?);

    match cli.command {
        Commands::Meetings { json } => {
            let meetings = catalog.list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&meetings)?);
            } else {
                store::print_meetings(&meetings, &config.link_domain);
            }
        }
        Commands::Link { meeting_id } => {
            let meeting = catalog
                .find(&meeting_id)?
                .with_context(|| format!("No meeting with id {}", meeting_id))?;
            println!("{}", store::share_link(&config.link_domain, &meeting.id));
        }
        Commands::Room { meeting, name } => {
            let options = RoomOptions {
                meetings: catalog.list()?,
                meeting_id: meeting,
                name: name.or_else(|| config.display_name.clone()),
                link_domain: config.link_domain.clone(),
                narrow_viewport_cols: config.room.narrow_viewport_cols,
            };
            run_room(&config, options, capture.unwrap_or_default()).await?;
        }
        Commands::Simulate {
            meeting,
            name,
            seconds,
            deny_camera,
        } => {
            let meeting = catalog
                .find(&meeting)?
                .with_context(|| format!("No meeting with id {}", meeting))?;
            let mut devices = config.devices.simulated.clone();
            if deny_camera {
                devices.camera = PromptOutcome::Deny;
            }
            tracing::info!("Joining \"{}\" as {} for {}s", meeting.title, name, seconds);
            let devices = SimulatedDevices::new(devices);
            let summary = run_headless(
                config.room_settings(),
                devices.clone(),
                config.simulation.clone(),
                meeting,
                &name,
                Duration::from_secs(seconds),
            )
            .await?;

            let phases: Vec<_> = summary.phases.iter().map(|p| p.as_str()).collect();
            println!("\nPhases: {}", phases.join(" -> "));
            println!("In the room: {}", summary.roster.join(", "));
            println!("Chat:");
            for line in &summary.transcript {
                println!("  {}", line);
            }
            println!(
                "Tracks released on leave: {} (still live on the devices: {})",
                summary.tracks_released,
                devices.live_tracks()
            );
        }
        Commands::Config { init } => {
            if init {
                let path = config.save(cli.config.as_deref())?;
                println!("Wrote {}", path.display());
            } else {
                let path = match cli.config {
                    Some(p) => p,
                    None => Config::config_path()?,
                };
                println!("# {}", path.display());
                print!("{}", toml::to_string_pretty(&config)?);
            }
        }
        #[cfg(feature = "video-capture")]
        Commands::CamTest { seconds } => {
            let settings = room::v4l_devices::V4lSettings {
                device_path: config.devices.camera_path.clone(),
                ..Default::default()
            };
            tracing::info!("Capturing from {} for {}s...", settings.device_path, seconds);
            let frames = tokio::task::spawn_blocking(move || {
                room::v4l_devices::cam_test(&settings, Duration::from_secs(seconds))
            })
            .await??;
            println!(
                "Captured {} frames ({:.1} fps)",
                frames,
                frames as f64 / seconds.max(1) as f64
            );
        }
    }

    Ok(())
}

async fn run_room(config: &Config, options: RoomOptions, log: LogBuffer) -> Result<()> {
    let controller = MeetingController::new(config.room_settings());
    match config.devices.backend {
        DeviceBackend::Simulated => {
            let devices = SimulatedDevices::new(config.devices.simulated.clone());
            let app = App::new(controller, options, log, Some(devices.clone()));
            let driver = RoomDriver::new(devices, config.simulation.clone());
            tui::run(app, driver).await
        }
        #[cfg(feature = "video-capture")]
        DeviceBackend::V4l => {
            let devices = room::v4l_devices::V4lDevices::new(room::v4l_devices::V4lSettings {
                device_path: config.devices.camera_path.clone(),
                ..Default::default()
            });
            let app = App::new(controller, options, log, None);
            let driver = RoomDriver::new(devices, config.simulation.clone());
            tui::run(app, driver).await
        }
        #[cfg(not(feature = "video-capture"))]
        DeviceBackend::V4l => {
            anyhow::bail!("The v4l device backend needs a build with the video-capture feature")
        }
    }
}
