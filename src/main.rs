#![cfg_attr(not(windows), forbid(unsafe_code))]

mod config;
mod constants;
mod control;
mod display;
mod error;
mod gamma;
mod hotkeys;
#[cfg(windows)]
mod instance;
mod ipc;
mod keys;
mod profiles;
mod state;
mod types;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
#[cfg(unix)]
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
#[cfg(unix)]
use std::sync::mpsc::Sender;
use std::time::Duration;
use tracing::{Level as TraceLevel, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use config::ConfigStore;
use constants::timing;
use control::{AppEvent, Flow};
use gamma::GammaEngine;
use hotkeys::{ActionSink, HotkeyDispatcher, TracingNotifier};
use state::AppContext;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Config file (defaults to gamma-hotkey.ini beside the executable)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the hotkey daemon (default)
    Run,
    /// List the active displays
    Displays,
    /// Send a command to the running daemon
    #[cfg(unix)]
    Ctl {
        /// Control socket (defaults to the runtime dir)
        #[arg(long)]
        socket: Option<PathBuf>,

        #[command(subcommand)]
        command: ctl::CtlCommand,
    },
}

fn init_logging() -> Result<()> {
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    // stdout is reserved for `ctl` and `displays` output
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn config_store(path: Option<PathBuf>) -> Result<ConfigStore> {
    match path {
        Some(path) => Ok(ConfigStore::new(path)),
        None => ConfigStore::beside_executable(),
    }
}

fn list_displays() -> Result<()> {
    let displays = display::platform_backend().enumerate()?;
    if displays.is_empty() {
        println!("No active displays found");
    }
    for (index, entry) in displays.iter().enumerate() {
        println!("{index}: {} ({})", entry.friendly_name, entry.device_name);
    }
    Ok(())
}

/// Control socket and termination flag of a running daemon
#[cfg(unix)]
struct ControlPlane {
    socket_path: PathBuf,
    terminate: Arc<AtomicBool>,
}

/// Bind the control socket, start its listener and trap SIGINT/SIGTERM
///
/// Requests queue in `events` until the main loop starts. The listener
/// thread stays blocked in accept until the process exits.
#[cfg(unix)]
fn start_control_plane(socket_path: PathBuf, events: &Sender<AppEvent>) -> Result<ControlPlane> {
    let server = ipc::ControlServer::bind_to(socket_path)?;
    let socket_path = server.path().to_path_buf();
    control::spawn_control_listener(server, events.clone())?;

    let terminate = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&terminate))
            .context("Failed to register signal handler")?;
    }

    Ok(ControlPlane {
        socket_path,
        terminate,
    })
}

fn run(store: ConfigStore) -> Result<()> {
    // Everything that can fail happens before the display is touched
    #[cfg(windows)]
    let _instance = instance::acquire()?;

    let (events_tx, events_rx) = mpsc::channel();

    #[cfg(unix)]
    let control_plane = start_control_plane(ipc::default_socket_path()?, &events_tx)?;

    let data = store.load();
    let first_run = data.is_none();

    let engine = GammaEngine::new(display::platform_backend());
    let mut ctx = AppContext::new(data, engine, store);
    ctx.startup();
    info!(
        config = %ctx.config_path().display(),
        first_run,
        status = %ctx.status_text(),
        "Started"
    );

    let hotkey_tx = events_tx.clone();
    let sink: ActionSink = Arc::new(move |action| {
        if hotkey_tx.send(AppEvent::Hotkey(action)).is_err() {
            warn!("Main loop gone, dropping hotkey");
        }
    });
    let mut dispatcher =
        HotkeyDispatcher::new(hotkeys::platform_source(), sink, Box::new(TracingNotifier));
    dispatcher.sync_bindings(&ctx);
    // Failure is already reported; the daemon still serves control requests
    let _ = dispatcher.register_all();
    if !dispatcher.is_installed() {
        warn!("Running without global hotkeys");
    }
    drop(events_tx);

    let tick = Duration::from_millis(timing::MAIN_LOOP_TICK_MS);
    loop {
        #[cfg(unix)]
        if control_plane.terminate.load(Ordering::Relaxed) {
            info!("Termination signal received");
            break;
        }

        dispatcher.pump();

        let flow = match events_rx.recv_timeout(tick) {
            Ok(AppEvent::Hotkey(action)) => {
                dispatcher.handle_hotkey(action, &mut ctx);
                Flow::Continue
            }
            Ok(AppEvent::Control(request, reply)) => {
                let (response, flow) = control::handle_request(request, &mut ctx, &mut dispatcher);
                if reply.send(response).is_err() {
                    warn!("Control client left before the reply was sent");
                }
                flow
            }
            Err(RecvTimeoutError::Timeout) => Flow::Continue,
            Err(RecvTimeoutError::Disconnected) => {
                warn!("All event senders closed");
                Flow::Exit
            }
        };

        if flow == Flow::Exit {
            break;
        }
    }

    info!("Shutting down");
    dispatcher.unregister_all();
    if let Err(e) = ctx.shutdown() {
        error!(error = %e, "Failed to save config on exit");
    }
    #[cfg(unix)]
    let _ = std::fs::remove_file(&control_plane.socket_path);
    Ok(())
}

#[cfg(unix)]
mod ctl {
    use anyhow::{Result, bail};
    use clap::{Subcommand, ValueEnum};
    use std::path::PathBuf;

    use crate::hotkeys::HotkeyTarget;
    use crate::ipc::{ControlClient, ControlRequest, ControlResponse, default_socket_path};
    use crate::profiles::MoveDirection;
    use crate::types::{KeyCode, ProfileValues};

    #[derive(ValueEnum, Debug, Clone, Copy)]
    pub enum Direction {
        Up,
        Down,
    }

    #[derive(ValueEnum, Debug, Clone, Copy)]
    pub enum Target {
        Toggle,
        Previous,
        Next,
        /// The selected profile
        Profile,
    }

    #[derive(Subcommand, Debug)]
    pub enum CtlCommand {
        Ping,
        Status,
        Displays,
        Profiles,
        Toggle,
        On,
        Off,
        Next,
        Previous,
        /// Enable gamma and apply a profile by index or name
        Apply { profile: String },
        /// Select the display that receives gamma changes
        Display { index: usize },
        /// Switch between simple and advanced mode
        Mode {
            #[arg(long)]
            advanced: bool,
        },
        /// Store values as the simple profile
        Simple {
            #[arg(long, allow_hyphen_values = true)]
            brightness: i32,
            #[arg(long)]
            contrast: f32,
            #[arg(long)]
            gamma: f32,
        },
        /// Save the working profile under a name
        Save { name: String },
        Delete { index: usize },
        Rename { index: usize, name: String },
        Move { index: usize, direction: Direction },
        /// Bind a key code, or clear the binding when omitted
        Hotkey {
            target: Target,
            code: Option<KeyCode>,
            #[arg(long)]
            force: bool,
        },
        Suspend,
        Resume,
        Shutdown,
    }

    impl CtlCommand {
        fn into_request(self) -> ControlRequest {
            match self {
                CtlCommand::Ping => ControlRequest::Ping,
                CtlCommand::Status => ControlRequest::Status,
                CtlCommand::Displays => ControlRequest::ListDisplays,
                CtlCommand::Profiles => ControlRequest::ListProfiles,
                CtlCommand::Toggle => ControlRequest::Toggle,
                CtlCommand::On => ControlRequest::SetEnabled(true),
                CtlCommand::Off => ControlRequest::SetEnabled(false),
                CtlCommand::Next => ControlRequest::NextProfile,
                CtlCommand::Previous => ControlRequest::PreviousProfile,
                CtlCommand::Apply { profile } => match profile.parse() {
                    Ok(index) => ControlRequest::ApplyProfile(index),
                    Err(_) => ControlRequest::ApplyProfileByName(profile),
                },
                CtlCommand::Display { index } => ControlRequest::SelectDisplay(index),
                CtlCommand::Mode { advanced } => ControlRequest::SetAdvancedMode(advanced),
                CtlCommand::Simple {
                    brightness,
                    contrast,
                    gamma,
                } => ControlRequest::CommitSimple(ProfileValues {
                    brightness,
                    contrast,
                    gamma,
                }),
                CtlCommand::Save { name } => ControlRequest::SaveWorkingProfile(name),
                CtlCommand::Delete { index } => ControlRequest::DeleteProfile(index),
                CtlCommand::Rename { index, name } => ControlRequest::RenameProfile { index, name },
                CtlCommand::Move { index, direction } => ControlRequest::MoveProfile {
                    index,
                    direction: match direction {
                        Direction::Up => MoveDirection::Up,
                        Direction::Down => MoveDirection::Down,
                    },
                },
                CtlCommand::Hotkey {
                    target,
                    code,
                    force,
                } => ControlRequest::AssignHotkey {
                    target: match target {
                        Target::Toggle => HotkeyTarget::Toggle,
                        Target::Previous => HotkeyTarget::PreviousProfile,
                        Target::Next => HotkeyTarget::NextProfile,
                        Target::Profile => HotkeyTarget::Profile,
                    },
                    code,
                    force,
                },
                CtlCommand::Suspend => ControlRequest::SuspendHotkeys,
                CtlCommand::Resume => ControlRequest::ResumeHotkeys,
                CtlCommand::Shutdown => ControlRequest::Shutdown,
            }
        }
    }

    pub fn send(socket: Option<PathBuf>, command: CtlCommand) -> Result<()> {
        let path = match socket {
            Some(path) => path,
            None => default_socket_path()?,
        };
        let mut client = ControlClient::connect_to(&path)?;

        match client.request(&command.into_request())? {
            ControlResponse::Ok | ControlResponse::HotkeyAccepted => {}
            ControlResponse::Pong => println!("pong"),
            ControlResponse::Status(report) => {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            ControlResponse::Displays(displays) => {
                for (index, entry) in displays.iter().enumerate() {
                    println!("{index}: {} ({})", entry.friendly_name, entry.device_name);
                }
            }
            ControlResponse::Profiles(profiles) => {
                for p in profiles {
                    let marker = if p.selected { '*' } else { ' ' };
                    let hotkey = p.hotkey_name.as_deref().unwrap_or("-");
                    println!(
                        "{marker}{}: {} [brightness {}, contrast {:.2}, gamma {:.2}] hotkey {hotkey}",
                        p.index, p.name, p.values.brightness, p.values.contrast, p.values.gamma
                    );
                }
            }
            ControlResponse::HotkeyConflict(owner) => {
                bail!("Key already used by {owner}; pass --force to reassign")
            }
            ControlResponse::Error(message) => bail!(message),
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    init_logging()?;
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config_store(cli.config)?),
        Command::Displays => list_displays(),
        #[cfg(unix)]
        Command::Ctl { socket, command } => ctl::send(socket, command),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_control_plane_fails_without_socket_dir() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the socket directory should be
        let blocker = dir.path().join("runtime");
        std::fs::write(&blocker, "x").unwrap();

        let (events_tx, events_rx) = mpsc::channel::<AppEvent>();
        let result = start_control_plane(blocker.join("control.sock"), &events_tx);

        assert!(result.is_err());
        drop(events_tx);
        // No listener thread kept a sender alive
        assert!(events_rx.recv().is_err());
    }
}
