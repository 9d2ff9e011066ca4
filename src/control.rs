//! Main-loop events and control request handling
//!
//! Requests arriving on the control socket are handed to the main thread
//! together with a reply channel, so every mutation of [`AppContext`]
//! happens on one thread.

use std::sync::mpsc::Sender;
use tracing::{debug, info};

use crate::error::SaveError;
use crate::hotkeys::{HotkeyAction, HotkeyDispatcher};
use crate::ipc::{ControlRequest, ControlResponse, ProfileSummary};
use crate::keys::key_name;
use crate::profiles::RenameOutcome;
use crate::state::{AppContext, HotkeyAssignment};

/// Everything the main loop reacts to
pub enum AppEvent {
    Hotkey(HotkeyAction),
    Control(ControlRequest, Sender<ControlResponse>),
}

/// Whether the main loop keeps running after a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

fn saved(result: Result<(), SaveError>) -> ControlResponse {
    match result {
        Ok(()) => ControlResponse::Ok,
        Err(e) => ControlResponse::Error(e.to_string()),
    }
}

fn profile_summaries(ctx: &AppContext) -> Vec<ProfileSummary> {
    let selected = ctx.profiles().selected();
    ctx.profiles()
        .profiles()
        .iter()
        .enumerate()
        .map(|(index, p)| ProfileSummary {
            index,
            name: p.name.clone(),
            values: p.values(),
            hotkey: p.hotkey,
            hotkey_name: p.hotkey.map(key_name),
            selected: selected == Some(index),
        })
        .collect()
}

/// Apply one request to the context
///
/// Out-of-range indices are silently ignored and answered with `Ok`.
pub fn handle_request(
    req: ControlRequest,
    ctx: &mut AppContext,
    dispatcher: &mut HotkeyDispatcher,
) -> (ControlResponse, Flow) {
    debug!(request = ?req, "Handling control request");
    let touches_bindings = req.touches_bindings();

    let response = match req {
        ControlRequest::Ping => ControlResponse::Pong,
        ControlRequest::Status => ControlResponse::Status(ctx.status_report()),
        ControlRequest::ListDisplays => ControlResponse::Displays(ctx.displays().to_vec()),
        ControlRequest::ListProfiles => ControlResponse::Profiles(profile_summaries(ctx)),

        ControlRequest::Toggle => {
            dispatcher.handle_hotkey(HotkeyAction::Toggle, ctx);
            ControlResponse::Ok
        }
        ControlRequest::SetEnabled(enabled) => {
            ctx.set_gamma_enabled(enabled);
            ControlResponse::Ok
        }
        ControlRequest::NextProfile => {
            dispatcher.handle_hotkey(HotkeyAction::NextProfile, ctx);
            ControlResponse::Ok
        }
        ControlRequest::PreviousProfile => {
            dispatcher.handle_hotkey(HotkeyAction::PreviousProfile, ctx);
            ControlResponse::Ok
        }

        ControlRequest::ApplyProfile(index) => {
            ctx.enable_and_apply_profile(index);
            ControlResponse::Ok
        }
        ControlRequest::ApplyProfileByName(name) => {
            if ctx.enable_and_apply_profile_by_name(&name) {
                ControlResponse::Ok
            } else {
                ControlResponse::Error(format!("No profile named '{name}'"))
            }
        }

        ControlRequest::SelectDisplay(index) => saved(ctx.select_display(index).map(drop)),
        ControlRequest::SetAdvancedMode(enabled) => saved(ctx.set_advanced_mode(enabled)),
        ControlRequest::UpdateSettings(update) => saved(ctx.update_settings(&update)),

        ControlRequest::Preview(values) => {
            ctx.preview(values);
            ControlResponse::Ok
        }
        ControlRequest::CommitSimple(values) => saved(ctx.commit_simple_profile(values)),
        ControlRequest::CommitWorking(values) => {
            ctx.commit_working_profile(values);
            ControlResponse::Ok
        }

        ControlRequest::SaveWorkingProfile(name) => saved(ctx.save_working_profile(&name).map(drop)),
        ControlRequest::DeleteProfile(index) => saved(ctx.delete_profile(index).map(drop)),
        ControlRequest::RenameProfile { index, name } => match ctx.rename_profile(index, &name) {
            Ok(RenameOutcome::NameTaken(name)) => {
                ControlResponse::Error(format!("A profile named '{name}' already exists"))
            }
            Ok(RenameOutcome::Renamed | RenameOutcome::InvalidIndex) => ControlResponse::Ok,
            Err(e) => ControlResponse::Error(e.to_string()),
        },
        ControlRequest::MoveProfile { index, direction } => {
            saved(ctx.move_profile(index, direction).map(drop))
        }
        ControlRequest::RevertWorking => {
            ctx.revert_working();
            ControlResponse::Ok
        }

        ControlRequest::AssignHotkey {
            target,
            code,
            force,
        } => match ctx.assign_hotkey(target, code, force) {
            Ok(HotkeyAssignment::Accepted) => ControlResponse::HotkeyAccepted,
            Ok(HotkeyAssignment::Conflict(description)) => {
                ControlResponse::HotkeyConflict(description)
            }
            Err(e) => ControlResponse::Error(e.to_string()),
        },
        ControlRequest::SuspendHotkeys => {
            dispatcher.unregister_all();
            ControlResponse::Ok
        }
        ControlRequest::ResumeHotkeys => match dispatcher.register_all() {
            Ok(()) => ControlResponse::Ok,
            Err(e) => ControlResponse::Error(e.to_string()),
        },

        ControlRequest::Shutdown => {
            info!("Received shutdown request");
            return (ControlResponse::Ok, Flow::Exit);
        }
    };

    if touches_bindings {
        dispatcher.sync_bindings(ctx);
    }
    (response, Flow::Continue)
}

#[cfg(unix)]
pub use listener::spawn_control_listener;

#[cfg(unix)]
mod listener {
    use anyhow::{Context, Result};
    use std::sync::mpsc::{self, Sender};
    use tracing::{debug, error, info, warn};

    use super::AppEvent;
    use crate::ipc::{ControlRequest, ControlServer};

    /// Spawn the thread that accepts control clients
    pub fn spawn_control_listener(
        server: ControlServer,
        events: Sender<AppEvent>,
    ) -> Result<std::thread::JoinHandle<()>> {
        std::thread::Builder::new()
            .name("control-listener".into())
            .spawn(move || {
                if let Err(e) = run_control_loop(&server, &events) {
                    error!(error = ?e, "Control listener thread crashed");
                }
            })
            .context("Failed to spawn control listener thread")
    }

    fn run_control_loop(server: &ControlServer, events: &Sender<AppEvent>) -> Result<()> {
        info!(socket = ?server.path(), "Control listener started");

        loop {
            let mut client = server.accept()?;
            debug!("Control client connected");

            loop {
                let request = match client.recv_request() {
                    Ok(request) => request,
                    Err(e) => {
                        warn!(error = ?e, "Control connection closed or error");
                        break;
                    }
                };
                let is_shutdown = request == ControlRequest::Shutdown;

                let (reply_tx, reply_rx) = mpsc::channel();
                if events.send(AppEvent::Control(request, reply_tx)).is_err() {
                    info!("Main loop gone, stopping control listener");
                    return Ok(());
                }
                let Ok(response) = reply_rx.recv() else {
                    return Ok(());
                };
                client.send_response(&response)?;

                if is_shutdown {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HotkeyError;
    use crate::hotkeys::{HotkeyTarget, KeyHandler, KeySource, TracingNotifier};
    use crate::state::tests::{advanced_data, test_context};
    use std::sync::Arc;

    struct NullKeys;

    impl KeySource for NullKeys {
        fn install(&mut self, _handler: KeyHandler) -> Result<(), HotkeyError> {
            Ok(())
        }

        fn uninstall(&mut self) {}
    }

    fn dispatcher() -> HotkeyDispatcher {
        HotkeyDispatcher::new(Box::new(NullKeys), Arc::new(|_| {}), Box::new(TracingNotifier))
    }

    #[test]
    fn test_list_profiles_marks_selection() {
        let mut data = advanced_data();
        data.settings.selected_profile_index = Some(1);
        let (mut ctx, _, _dir) = test_context(Some(data));
        let mut d = dispatcher();

        let (response, flow) = handle_request(ControlRequest::ListProfiles, &mut ctx, &mut d);
        assert_eq!(flow, Flow::Continue);

        let ControlResponse::Profiles(list) = response else {
            panic!("unexpected response: {response:?}");
        };
        assert_eq!(list.len(), 3);
        assert!(list[1].selected);
        assert_eq!(list[1].hotkey, Some(60));
        assert!(list[1].hotkey_name.is_some());
        assert!(!list[0].selected);
    }

    #[test]
    fn test_assign_hotkey_reports_conflict() {
        let (mut ctx, _, _dir) = test_context(Some(advanced_data()));
        let mut d = dispatcher();

        let req = ControlRequest::AssignHotkey {
            target: HotkeyTarget::NextProfile,
            code: Some(60),
            force: false,
        };
        let (response, _) = handle_request(req, &mut ctx, &mut d);
        assert_eq!(response, ControlResponse::HotkeyConflict("Profile: Evening".into()));
    }

    #[test]
    fn test_next_profile_when_off_enables() {
        let (mut ctx, _, _dir) = test_context(Some(advanced_data()));
        ctx.startup();
        let mut d = dispatcher();

        handle_request(ControlRequest::NextProfile, &mut ctx, &mut d);
        assert!(ctx.state().gamma_enabled());
        assert_eq!(ctx.profiles().selected(), None);

        handle_request(ControlRequest::NextProfile, &mut ctx, &mut d);
        assert_eq!(ctx.profiles().selected(), Some(0));
    }

    #[test]
    fn test_invalid_indices_are_silent() {
        let (mut ctx, display, _dir) = test_context(Some(advanced_data()));
        let mut d = dispatcher();

        for req in [
            ControlRequest::ApplyProfile(42),
            ControlRequest::SelectDisplay(42),
            ControlRequest::DeleteProfile(42),
        ] {
            let (response, _) = handle_request(req, &mut ctx, &mut d);
            assert_eq!(response, ControlResponse::Ok);
        }
        assert_eq!(ctx.profiles().len(), 3);
        assert!(display.writes().is_empty());
    }

    #[test]
    fn test_rename_to_taken_name_is_error() {
        let (mut ctx, _, _dir) = test_context(Some(advanced_data()));
        let mut d = dispatcher();

        let req = ControlRequest::RenameProfile {
            index: 0,
            name: "night".into(),
        };
        let (response, _) = handle_request(req, &mut ctx, &mut d);
        assert!(matches!(response, ControlResponse::Error(_)));
    }

    #[test]
    fn test_suspend_and_resume_hotkeys() {
        let (mut ctx, _, _dir) = test_context(None);
        let mut d = dispatcher();
        d.register_all().unwrap();

        handle_request(ControlRequest::SuspendHotkeys, &mut ctx, &mut d);
        assert!(!d.is_installed());

        let (response, _) = handle_request(ControlRequest::ResumeHotkeys, &mut ctx, &mut d);
        assert_eq!(response, ControlResponse::Ok);
        assert!(d.is_installed());
    }

    #[test]
    fn test_shutdown_exits() {
        let (mut ctx, _, _dir) = test_context(None);
        let mut d = dispatcher();
        let (response, flow) = handle_request(ControlRequest::Shutdown, &mut ctx, &mut d);
        assert_eq!(response, ControlResponse::Ok);
        assert_eq!(flow, Flow::Exit);
    }

    #[cfg(unix)]
    #[test]
    fn test_listener_forwards_to_main_thread() {
        use crate::ipc::{ControlClient, ControlServer};
        use std::sync::mpsc;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.sock");
        let server = ControlServer::bind_to(path.clone()).unwrap();
        let (tx, rx) = mpsc::channel();
        let handle = spawn_control_listener(server, tx).unwrap();

        let client = std::thread::spawn(move || {
            let mut client = ControlClient::connect_to(&path).unwrap();
            let pong = client.request(&ControlRequest::Ping).unwrap();
            let bye = client.request(&ControlRequest::Shutdown).unwrap();
            (pong, bye)
        });

        let (mut ctx, _, _dir) = test_context(None);
        let mut d = dispatcher();
        for _ in 0..2 {
            let Ok(AppEvent::Control(req, reply)) = rx.recv() else {
                panic!("expected a control event");
            };
            let (response, _) = handle_request(req, &mut ctx, &mut d);
            reply.send(response).unwrap();
        }

        let (pong, bye) = client.join().unwrap();
        assert_eq!(pong, ControlResponse::Pong);
        assert_eq!(bye, ControlResponse::Ok);
        handle.join().unwrap();
    }
}
