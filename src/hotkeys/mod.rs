//! Global hotkey capture and dispatch
//!
//! A [`KeySource`] observes key-down events system-wide and asks a handler
//! whether to consume each one. The handler only looks the key up in a
//! binding snapshot and forwards the matched action to the main loop, which
//! then calls [`HotkeyDispatcher::handle_hotkey`] with the application
//! context. Nothing in the handler blocks.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, info, warn};

use crate::error::HotkeyError;
use crate::state::AppContext;
use crate::types::{CycleDirection, KeyCode};

#[cfg(target_os = "linux")]
mod evdev_source;
#[cfg(windows)]
mod windows_hook;

/// What a bound key does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HotkeyAction {
    Toggle,
    PreviousProfile,
    NextProfile,
    /// Apply the profile at this store index
    Profile(usize),
}

/// Which binding a hotkey assignment targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HotkeyTarget {
    Toggle,
    PreviousProfile,
    NextProfile,
    /// The working profile (and the selected saved profile, if any)
    Profile,
}

/// Whether an observed key event should reach other applications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    Consume,
    PassThrough,
}

/// Callback invoked by a key source for every key-down
pub type KeyHandler = Arc<dyn Fn(KeyCode) -> KeyDisposition + Send + Sync>;

/// Receives matched actions; must not block
pub type ActionSink = Arc<dyn Fn(HotkeyAction) + Send + Sync>;

/// System-wide key-down observer
pub trait KeySource {
    /// Start delivering key-down events to `handler`
    fn install(&mut self, handler: KeyHandler) -> Result<(), HotkeyError>;

    /// Stop delivering events; safe to call when not installed
    fn uninstall(&mut self);

    /// Drive platform callbacks that need the owning thread
    fn pump(&mut self) {}
}

/// UI collaborator notified around hotkey dispatch
pub trait UiNotifier {
    /// Dismiss menus or popups the consumed key would otherwise have closed
    fn cancel_transient(&mut self);

    fn state_changed(&mut self, status: &str);

    fn report_error(&mut self, message: &str);
}

/// Notifier for headless runs: everything goes to the log
pub struct TracingNotifier;

impl UiNotifier for TracingNotifier {
    fn cancel_transient(&mut self) {}

    fn state_changed(&mut self, status: &str) {
        info!(status = %status, "State changed");
    }

    fn report_error(&mut self, message: &str) {
        error!("{message}");
    }
}

/// Immutable snapshot of every key binding, in lookup order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HotkeyBindings {
    toggle: Option<KeyCode>,
    previous: Option<KeyCode>,
    next: Option<KeyCode>,
    profiles: Vec<Option<KeyCode>>,
}

impl HotkeyBindings {
    pub fn from_context(ctx: &AppContext) -> Self {
        let settings = ctx.settings();
        Self {
            toggle: settings.toggle_hotkey,
            previous: settings.previous_profile_hotkey,
            next: settings.next_profile_hotkey,
            profiles: ctx.profiles().profiles().iter().map(|p| p.hotkey).collect(),
        }
    }

    /// Toggle, then previous, then next, then profiles in store order
    pub fn resolve(&self, code: KeyCode) -> Option<HotkeyAction> {
        let code = Some(code);
        if self.toggle == code {
            Some(HotkeyAction::Toggle)
        } else if self.previous == code {
            Some(HotkeyAction::PreviousProfile)
        } else if self.next == code {
            Some(HotkeyAction::NextProfile)
        } else {
            self.profiles
                .iter()
                .position(|hotkey| *hotkey == code)
                .map(HotkeyAction::Profile)
        }
    }
}

/// Owns the key source and routes matched keys to application actions
pub struct HotkeyDispatcher {
    source: Box<dyn KeySource>,
    bindings: Arc<RwLock<HotkeyBindings>>,
    sink: ActionSink,
    ui: Box<dyn UiNotifier>,
    installed: bool,
    failure_reported: bool,
}

impl HotkeyDispatcher {
    pub fn new(source: Box<dyn KeySource>, sink: ActionSink, ui: Box<dyn UiNotifier>) -> Self {
        Self {
            source,
            bindings: Arc::default(),
            sink,
            ui,
            installed: false,
            failure_reported: false,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Install exactly one observer, replacing any existing one
    ///
    /// Failure is reported to the UI the first time only; the application
    /// keeps running without global hotkeys.
    pub fn register_all(&mut self) -> Result<(), HotkeyError> {
        self.unregister_all();

        let bindings = Arc::clone(&self.bindings);
        let sink = Arc::clone(&self.sink);
        let handler: KeyHandler = Arc::new(move |code| {
            let action = bindings
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .resolve(code);
            match action {
                Some(action) => {
                    debug!(code, action = ?action, "Hotkey matched");
                    sink(action);
                    KeyDisposition::Consume
                }
                None => KeyDisposition::PassThrough,
            }
        });

        match self.source.install(handler) {
            Ok(()) => {
                self.installed = true;
                info!("Global hotkeys registered");
                Ok(())
            }
            Err(e) => {
                if !self.failure_reported {
                    self.failure_reported = true;
                    self.ui.report_error(&format!("{e}. Continuing without global hotkeys."));
                } else {
                    warn!(error = %e, "Hotkey registration failed again");
                }
                Err(e)
            }
        }
    }

    pub fn unregister_all(&mut self) {
        if self.installed {
            self.source.uninstall();
            self.installed = false;
            info!("Global hotkeys unregistered");
        }
    }

    /// Rebuild the binding snapshot after hotkeys or profiles change
    pub fn sync_bindings(&self, ctx: &AppContext) {
        let fresh = HotkeyBindings::from_context(ctx);
        let mut bindings = self.bindings.write().unwrap_or_else(PoisonError::into_inner);
        if *bindings != fresh {
            debug!(bindings = ?fresh, "Hotkey bindings updated");
            *bindings = fresh;
        }
    }

    pub fn pump(&mut self) {
        if self.installed {
            self.source.pump();
        }
    }

    /// Carry out a matched action on the main thread
    pub fn handle_hotkey(&mut self, action: HotkeyAction, ctx: &mut AppContext) {
        self.ui.cancel_transient();
        info!(action = ?action, "Handling hotkey");

        match action {
            HotkeyAction::Toggle => ctx.toggle_gamma(),
            HotkeyAction::PreviousProfile | HotkeyAction::NextProfile => {
                if !ctx.state().gamma_enabled() {
                    // Off: the first press only turns gamma back on
                    ctx.set_gamma_enabled(true);
                } else {
                    let direction = if action == HotkeyAction::NextProfile {
                        CycleDirection::Forward
                    } else {
                        CycleDirection::Backward
                    };
                    ctx.cycle_profile(direction);
                }
            }
            HotkeyAction::Profile(index) => {
                ctx.enable_and_apply_profile(index);
            }
        }

        self.ui.state_changed(&ctx.status_text());
    }
}

/// Key source for the platform this binary was built for
#[cfg(target_os = "linux")]
pub fn platform_source() -> Box<dyn KeySource> {
    Box::new(evdev_source::EvdevSource::default())
}

#[cfg(windows)]
pub fn platform_source() -> Box<dyn KeySource> {
    Box::new(windows_hook::LowLevelHook::default())
}
