use anyhow::{Context, Result};
use evdev::{Device, EventType, InputEventKind, Key};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

use super::{KeyDisposition, KeyHandler, KeySource};
use crate::constants::{input, paths, permissions};
use crate::error::HotkeyError;

/// Handler slot shared with every listener thread; `None` while uninstalled
type SharedHandler = Arc<RwLock<Option<KeyHandler>>>;

/// Key source reading every keyboard under `/dev/input`
///
/// Listener threads block in the kernel read, so they are started once and
/// kept for the life of the process. Uninstalling empties the handler slot
/// and reinstalling fills it again; only when every listener has exited
/// (devices unplugged) does an install rescan. evdev delivers events to
/// every reader, so a consumed key still reaches other applications.
#[derive(Default)]
pub struct EvdevSource {
    handler: SharedHandler,
    listeners: Vec<JoinHandle<()>>,
}

/// Open every input device that reports a Tab key
///
/// Tab is how keyboards are told apart from mice, power buttons and
/// other devices that also emit key events.
fn find_all_keyboard_devices() -> Result<Vec<Device>> {
    info!(path = %paths::DEV_INPUT, "Scanning for keyboard devices...");

    let mut devices = Vec::new();

    for entry in std::fs::read_dir(paths::DEV_INPUT).context(format!(
        "Failed to read {} - are you in the '{}' group?",
        paths::DEV_INPUT,
        permissions::INPUT_GROUP
    ))? {
        let path = entry?.path();

        if let Ok(device) = Device::open(&path)
            && device
                .supported_keys()
                .is_some_and(|keys| keys.contains(Key::KEY_TAB))
        {
            info!(device_path = %path.display(), name = ?device.name(), "Found keyboard device");
            devices.push(device);
        }
    }

    if devices.is_empty() {
        anyhow::bail!(
            "No keyboard device found. Ensure you're in '{}' group:\n\
             {}\n\
             Then log out and back in.",
            permissions::INPUT_GROUP,
            permissions::ADD_TO_INPUT_GROUP
        )
    }

    info!(count = devices.len(), "Listening on keyboard device(s)");

    Ok(devices)
}

/// Pass `code` to the installed handler, if any
fn deliver(handler: &SharedHandler, code: u32) -> Option<KeyDisposition> {
    // Clone out so the lock is not held while the handler runs
    let current = handler.read().unwrap_or_else(PoisonError::into_inner).clone();
    current.map(|handler| handler(code))
}

/// Forward key-down events from one device until it goes away
fn listen_for_keys(mut device: Device, handler: SharedHandler) -> Result<()> {
    loop {
        // Blocks until the device has events
        let events = device.fetch_events().context("Failed to fetch events")?;

        for event in events {
            if event.event_type() != EventType::KEY || event.value() != input::KEY_PRESS {
                continue;
            }

            if let InputEventKind::Key(key) = event.kind()
                && deliver(&handler, u32::from(key.code())) == Some(KeyDisposition::Consume)
            {
                debug!(key = ?key, "Hotkey pressed");
            }
        }
    }
}

fn spawn_device_listeners(handler: &SharedHandler) -> Result<Vec<JoinHandle<()>>, HotkeyError> {
    if std::fs::read_dir(paths::DEV_INPUT).is_err() {
        error!(command = %permissions::ADD_TO_INPUT_GROUP, "Add user to input group, then log out and back in");
        return Err(HotkeyError::Permission {
            path: paths::DEV_INPUT.to_string(),
            group: permissions::INPUT_GROUP.to_string(),
        });
    }

    let devices = find_all_keyboard_devices().map_err(|e| HotkeyError::HookInstall(format!("{e:#}")))?;

    devices
        .into_iter()
        .map(|device| {
            let handler = Arc::clone(handler);
            thread::Builder::new()
                .name("hotkey-listener".into())
                .spawn(move || {
                    info!(device = ?device.name(), "Hotkey listener started");
                    if let Err(e) = listen_for_keys(device, handler) {
                        error!(error = %e, "Hotkey listener error");
                    }
                })
                .map_err(|e| HotkeyError::HookInstall(format!("failed to spawn listener: {e}")))
        })
        .collect()
}

impl EvdevSource {
    /// Start listeners through `spawn` unless some are still running
    fn ensure_listeners<F>(&mut self, spawn: F) -> Result<(), HotkeyError>
    where
        F: FnOnce(&SharedHandler) -> Result<Vec<JoinHandle<()>>, HotkeyError>,
    {
        self.listeners.retain(|listener| !listener.is_finished());
        if self.listeners.is_empty() {
            self.listeners = spawn(&self.handler)?;
        } else {
            debug!(count = self.listeners.len(), "Reusing running keyboard listeners");
        }
        Ok(())
    }

    fn set_handler(&self, handler: Option<KeyHandler>) {
        *self.handler.write().unwrap_or_else(PoisonError::into_inner) = handler;
    }
}

impl KeySource for EvdevSource {
    fn install(&mut self, handler: KeyHandler) -> Result<(), HotkeyError> {
        self.set_handler(Some(handler));
        if let Err(e) = self.ensure_listeners(spawn_device_listeners) {
            self.set_handler(None);
            return Err(e);
        }
        Ok(())
    }

    fn uninstall(&mut self) {
        self.set_handler(None);
        debug!("Keyboard handler detached");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::mpsc;

    #[test]
    fn test_reinstall_reuses_running_listeners() {
        let mut source = EvdevSource::default();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let stop_rx = Arc::new(Mutex::new(stop_rx));
        let mut spawns = 0;

        for _ in 0..3 {
            source
                .ensure_listeners(|_| {
                    spawns += 1;
                    let stop_rx = Arc::clone(&stop_rx);
                    Ok(vec![thread::spawn(move || {
                        let _ = stop_rx.lock().unwrap().recv();
                    })])
                })
                .unwrap();
            source.uninstall();
        }

        assert_eq!(spawns, 1);
        assert_eq!(source.listeners.len(), 1);

        // Once every listener has exited the next install rescans
        drop(stop_tx);
        for listener in source.listeners.drain(..) {
            listener.join().unwrap();
        }
        source
            .ensure_listeners(|_| {
                spawns += 1;
                Ok(Vec::new())
            })
            .unwrap();
        assert_eq!(spawns, 2);
    }

    #[test]
    fn test_uninstalled_source_delivers_nothing() {
        let source = EvdevSource::default();
        assert_eq!(deliver(&source.handler, 30), None);

        let handler: KeyHandler = Arc::new(|code| {
            if code == 30 {
                KeyDisposition::Consume
            } else {
                KeyDisposition::PassThrough
            }
        });
        source.set_handler(Some(handler));
        assert_eq!(deliver(&source.handler, 30), Some(KeyDisposition::Consume));
        assert_eq!(deliver(&source.handler, 31), Some(KeyDisposition::PassThrough));

        source.set_handler(None);
        assert_eq!(deliver(&source.handler, 30), None);
    }
}
