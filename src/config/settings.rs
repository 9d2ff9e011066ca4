//! Global settings persisted in the `[GlobalHotkeys]` section

use serde::{Deserialize, Serialize};

use crate::types::KeyCode;

/// Application-wide settings and the three global hotkeys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSettings {
    pub toggle_hotkey: Option<KeyCode>,
    pub next_profile_hotkey: Option<KeyCode>,
    pub previous_profile_hotkey: Option<KeyCode>,

    /// Cycling past either end wraps around instead of stopping
    pub loop_profiles: bool,

    pub start_minimized: bool,
    pub minimize_to_tray: bool,
    /// Owned by the startup-shortcut collaborator, only round-tripped here
    pub launch_on_startup: bool,

    /// Index into the enumerated display list
    pub selected_display: usize,

    /// Enable gamma with the persisted profile as soon as the app starts
    pub apply_profile_on_launch: bool,

    pub selected_profile_index: Option<usize>,
    pub advanced_mode: bool,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            toggle_hotkey: None,
            next_profile_hotkey: None,
            previous_profile_hotkey: None,
            loop_profiles: false,
            start_minimized: false,
            minimize_to_tray: true,
            launch_on_startup: false,
            selected_display: 0,
            apply_profile_on_launch: false,
            selected_profile_index: None,
            advanced_mode: false,
        }
    }
}

/// Subset of settings a UI may change in one request
///
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub loop_profiles: Option<bool>,
    pub start_minimized: Option<bool>,
    pub minimize_to_tray: Option<bool>,
    pub launch_on_startup: Option<bool>,
    pub apply_profile_on_launch: Option<bool>,
}

impl GlobalSettings {
    /// Apply the fields present in `update`, returning true if anything changed
    pub fn apply_update(&mut self, update: &SettingsUpdate) -> bool {
        let before = self.clone();

        if let Some(v) = update.loop_profiles {
            self.loop_profiles = v;
        }
        if let Some(v) = update.start_minimized {
            self.start_minimized = v;
        }
        if let Some(v) = update.minimize_to_tray {
            self.minimize_to_tray = v;
        }
        if let Some(v) = update.launch_on_startup {
            self.launch_on_startup = v;
        }
        if let Some(v) = update.apply_profile_on_launch {
            self.apply_profile_on_launch = v;
        }

        *self != before
    }
}
