//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Product naming used in status text and file names
pub mod app {
    /// Human-readable product name (status text prefix)
    pub const DISPLAY_NAME: &str = "Gamma Hotkey";

    /// Directory name used under runtime/cache dirs
    pub const DIR_NAME: &str = "gamma-hotkey";
}

/// Gamma ramp geometry
pub mod ramp {
    /// Entries per channel (8-bit input)
    pub const SIZE: usize = 256;

    /// Largest 16-bit output value
    pub const MAX: f32 = 65535.0;

    /// Identity ramp step: `i * 257` maps 0..=255 onto 0..=65535
    pub const IDENTITY_STEP: u16 = 257;

    /// Brightness slider units per unit of normalized offset
    pub const BRIGHTNESS_DIVISOR: f32 = 200.0;
}

/// Documented profile ranges and defaults
pub mod profile {
    pub const BRIGHTNESS_MIN: i32 = -50;
    pub const BRIGHTNESS_MAX: i32 = 50;
    pub const BRIGHTNESS_DEFAULT: i32 = 0;

    pub const CONTRAST_MIN: f32 = 0.5;
    pub const CONTRAST_MAX: f32 = 1.5;
    pub const CONTRAST_DEFAULT: f32 = 1.0;

    pub const GAMMA_MIN: f32 = 0.1;
    pub const GAMMA_MAX: f32 = 3.0;
    pub const GAMMA_DEFAULT: f32 = 1.0;

    /// Name used when sanitization leaves nothing behind
    pub const FALLBACK_NAME: &str = "Unnamed Profile";

    /// Characters that would corrupt the line-oriented config format
    pub const FORBIDDEN_NAME_CHARS: &[char] = &['[', ']', '=', '#', ';', '\r', '\n', '\t'];
}

/// Config file layout: section and key names
pub mod config {
    /// Extension of the config file written beside the executable
    pub const EXTENSION: &str = "ini";

    /// Suffix appended to the live path for the staging file
    pub const TEMP_SUFFIX: &str = ".tmp";

    pub const SECTION_GLOBAL_HOTKEYS: &str = "GlobalHotkeys";
    pub const SECTION_SIMPLE_PROFILE: &str = "SimpleProfile";
    pub const SECTION_PROFILE: &str = "Profile";

    pub const KEY_NAME: &str = "Name";
    pub const KEY_BRIGHTNESS: &str = "Brightness";
    pub const KEY_CONTRAST: &str = "Contrast";
    pub const KEY_GAMMA: &str = "Gamma";
    pub const KEY_HOTKEY: &str = "Hotkey";

    pub const KEY_TOGGLE_HOTKEY: &str = "ToggleHotkey";
    pub const KEY_NEXT_PROFILE_HOTKEY: &str = "NextProfileHotkey";
    pub const KEY_PREVIOUS_PROFILE_HOTKEY: &str = "PreviousProfileHotkey";
    pub const KEY_LOOP_PROFILES: &str = "LoopProfiles";
    pub const KEY_START_MINIMIZED: &str = "StartMinimized";
    pub const KEY_MINIMIZE_TO_TRAY: &str = "MinimizeToTray";
    pub const KEY_LAUNCH_ON_STARTUP: &str = "LaunchOnStartup";
    pub const KEY_SELECTED_DISPLAY: &str = "SelectedDisplay";
    pub const KEY_APPLY_ON_LAUNCH: &str = "ApplyProfileOnLaunch";
    pub const KEY_SELECTED_PROFILE_INDEX: &str = "SelectedProfileIndex";
    pub const KEY_ADVANCED_MODE: &str = "AdvancedMode";

    /// Header written at the top of every saved file
    pub const FILE_HEADER: &str = "; Configuration file for Gamma Hotkey.\n; Hotkey values are platform key codes (0 = none).\n";
}

/// Conflict descriptions shown by the hotkey capture UI
pub mod hotkey_labels {
    pub const TOGGLE: &str = "Toggle On/Off";
    pub const PREVIOUS: &str = "Previous Profile";
    pub const NEXT: &str = "Next Profile";
    pub const PROFILE_PREFIX: &str = "Profile: ";
}

/// Input event constants (from evdev)
pub mod input {
    /// Key press event value
    pub const KEY_PRESS: i32 = 1;
}

/// Filesystem paths
pub mod paths {
    /// Linux input device directory
    pub const DEV_INPUT: &str = "/dev/input";

    /// Control socket file name (under the runtime dir)
    pub const SOCKET_FILE: &str = "control.sock";
}

/// Permission-related constants
pub mod permissions {
    /// Linux group required for input device access
    pub const INPUT_GROUP: &str = "input";

    /// Command to add user to input group
    pub const ADD_TO_INPUT_GROUP: &str = "sudo usermod -aG input $USER";
}

/// Main loop timing
pub mod timing {
    /// Upper bound on how long the main loop blocks waiting for events
    pub const MAIN_LOOP_TICK_MS: u64 = 20;
}
