//! Shared data model: profiles, displays and key codes

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::profile::*;

/// Platform key code: a virtual-key code on Windows, an evdev key code on Linux
pub type KeyCode = u32;

/// Named bundle of brightness/contrast/gamma values plus an optional hotkey
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    /// Range: -50 to 50
    pub brightness: i32,
    /// Range: 0.5 to 1.5
    pub contrast: f32,
    /// Range: 0.1 to 3.0
    pub gamma: f32,
    #[serde(default)]
    pub hotkey: Option<KeyCode>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: String::new(),
            brightness: BRIGHTNESS_DEFAULT,
            contrast: CONTRAST_DEFAULT,
            gamma: GAMMA_DEFAULT,
            hotkey: None,
        }
    }
}

impl Profile {
    pub fn new(name: impl Into<String>, brightness: i32, contrast: f32, gamma: f32) -> Self {
        Self {
            name: name.into(),
            brightness,
            contrast,
            gamma,
            hotkey: None,
        }
    }

    pub fn with_hotkey(mut self, hotkey: KeyCode) -> Self {
        self.hotkey = Some(hotkey);
        self
    }

    /// The adjustment values only, without name or hotkey
    pub fn values(&self) -> ProfileValues {
        ProfileValues {
            brightness: self.brightness,
            contrast: self.contrast,
            gamma: self.gamma,
        }
    }

    pub fn set_values(&mut self, values: ProfileValues) {
        self.brightness = values.brightness;
        self.contrast = values.contrast;
        self.gamma = values.gamma;
    }

    /// Clamp numeric fields into their documented ranges
    /// Returns true if anything had to change
    pub fn validate_and_clamp(&mut self) -> bool {
        let mut changed = false;

        if !(BRIGHTNESS_MIN..=BRIGHTNESS_MAX).contains(&self.brightness) {
            let clamped = self.brightness.clamp(BRIGHTNESS_MIN, BRIGHTNESS_MAX);
            warn!(profile = %self.name, brightness = self.brightness, using = clamped, "brightness out of range, clamping");
            self.brightness = clamped;
            changed = true;
        }

        if let Some(contrast) = clamp_float(self.contrast, CONTRAST_MIN, CONTRAST_MAX, CONTRAST_DEFAULT) {
            warn!(profile = %self.name, contrast = self.contrast, using = contrast, "contrast out of range, clamping");
            self.contrast = contrast;
            changed = true;
        }

        if let Some(gamma) = clamp_float(self.gamma, GAMMA_MIN, GAMMA_MAX, GAMMA_DEFAULT) {
            warn!(profile = %self.name, gamma = self.gamma, using = gamma, "gamma out of range, clamping");
            self.gamma = gamma;
            changed = true;
        }

        changed
    }
}

/// Returns the corrected value when `value` is outside `[min, max]` or not finite
fn clamp_float(value: f32, min: f32, max: f32, default: f32) -> Option<f32> {
    if !value.is_finite() {
        Some(default)
    } else if value < min || value > max {
        Some(value.clamp(min, max))
    } else {
        None
    }
}

/// Brightness/contrast/gamma triple as edited by slider UIs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileValues {
    pub brightness: i32,
    pub contrast: f32,
    pub gamma: f32,
}

impl Default for ProfileValues {
    fn default() -> Self {
        Profile::default().values()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleDirection {
    Forward,
    Backward,
}

/// One attached display as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayEntry {
    /// Opaque identifier handed back to the backend (e.g. `\\.\DISPLAY1`, `HDMI-1`)
    pub device_name: String,
    /// Human-readable label for pickers
    pub friendly_name: String,
}

/// Make a user-supplied name safe for the config format
///
/// Trims surrounding whitespace, replaces format-breaking characters with
/// `_`, and substitutes a placeholder when nothing is left.
pub fn sanitize_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| if FORBIDDEN_NAME_CHARS.contains(&c) { '_' } else { c })
        .collect();

    if sanitized.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        sanitized
    }
}

/// Case-insensitive name comparison used for uniqueness checks
pub fn names_match(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}
