//! Configuration management
//!
//! - **settings**: global flags and hotkeys from the `[GlobalHotkeys]` section
//! - **persistent**: parsing, rendering and crash-safe saving of the config file

pub mod persistent;
pub mod settings;

pub use persistent::{ConfigData, ConfigStore};
pub use settings::{GlobalSettings, SettingsUpdate};
