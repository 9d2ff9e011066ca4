//! Control protocol messages exchanged with UI clients

use serde::{Deserialize, Serialize};

use crate::config::SettingsUpdate;
use crate::hotkeys::HotkeyTarget;
use crate::profiles::MoveDirection;
use crate::state::StatusReport;
use crate::types::{DisplayEntry, KeyCode, ProfileValues};

/// Requests sent from a client to the running app
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ControlRequest {
    /// Health check
    Ping,

    Status,
    ListDisplays,
    ListProfiles,

    Toggle,
    SetEnabled(bool),
    NextProfile,
    PreviousProfile,

    /// Enable gamma and apply the profile at this index
    ApplyProfile(usize),
    ApplyProfileByName(String),

    SelectDisplay(usize),
    SetAdvancedMode(bool),
    UpdateSettings(SettingsUpdate),

    /// Show values on the display without storing them (slider drag)
    Preview(ProfileValues),
    /// Store values as the simple profile (slider release)
    CommitSimple(ProfileValues),
    /// Store values in the working profile (slider release, advanced mode)
    CommitWorking(ProfileValues),

    SaveWorkingProfile(String),
    DeleteProfile(usize),
    RenameProfile {
        index: usize,
        name: String,
    },
    MoveProfile {
        index: usize,
        direction: MoveDirection,
    },
    RevertWorking,

    /// `code: None` clears the binding; `force` reassigns a key in use
    AssignHotkey {
        target: HotkeyTarget,
        code: Option<KeyCode>,
        force: bool,
    },
    /// Stop capturing global keys while a hotkey capture dialog is open
    SuspendHotkeys,
    ResumeHotkeys,

    /// Request graceful shutdown
    Shutdown,
}

impl ControlRequest {
    /// Whether handling this request can change key bindings
    pub fn touches_bindings(&self) -> bool {
        matches!(
            self,
            ControlRequest::SaveWorkingProfile(_)
                | ControlRequest::DeleteProfile(_)
                | ControlRequest::MoveProfile { .. }
                | ControlRequest::AssignHotkey { .. }
        )
    }
}

/// One profile as listed to clients
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProfileSummary {
    pub index: usize,
    pub name: String,
    pub values: ProfileValues,
    pub hotkey: Option<KeyCode>,
    pub hotkey_name: Option<String>,
    pub selected: bool,
}

/// Responses sent from the app to a client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ControlResponse {
    /// Request processed
    Ok,

    /// Health check response
    Pong,

    Status(StatusReport),
    Displays(Vec<DisplayEntry>),
    Profiles(Vec<ProfileSummary>),

    HotkeyAccepted,
    /// Key already bound; carries the existing binding's description
    HotkeyConflict(String),

    /// Error occurred
    Error(String),
}
