//! Ordered profile collection with selection, cycling and editing
//!
//! Order is user-visible: it drives cycling and the order in which profile
//! hotkeys are matched. `selected` is always `None` or a valid index.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::gamma::GammaEngine;
use crate::types::{CycleDirection, KeyCode, Profile, ProfileValues, names_match, sanitize_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveDirection {
    Up,
    Down,
}

/// Why a rename was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed,
    NameTaken(String),
    InvalidIndex,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileStore {
    profiles: Vec<Profile>,
    selected: Option<usize>,
    working: Profile,
}

impl ProfileStore {
    pub fn new(profiles: Vec<Profile>, selected: Option<usize>) -> Self {
        let selected = selected.filter(|&i| i < profiles.len());
        let working = selected
            .and_then(|i| profiles.get(i).cloned())
            .unwrap_or_default();
        Self {
            profiles,
            selected,
            working,
        }
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Profile> {
        self.profiles.get(index)
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_profile(&self) -> Option<&Profile> {
        self.selected.and_then(|i| self.profiles.get(i))
    }

    pub fn working(&self) -> &Profile {
        &self.working
    }

    /// Replace the working copy's values without touching the saved entry
    pub fn set_working_values(&mut self, values: ProfileValues) {
        self.working.set_values(values);
    }

    /// Copy the selected profile into the working copy, if one is selected
    pub fn load_selected_into_working(&mut self) {
        if let Some(profile) = self.selected_profile().cloned() {
            self.working = profile;
        }
    }

    /// Discard unsaved edits
    ///
    /// Returns false when nothing is selected, leaving the working copy as is.
    pub fn revert_working(&mut self) -> bool {
        match self.selected_profile().cloned() {
            Some(profile) => {
                self.working = profile;
                true
            }
            None => false,
        }
    }

    /// Select `index`, copy it into the working copy, and apply it
    ///
    /// Out-of-range indices are ignored and return false.
    pub fn apply_by_index(&mut self, index: usize, gamma: &mut GammaEngine, display: usize) -> bool {
        let Some(profile) = self.profiles.get(index) else {
            debug!(index, count = self.profiles.len(), "Ignoring apply of unknown profile");
            return false;
        };

        self.working = profile.clone();
        self.selected = Some(index);
        info!(index, name = %self.working.name, "Selected profile");
        gamma.apply_profile(&self.working, display);
        true
    }

    /// Step the selection and apply the result
    ///
    /// With `wrap` the ends connect; without it the selection stops at the
    /// first or last entry. Returns true only if the selection changed.
    pub fn cycle(
        &mut self,
        direction: CycleDirection,
        wrap: bool,
        gamma: &mut GammaEngine,
        display: usize,
    ) -> bool {
        let Some(candidate) = self.cycle_target(direction, wrap) else {
            return false;
        };

        if Some(candidate) == self.selected {
            debug!(index = candidate, "Cycle reached end of list");
            return false;
        }
        self.apply_by_index(candidate, gamma, display)
    }

    fn cycle_target(&self, direction: CycleDirection, wrap: bool) -> Option<usize> {
        let len = i64::try_from(self.profiles.len()).ok().filter(|&n| n > 0)?;
        let current = self
            .selected
            .and_then(|i| i64::try_from(i).ok())
            .unwrap_or(-1);
        let step = match direction {
            CycleDirection::Forward => 1,
            CycleDirection::Backward => -1,
        };

        let mut candidate = current + step;
        if wrap {
            if candidate < 0 {
                candidate = len - 1;
            } else if candidate >= len {
                candidate = 0;
            }
        } else {
            candidate = candidate.clamp(0, len - 1);
        }
        usize::try_from(candidate).ok()
    }

    /// Remove the entry at `index`
    ///
    /// Deleting the selected entry clears the selection and resets the
    /// working copy; a later selection shifts down to keep pointing at the
    /// same profile.
    pub fn delete(&mut self, index: usize) -> Option<Profile> {
        if index >= self.profiles.len() {
            return None;
        }
        let removed = self.profiles.remove(index);

        match self.selected {
            Some(selected) if selected == index => {
                self.selected = None;
                self.working = Profile::default();
            }
            Some(selected) if selected > index => self.selected = Some(selected - 1),
            _ => {}
        }

        info!(index, name = %removed.name, "Deleted profile");
        Some(removed)
    }

    /// First case-insensitive exact match
    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.profiles.iter().position(|p| names_match(&p.name, name))
    }

    /// Store the working copy under `name` and select it
    ///
    /// An existing profile with the same name is overwritten in place,
    /// otherwise the profile is appended. A hotkey already bound to another
    /// profile is not carried over. Returns the saved index.
    pub fn save_working(&mut self, name: &str) -> usize {
        self.working.name = sanitize_name(name);
        let target = self.find_by_name(&self.working.name);

        if let Some(code) = self.working.hotkey
            && self
                .profiles
                .iter()
                .enumerate()
                .any(|(i, p)| Some(i) != target && p.hotkey == Some(code))
        {
            debug!(code, name = %self.working.name, "Hotkey stays with its current profile");
            self.working.hotkey = None;
        }

        let index = match target {
            Some(existing) => {
                self.profiles[existing] = self.working.clone();
                existing
            }
            None => {
                self.profiles.push(self.working.clone());
                self.profiles.len() - 1
            }
        };

        self.selected = Some(index);
        info!(index, name = %self.working.name, "Saved profile");
        index
    }

    pub fn rename(&mut self, index: usize, name: &str) -> RenameOutcome {
        if index >= self.profiles.len() {
            return RenameOutcome::InvalidIndex;
        }

        let name = sanitize_name(name);
        let taken = self
            .profiles
            .iter()
            .enumerate()
            .any(|(i, p)| i != index && names_match(&p.name, &name));
        if taken {
            return RenameOutcome::NameTaken(name);
        }

        info!(index, from = %self.profiles[index].name, to = %name, "Renamed profile");
        if self.selected == Some(index) {
            self.working.name = name.clone();
        }
        self.profiles[index].name = name;
        RenameOutcome::Renamed
    }

    /// Swap `index` with its neighbour; the selection follows moved entries
    pub fn move_profile(&mut self, index: usize, direction: MoveDirection) -> bool {
        let target = match direction {
            MoveDirection::Up => index.checked_sub(1),
            MoveDirection::Down => index.checked_add(1),
        };
        let Some(target) = target.filter(|&t| t < self.profiles.len() && index < self.profiles.len())
        else {
            return false;
        };

        self.profiles.swap(index, target);
        self.selected = self.selected.map(|s| {
            if s == index {
                target
            } else if s == target {
                index
            } else {
                s
            }
        });
        true
    }

    /// Bind `hotkey` to the working copy and, when selected, the saved entry
    pub fn set_hotkey(&mut self, hotkey: Option<KeyCode>) {
        self.working.hotkey = hotkey;
        if let Some(i) = self.selected {
            self.profiles[i].hotkey = hotkey;
        }
    }

    /// Unbind `code` from every profile and the working copy
    pub fn clear_hotkey(&mut self, code: KeyCode) {
        for profile in self.profiles.iter_mut().filter(|p| p.hotkey == Some(code)) {
            profile.hotkey = None;
        }
        if self.working.hotkey == Some(code) {
            self.working.hotkey = None;
        }
    }

    /// First profile bound to `code`, in store order
    pub fn find_by_hotkey(&self, code: KeyCode) -> Option<usize> {
        self.profiles.iter().position(|p| p.hotkey == Some(code))
    }
}
