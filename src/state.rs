//! Application context: the single owner of all mutable state
//!
//! Every mutation goes through a method here, and every method that changes
//! what should be on screen ends in [`AppContext::sync_gamma_to_state`].

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::{ConfigData, ConfigStore, GlobalSettings, SettingsUpdate};
use crate::constants::{app, hotkey_labels};
use crate::error::SaveError;
use crate::gamma::GammaEngine;
use crate::hotkeys::HotkeyTarget;
use crate::profiles::{MoveDirection, ProfileStore, RenameOutcome};
use crate::types::{CycleDirection, DisplayEntry, KeyCode, Profile, ProfileValues};

/// Mode flags shared by all components
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationState {
    config_initialized: bool,
    gamma_enabled: bool,
    advanced_mode: bool,
}

impl ApplicationState {
    pub fn config_initialized(&self) -> bool {
        self.config_initialized
    }

    pub fn gamma_enabled(&self) -> bool {
        self.gamma_enabled
    }

    pub fn advanced_mode(&self) -> bool {
        self.advanced_mode
    }
}

/// Result of a hotkey assignment request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HotkeyAssignment {
    Accepted,
    /// Key already bound; carries the description of the existing binding
    Conflict(String),
}

/// Snapshot for status queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status_text: String,
    pub state: ApplicationState,
    pub selected_profile: Option<usize>,
    pub selected_display: usize,
    pub display_name: Option<String>,
    pub apply_failed: bool,
    pub working_profile: Profile,
    pub simple_profile: Profile,
    pub curve: Vec<f32>,
}

pub struct AppContext {
    state: ApplicationState,
    settings: GlobalSettings,
    simple_profile: Profile,
    profiles: ProfileStore,
    gamma: GammaEngine,
    store: ConfigStore,
}

impl AppContext {
    /// Build the context from loaded config (or defaults on first run)
    pub fn new(data: Option<ConfigData>, gamma: GammaEngine, store: ConfigStore) -> Self {
        let data = data.unwrap_or_default();
        let mut settings = data.settings;

        let display_count = gamma.displays().len();
        if settings.selected_display >= display_count && settings.selected_display != 0 {
            warn!(index = settings.selected_display, count = display_count, "Saved display no longer present, using first display");
            settings.selected_display = 0;
        }

        let profiles = ProfileStore::new(data.profiles, settings.selected_profile_index);
        let state = ApplicationState {
            config_initialized: false,
            gamma_enabled: false,
            advanced_mode: settings.advanced_mode,
        };

        Self {
            state,
            settings,
            simple_profile: data.simple_profile,
            profiles,
            gamma,
            store,
        }
    }

    pub fn state(&self) -> ApplicationState {
        self.state
    }

    pub fn settings(&self) -> &GlobalSettings {
        &self.settings
    }

    pub fn simple_profile(&self) -> &Profile {
        &self.simple_profile
    }

    pub fn profiles(&self) -> &ProfileStore {
        &self.profiles
    }

    pub fn displays(&self) -> &[DisplayEntry] {
        self.gamma.displays()
    }

    pub fn selected_display(&self) -> usize {
        self.settings.selected_display
    }

    pub fn config_path(&self) -> &std::path::Path {
        self.store.path()
    }

    /// Launch sequence once config is loaded
    pub fn startup(&mut self) {
        self.state.config_initialized = true;

        if self.state.advanced_mode {
            self.profiles.load_selected_into_working();
        }

        let has_target = !self.state.advanced_mode || self.profiles.selected().is_some();
        if self.settings.apply_profile_on_launch && has_target {
            info!("Applying saved profile on launch");
            self.state.gamma_enabled = true;
        }
        self.sync_gamma_to_state();
    }

    /// Restore linear gamma and write the config one last time
    pub fn shutdown(&mut self) -> Result<(), SaveError> {
        self.gamma.reset_display(self.settings.selected_display);
        self.save()
    }

    /// Reconcile the display with the current flags
    ///
    /// Enabled: the working profile in advanced mode, the simple profile
    /// otherwise. Disabled: linear ramp.
    pub fn sync_gamma_to_state(&mut self) {
        let display = self.settings.selected_display;

        if !self.state.gamma_enabled {
            self.gamma.reset_display(display);
        } else if self.state.advanced_mode {
            self.gamma.apply_profile(self.profiles.working(), display);
        } else {
            self.gamma.apply_profile(&self.simple_profile, display);
        }
    }

    pub fn set_gamma_enabled(&mut self, enabled: bool) {
        if self.state.gamma_enabled != enabled {
            info!(enabled, "Gamma toggled");
        }
        self.state.gamma_enabled = enabled;
        self.sync_gamma_to_state();
    }

    pub fn toggle_gamma(&mut self) {
        self.set_gamma_enabled(!self.state.gamma_enabled);
    }

    pub fn set_advanced_mode(&mut self, enabled: bool) -> Result<(), SaveError> {
        info!(enabled, "Advanced mode changed");
        self.state.advanced_mode = enabled;
        if enabled {
            self.profiles.load_selected_into_working();
        }
        self.sync_gamma_to_state();
        self.save()
    }

    /// Step through profiles, honouring the loop setting
    pub fn cycle_profile(&mut self, direction: CycleDirection) -> bool {
        self.profiles.cycle(
            direction,
            self.settings.loop_profiles,
            &mut self.gamma,
            self.settings.selected_display,
        )
    }

    /// Turn gamma on and apply the profile at `index`
    pub fn enable_and_apply_profile(&mut self, index: usize) -> bool {
        if index >= self.profiles.len() {
            return false;
        }
        self.state.gamma_enabled = true;
        self.profiles
            .apply_by_index(index, &mut self.gamma, self.settings.selected_display)
    }

    pub fn enable_and_apply_profile_by_name(&mut self, name: &str) -> bool {
        match self.profiles.find_by_name(name) {
            Some(index) => self.enable_and_apply_profile(index),
            None => false,
        }
    }

    /// Switch output to display `index`
    ///
    /// The previous display is reset to linear first. Out-of-range is a no-op.
    pub fn select_display(&mut self, index: usize) -> Result<bool, SaveError> {
        if index >= self.gamma.displays().len() {
            return Ok(false);
        }
        if index != self.settings.selected_display {
            self.gamma.reset_display(self.settings.selected_display);
        }
        self.settings.selected_display = index;
        info!(index, "Selected display");
        self.sync_gamma_to_state();
        self.save()?;
        Ok(true)
    }

    pub fn update_settings(&mut self, update: &SettingsUpdate) -> Result<(), SaveError> {
        if self.settings.apply_update(update) {
            self.save()?;
        }
        Ok(())
    }

    /// Push `values` to the display without changing any state
    pub fn preview(&mut self, values: ProfileValues) {
        let mut profile = Profile::default();
        profile.set_values(values);
        profile.validate_and_clamp();
        self.gamma.apply_profile(&profile, self.settings.selected_display);
    }

    /// Store new simple-mode values, reconcile, and persist
    pub fn commit_simple_profile(&mut self, values: ProfileValues) -> Result<(), SaveError> {
        self.simple_profile.set_values(values);
        self.simple_profile.validate_and_clamp();
        self.sync_gamma_to_state();
        self.save()
    }

    /// Store new working-copy values and reconcile
    ///
    /// The working copy only reaches disk through [`Self::save_working_profile`].
    pub fn commit_working_profile(&mut self, values: ProfileValues) {
        let mut profile = self.profiles.working().clone();
        profile.set_values(values);
        profile.validate_and_clamp();
        self.profiles.set_working_values(profile.values());
        self.sync_gamma_to_state();
    }

    pub fn save_working_profile(&mut self, name: &str) -> Result<usize, SaveError> {
        let index = self.profiles.save_working(name);
        self.sync_gamma_to_state();
        self.save()?;
        Ok(index)
    }

    pub fn delete_profile(&mut self, index: usize) -> Result<bool, SaveError> {
        let was_selected = self.profiles.selected() == Some(index);
        if self.profiles.delete(index).is_none() {
            return Ok(false);
        }
        if was_selected {
            self.sync_gamma_to_state();
        }
        self.save()?;
        Ok(true)
    }

    pub fn rename_profile(&mut self, index: usize, name: &str) -> Result<RenameOutcome, SaveError> {
        let outcome = self.profiles.rename(index, name);
        if outcome == RenameOutcome::Renamed {
            self.save()?;
        }
        Ok(outcome)
    }

    pub fn move_profile(&mut self, index: usize, direction: MoveDirection) -> Result<bool, SaveError> {
        let moved = self.profiles.move_profile(index, direction);
        if moved {
            self.save()?;
        }
        Ok(moved)
    }

    pub fn revert_working(&mut self) -> bool {
        let reverted = self.profiles.revert_working();
        if reverted {
            self.sync_gamma_to_state();
        }
        reverted
    }

    /// Description of the binding already using `code`, ignoring `target` itself
    pub fn conflict_description(&self, code: KeyCode, target: HotkeyTarget) -> Option<String> {
        let s = &self.settings;
        if target != HotkeyTarget::Toggle && s.toggle_hotkey == Some(code) {
            return Some(hotkey_labels::TOGGLE.to_string());
        }
        if target != HotkeyTarget::PreviousProfile && s.previous_profile_hotkey == Some(code) {
            return Some(hotkey_labels::PREVIOUS.to_string());
        }
        if target != HotkeyTarget::NextProfile && s.next_profile_hotkey == Some(code) {
            return Some(hotkey_labels::NEXT.to_string());
        }

        let own = match target {
            HotkeyTarget::Profile => self.profiles.selected(),
            _ => None,
        };
        self.profiles
            .profiles()
            .iter()
            .enumerate()
            .find(|(i, p)| Some(*i) != own && p.hotkey == Some(code))
            .map(|(_, p)| format!("{}{}", hotkey_labels::PROFILE_PREFIX, p.name))
    }

    /// Bind `code` to `target`, or clear the binding when `code` is `None`
    ///
    /// A conflicting key is refused unless `force` is set, in which case it
    /// is removed from every other binding first.
    pub fn assign_hotkey(
        &mut self,
        target: HotkeyTarget,
        code: Option<KeyCode>,
        force: bool,
    ) -> Result<HotkeyAssignment, SaveError> {
        if let Some(code) = code {
            if let Some(conflict) = self.conflict_description(code, target) {
                if !force {
                    return Ok(HotkeyAssignment::Conflict(conflict));
                }
                info!(code, existing = %conflict, "Reassigning hotkey");
                self.clear_hotkey_everywhere(code);
            }
        }

        match target {
            HotkeyTarget::Toggle => self.settings.toggle_hotkey = code,
            HotkeyTarget::PreviousProfile => self.settings.previous_profile_hotkey = code,
            HotkeyTarget::NextProfile => self.settings.next_profile_hotkey = code,
            HotkeyTarget::Profile => self.profiles.set_hotkey(code),
        }
        info!(target = ?target, code = ?code, "Hotkey assigned");

        self.save()?;
        Ok(HotkeyAssignment::Accepted)
    }

    fn clear_hotkey_everywhere(&mut self, code: KeyCode) {
        for slot in [
            &mut self.settings.toggle_hotkey,
            &mut self.settings.previous_profile_hotkey,
            &mut self.settings.next_profile_hotkey,
        ] {
            if *slot == Some(code) {
                *slot = None;
            }
        }
        self.profiles.clear_hotkey(code);
    }

    /// Current state in persisted form
    pub fn snapshot(&self) -> ConfigData {
        let mut settings = self.settings.clone();
        settings.selected_profile_index = self.profiles.selected();
        settings.advanced_mode = self.state.advanced_mode;

        ConfigData {
            settings,
            simple_profile: self.simple_profile.clone(),
            profiles: self.profiles.profiles().to_vec(),
        }
    }

    pub fn save(&self) -> Result<(), SaveError> {
        self.store.save(&self.snapshot()).inspect_err(|e| {
            error!(error = %e, "Failed to save config");
        })
    }

    /// e.g. `Gamma Hotkey - On (Night)`
    pub fn status_text(&self) -> String {
        let power = if self.state.gamma_enabled { "On" } else { "Off" };
        match self.profiles.selected_profile() {
            Some(profile) if self.state.advanced_mode => {
                format!("{} - {power} ({})", app::DISPLAY_NAME, profile.name)
            }
            _ => format!("{} - {power}", app::DISPLAY_NAME),
        }
    }

    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            status_text: self.status_text(),
            state: self.state,
            selected_profile: self.profiles.selected(),
            selected_display: self.settings.selected_display,
            display_name: self
                .gamma
                .displays()
                .get(self.settings.selected_display)
                .map(|d| d.friendly_name.clone()),
            apply_failed: self.gamma.apply_failed(),
            working_profile: self.profiles.working().clone(),
            simple_profile: self.simple_profile.clone(),
            curve: self.gamma.curve().to_vec(),
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::display::testing::RecordingDisplay;
    use crate::gamma::{GammaRamp, build_ramp};
    use tempfile::TempDir;

    /// Context over two recording displays and a temp config file
    pub fn test_context(data: Option<ConfigData>) -> (AppContext, RecordingDisplay, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let display = RecordingDisplay::with_displays(2);
        let gamma = GammaEngine::new(Box::new(display.clone()));
        let store = ConfigStore::new(dir.path().join("gamma-hotkey.ini"));
        (AppContext::new(data, gamma, store), display, dir)
    }

    pub fn advanced_data() -> ConfigData {
        let mut data = ConfigData::default();
        data.settings.advanced_mode = true;
        data.settings.loop_profiles = true;
        data.profiles = vec![
            Profile::new("Day", 0, 1.0, 1.0),
            Profile::new("Evening", -10, 0.9, 1.2).with_hotkey(60),
            Profile::new("Night", -30, 0.8, 1.5),
        ];
        data
    }

    fn last_write(display: &RecordingDisplay) -> Option<GammaRamp> {
        display.writes().last().map(|(_, ramp)| ramp.clone())
    }

    #[test]
    fn test_startup_without_apply_on_launch_resets() {
        let (mut ctx, display, _dir) = test_context(None);
        ctx.startup();

        assert!(ctx.state().config_initialized());
        assert!(!ctx.state().gamma_enabled());
        assert_eq!(last_write(&display), Some(GammaRamp::identity()));
    }

    #[test]
    fn test_startup_applies_selected_profile_on_launch() {
        let mut data = advanced_data();
        data.settings.apply_profile_on_launch = true;
        data.settings.selected_profile_index = Some(2);
        let (mut ctx, display, _dir) = test_context(Some(data));

        ctx.startup();

        assert!(ctx.state().gamma_enabled());
        assert_eq!(ctx.profiles().working().name, "Night");
        assert_eq!(last_write(&display), Some(build_ramp(ctx.profiles().working()).0));
    }

    #[test]
    fn test_startup_advanced_without_selection_stays_off() {
        let mut data = advanced_data();
        data.settings.apply_profile_on_launch = true;
        let (mut ctx, _, _dir) = test_context(Some(data));

        ctx.startup();
        assert!(!ctx.state().gamma_enabled());
    }

    #[test]
    fn test_stale_display_falls_back_to_first() {
        let mut data = ConfigData::default();
        data.settings.selected_display = 7;
        let (ctx, _, _dir) = test_context(Some(data));
        assert_eq!(ctx.selected_display(), 0);
    }

    #[test]
    fn test_sync_uses_simple_profile_outside_advanced_mode() {
        let (mut ctx, display, _dir) = test_context(None);
        ctx.startup();

        let values = ProfileValues {
            brightness: 20,
            contrast: 1.1,
            gamma: 0.8,
        };
        ctx.commit_simple_profile(values).unwrap();
        // Still disabled: committing only stores
        assert_eq!(last_write(&display), Some(GammaRamp::identity()));

        ctx.set_gamma_enabled(true);
        assert_eq!(last_write(&display), Some(build_ramp(ctx.simple_profile()).0));

        ctx.toggle_gamma();
        assert!(!ctx.state().gamma_enabled());
        assert_eq!(last_write(&display), Some(GammaRamp::identity()));
    }

    #[test]
    fn test_preview_touches_hardware_only() {
        let (mut ctx, display, _dir) = test_context(None);
        ctx.startup();
        let before = ctx.snapshot();

        ctx.preview(ProfileValues {
            brightness: -40,
            contrast: 0.6,
            gamma: 2.5,
        });

        assert_eq!(ctx.snapshot(), before);
        assert!(!ctx.state().gamma_enabled());
        assert_eq!(
            last_write(&display),
            Some(build_ramp(&Profile::new("", -40, 0.6, 2.5)).0)
        );
        assert!(!ctx.config_path().exists());
    }

    #[test]
    fn test_commit_clamps_and_persists() {
        let (mut ctx, _, _dir) = test_context(None);
        ctx.commit_simple_profile(ProfileValues {
            brightness: 90,
            contrast: 1.0,
            gamma: 1.0,
        })
        .unwrap();

        assert_eq!(ctx.simple_profile().brightness, 50);
        let saved = ConfigStore::new(ctx.config_path()).load().unwrap();
        assert_eq!(saved.simple_profile.brightness, 50);
    }

    #[test]
    fn test_select_display_resets_previous() {
        let (mut ctx, display, _dir) = test_context(None);
        ctx.startup();
        ctx.set_gamma_enabled(true);

        assert!(ctx.select_display(1).unwrap());
        let writes = display.writes();
        let n = writes.len();
        assert_eq!(writes[n - 2], ("DISPLAY1".to_string(), GammaRamp::identity()));
        assert_eq!(writes[n - 1].0, "DISPLAY2");

        assert!(!ctx.select_display(5).unwrap());
        assert_eq!(ctx.selected_display(), 1);
    }

    #[test]
    fn test_conflict_descriptions() {
        let mut data = advanced_data();
        data.settings.toggle_hotkey = Some(10);
        data.settings.previous_profile_hotkey = Some(11);
        data.settings.next_profile_hotkey = Some(12);
        let (ctx, _, _dir) = test_context(Some(data));

        let target = HotkeyTarget::Profile;
        assert_eq!(ctx.conflict_description(10, target).as_deref(), Some("Toggle On/Off"));
        assert_eq!(ctx.conflict_description(11, target).as_deref(), Some("Previous Profile"));
        assert_eq!(ctx.conflict_description(12, target).as_deref(), Some("Next Profile"));
        assert_eq!(ctx.conflict_description(60, target).as_deref(), Some("Profile: Evening"));
        assert_eq!(ctx.conflict_description(99, target), None);

        // Re-binding a target's own key is not a conflict
        assert_eq!(ctx.conflict_description(10, HotkeyTarget::Toggle), None);
    }

    #[test]
    fn test_assign_hotkey_conflict_then_force() {
        let (mut ctx, _, _dir) = test_context(Some(advanced_data()));

        let result = ctx.assign_hotkey(HotkeyTarget::Toggle, Some(60), false).unwrap();
        assert_eq!(result, HotkeyAssignment::Conflict("Profile: Evening".into()));
        assert_eq!(ctx.settings().toggle_hotkey, None);

        let result = ctx.assign_hotkey(HotkeyTarget::Toggle, Some(60), true).unwrap();
        assert_eq!(result, HotkeyAssignment::Accepted);
        assert_eq!(ctx.settings().toggle_hotkey, Some(60));
        assert_eq!(ctx.profiles().profiles()[1].hotkey, None);

        let saved = ConfigStore::new(ctx.config_path()).load().unwrap();
        assert_eq!(saved.settings.toggle_hotkey, Some(60));
    }

    #[test]
    fn test_assign_none_clears_binding() {
        let mut data = advanced_data();
        data.settings.next_profile_hotkey = Some(33);
        let (mut ctx, _, _dir) = test_context(Some(data));

        let result = ctx.assign_hotkey(HotkeyTarget::NextProfile, None, false).unwrap();
        assert_eq!(result, HotkeyAssignment::Accepted);
        assert_eq!(ctx.settings().next_profile_hotkey, None);
    }

    #[test]
    fn test_assign_profile_hotkey_updates_selected_entry() {
        let mut data = advanced_data();
        data.settings.selected_profile_index = Some(0);
        let (mut ctx, _, _dir) = test_context(Some(data));

        ctx.assign_hotkey(HotkeyTarget::Profile, Some(77), false).unwrap();
        assert_eq!(ctx.profiles().profiles()[0].hotkey, Some(77));
        assert_eq!(ctx.profiles().working().hotkey, Some(77));
    }

    #[test]
    fn test_delete_selected_profile_reapplies_default() {
        let mut data = advanced_data();
        data.settings.selected_profile_index = Some(1);
        let (mut ctx, display, _dir) = test_context(Some(data));
        ctx.startup();
        ctx.set_gamma_enabled(true);

        assert!(ctx.delete_profile(1).unwrap());
        assert_eq!(ctx.profiles().selected(), None);
        assert_eq!(last_write(&display), Some(build_ramp(&Profile::default()).0));

        let saved = ConfigStore::new(ctx.config_path()).load().unwrap();
        assert_eq!(saved.profiles.len(), 2);
        assert_eq!(saved.settings.selected_profile_index, None);
    }

    #[test]
    fn test_save_working_profile_persists_selection() {
        let (mut ctx, _, _dir) = test_context(Some(advanced_data()));
        ctx.commit_working_profile(ProfileValues {
            brightness: 5,
            contrast: 1.2,
            gamma: 1.1,
        });

        let index = ctx.save_working_profile("Reading").unwrap();
        assert_eq!(index, 3);

        let saved = ConfigStore::new(ctx.config_path()).load().unwrap();
        assert_eq!(saved.profiles[3].name, "Reading");
        assert_eq!(saved.profiles[3].brightness, 5);
        assert_eq!(saved.settings.selected_profile_index, Some(3));
    }

    #[test]
    fn test_status_text() {
        let mut data = advanced_data();
        data.settings.selected_profile_index = Some(2);
        let (mut ctx, _, _dir) = test_context(Some(data));
        ctx.startup();

        assert_eq!(ctx.status_text(), "Gamma Hotkey - Off (Night)");
        ctx.set_gamma_enabled(true);
        assert_eq!(ctx.status_text(), "Gamma Hotkey - On (Night)");

        ctx.set_advanced_mode(false).unwrap();
        assert_eq!(ctx.status_text(), "Gamma Hotkey - On");
    }

    #[test]
    fn test_shutdown_resets_and_saves() {
        let (mut ctx, display, _dir) = test_context(Some(advanced_data()));
        ctx.startup();
        ctx.enable_and_apply_profile(2);

        ctx.shutdown().unwrap();

        assert_eq!(last_write(&display), Some(GammaRamp::identity()));
        let saved = ConfigStore::new(ctx.config_path()).load().unwrap();
        assert_eq!(saved.settings.selected_profile_index, Some(2));
    }

    #[test]
    fn test_status_report_carries_curve() {
        let (mut ctx, _, _dir) = test_context(None);
        ctx.startup();
        let report = ctx.status_report();
        assert_eq!(report.curve.len(), 256);
        assert_eq!(report.display_name.as_deref(), Some("Test Monitor 1"));
        assert!(!report.apply_failed);
    }
}
