//! Durable INI-style configuration
//!
//! The file lives beside the executable and holds three kinds of section:
//! `[GlobalHotkeys]`, `[SimpleProfile]` and one `[Profile]` block per saved
//! profile. Parsing never fails: malformed lines are skipped, bad numbers fall
//! back to defaults, and a missing file means first run.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{ErrorKind, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, info, warn};

use crate::config::GlobalSettings;
use crate::constants::config::*;
use crate::constants::hotkey_labels;
use crate::error::SaveError;
use crate::types::{KeyCode, Profile, names_match, sanitize_name};

/// Everything persisted between runs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigData {
    pub settings: GlobalSettings,
    pub simple_profile: Profile,
    pub profiles: Vec<Profile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Unknown,
    GlobalHotkeys,
    SimpleProfile,
    Profile,
}

impl Section {
    fn from_header(name: &str) -> Self {
        let name = name.trim();
        if name.eq_ignore_ascii_case(SECTION_GLOBAL_HOTKEYS) {
            Section::GlobalHotkeys
        } else if name.eq_ignore_ascii_case(SECTION_SIMPLE_PROFILE) {
            Section::SimpleProfile
        } else if name.eq_ignore_ascii_case(SECTION_PROFILE) {
            Section::Profile
        } else {
            Section::Unknown
        }
    }
}

/// Parse config text into settings and profiles
pub fn parse(contents: &str) -> ConfigData {
    let mut data = ConfigData::default();
    let mut section = Section::Unknown;
    let mut pending: Option<Profile> = None;

    for (line_no, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            if let Some(profile) = pending.take() {
                finalize_profile(&mut data.profiles, profile);
            }
            section = Section::from_header(header);
            if section == Section::Unknown {
                debug!(line = line_no + 1, section = %header, "Ignoring unknown section");
            } else if section == Section::Profile {
                pending = Some(Profile::default());
            }
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            debug!(line = line_no + 1, content = %line, "Skipping line without '='");
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        match section {
            Section::GlobalHotkeys => apply_global(&mut data.settings, key, value),
            Section::SimpleProfile => apply_profile_field(&mut data.simple_profile, key, value),
            Section::Profile => {
                if let Some(profile) = pending.as_mut() {
                    apply_profile_field(profile, key, value);
                }
            }
            Section::Unknown => {}
        }
    }

    if let Some(profile) = pending.take() {
        finalize_profile(&mut data.profiles, profile);
    }

    // Never persisted with a name or hotkey
    data.simple_profile.name.clear();
    data.simple_profile.hotkey = None;
    data.simple_profile.validate_and_clamp();

    if let Some(index) = data.settings.selected_profile_index
        && index >= data.profiles.len()
    {
        warn!(index, count = data.profiles.len(), "Selected profile index out of range, clearing selection");
        data.settings.selected_profile_index = None;
    }

    warn_duplicate_hotkeys(&data);
    data
}

fn finalize_profile(profiles: &mut Vec<Profile>, mut profile: Profile) {
    if profile.name.is_empty() {
        warn!("Dropping profile without a name");
        return;
    }
    if profiles.iter().any(|p| names_match(&p.name, &profile.name)) {
        warn!(name = %profile.name, "Dropping duplicate profile name");
        return;
    }
    profile.validate_and_clamp();
    profiles.push(profile);
}

fn apply_global(settings: &mut GlobalSettings, key: &str, value: &str) {
    let is = |name: &str| key.eq_ignore_ascii_case(name);

    if is(KEY_TOGGLE_HOTKEY) {
        settings.toggle_hotkey = parse_hotkey(key, value);
    } else if is(KEY_NEXT_PROFILE_HOTKEY) {
        settings.next_profile_hotkey = parse_hotkey(key, value);
    } else if is(KEY_PREVIOUS_PROFILE_HOTKEY) {
        settings.previous_profile_hotkey = parse_hotkey(key, value);
    } else if is(KEY_LOOP_PROFILES) {
        settings.loop_profiles = parse_flag(key, value, false);
    } else if is(KEY_START_MINIMIZED) {
        settings.start_minimized = parse_flag(key, value, false);
    } else if is(KEY_MINIMIZE_TO_TRAY) {
        settings.minimize_to_tray = parse_flag(key, value, true);
    } else if is(KEY_LAUNCH_ON_STARTUP) {
        settings.launch_on_startup = parse_flag(key, value, false);
    } else if is(KEY_SELECTED_DISPLAY) {
        settings.selected_display = usize::try_from(parse_int(key, value, 0)).unwrap_or(0);
    } else if is(KEY_APPLY_ON_LAUNCH) {
        settings.apply_profile_on_launch = parse_flag(key, value, false);
    } else if is(KEY_SELECTED_PROFILE_INDEX) {
        settings.selected_profile_index = usize::try_from(parse_int(key, value, -1)).ok();
    } else if is(KEY_ADVANCED_MODE) {
        settings.advanced_mode = parse_flag(key, value, false);
    } else {
        debug!(key = %key, "Ignoring unknown global key");
    }
}

fn apply_profile_field(profile: &mut Profile, key: &str, value: &str) {
    let is = |name: &str| key.eq_ignore_ascii_case(name);
    let defaults = Profile::default();

    if is(KEY_NAME) {
        profile.name = sanitize_name(value);
    } else if is(KEY_BRIGHTNESS) {
        let raw = parse_int(key, value, i64::from(defaults.brightness));
        profile.brightness = i32::try_from(raw).unwrap_or(defaults.brightness);
    } else if is(KEY_CONTRAST) {
        profile.contrast = parse_float(key, value, defaults.contrast);
    } else if is(KEY_GAMMA) {
        profile.gamma = parse_float(key, value, defaults.gamma);
    } else if is(KEY_HOTKEY) {
        profile.hotkey = parse_hotkey(key, value);
    } else {
        debug!(key = %key, "Ignoring unknown profile key");
    }
}

fn parse_int(key: &str, value: &str, default: i64) -> i64 {
    value.parse().unwrap_or_else(|_| {
        warn!(key = %key, value = %value, default, "Invalid integer, using default");
        default
    })
}

fn parse_float(key: &str, value: &str, default: f32) -> f32 {
    value.parse().unwrap_or_else(|_| {
        warn!(key = %key, value = %value, default, "Invalid number, using default");
        default
    })
}

fn parse_flag(key: &str, value: &str, default: bool) -> bool {
    parse_int(key, value, i64::from(default)) != 0
}

/// `0` and negative values mean unbound
fn parse_hotkey(key: &str, value: &str) -> Option<KeyCode> {
    KeyCode::try_from(parse_int(key, value, 0))
        .ok()
        .filter(|code| *code != 0)
}

/// Log every key code bound to more than one action
///
/// Duplicates are kept; the dispatcher resolves them by lookup order.
fn warn_duplicate_hotkeys(data: &ConfigData) {
    let mut owners: HashMap<KeyCode, Vec<String>> = HashMap::new();
    let globals = [
        (data.settings.toggle_hotkey, hotkey_labels::TOGGLE.to_string()),
        (data.settings.previous_profile_hotkey, hotkey_labels::PREVIOUS.to_string()),
        (data.settings.next_profile_hotkey, hotkey_labels::NEXT.to_string()),
    ];
    let profiles = data
        .profiles
        .iter()
        .map(|p| (p.hotkey, format!("{}{}", hotkey_labels::PROFILE_PREFIX, p.name)));

    for (code, owner) in globals.into_iter().chain(profiles) {
        if let Some(code) = code {
            owners.entry(code).or_default().push(owner);
        }
    }

    for (code, owners) in owners.iter().filter(|(_, o)| o.len() > 1) {
        warn!(code, owners = ?owners, "Hotkey bound more than once, first binding wins");
    }
}

fn flag(value: bool) -> u8 {
    u8::from(value)
}

/// Serialize config data in the on-disk layout
pub fn render(data: &ConfigData) -> String {
    let s = &data.settings;
    let mut out = String::from(FILE_HEADER);
    let selected = s
        .selected_profile_index
        .map_or(-1, |i| i64::try_from(i).unwrap_or(-1));

    // Writing into a String cannot fail
    let _ = writeln!(out, "\n[{SECTION_GLOBAL_HOTKEYS}]");
    let _ = writeln!(out, "{KEY_TOGGLE_HOTKEY}={}", s.toggle_hotkey.unwrap_or(0));
    let _ = writeln!(out, "{KEY_NEXT_PROFILE_HOTKEY}={}", s.next_profile_hotkey.unwrap_or(0));
    let _ = writeln!(out, "{KEY_PREVIOUS_PROFILE_HOTKEY}={}", s.previous_profile_hotkey.unwrap_or(0));
    let _ = writeln!(out, "{KEY_LOOP_PROFILES}={}", flag(s.loop_profiles));
    let _ = writeln!(out, "{KEY_START_MINIMIZED}={}", flag(s.start_minimized));
    let _ = writeln!(out, "{KEY_MINIMIZE_TO_TRAY}={}", flag(s.minimize_to_tray));
    let _ = writeln!(out, "{KEY_LAUNCH_ON_STARTUP}={}", flag(s.launch_on_startup));
    let _ = writeln!(out, "{KEY_SELECTED_DISPLAY}={}", s.selected_display);
    let _ = writeln!(out, "{KEY_APPLY_ON_LAUNCH}={}", flag(s.apply_profile_on_launch));
    let _ = writeln!(out, "{KEY_SELECTED_PROFILE_INDEX}={selected}");
    let _ = writeln!(out, "{KEY_ADVANCED_MODE}={}", flag(s.advanced_mode));

    let simple = &data.simple_profile;
    let _ = writeln!(out, "\n[{SECTION_SIMPLE_PROFILE}]");
    let _ = writeln!(out, "{KEY_BRIGHTNESS}={}", simple.brightness);
    let _ = writeln!(out, "{KEY_CONTRAST}={}", simple.contrast);
    let _ = writeln!(out, "{KEY_GAMMA}={}", simple.gamma);

    for profile in &data.profiles {
        let _ = writeln!(out, "\n[{SECTION_PROFILE}]");
        let _ = writeln!(out, "{KEY_NAME}={}", sanitize_name(&profile.name));
        let _ = writeln!(out, "{KEY_BRIGHTNESS}={}", profile.brightness);
        let _ = writeln!(out, "{KEY_CONTRAST}={}", profile.contrast);
        let _ = writeln!(out, "{KEY_GAMMA}={}", profile.gamma);
        let _ = writeln!(out, "{KEY_HOTKEY}={}", profile.hotkey.unwrap_or(0));
    }

    out
}

/// Owns the config file location and serializes access to it
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// `<exe dir>/<exe stem>.ini`
    pub fn beside_executable() -> Result<Self> {
        let exe = std::env::current_exe().context("Failed to locate running executable")?;
        Ok(Self::new(exe.with_extension(EXTENSION)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Staging file written before the live file is replaced
    pub fn temp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(TEMP_SUFFIX);
        PathBuf::from(name)
    }

    /// Read and parse the live file
    ///
    /// Returns `None` when the file is missing or unreadable, which callers
    /// treat as a first run.
    pub fn load(&self) -> Option<ConfigData> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Hand-edited files may carry non-UTF-8 names; keep the rest of the file
        match fs::read(&self.path) {
            Ok(bytes) => {
                let data = parse(&String::from_utf8_lossy(&bytes));
                info!(path = %self.path.display(), profiles = data.profiles.len(), "Loaded config");
                Some(data)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No config file found, using defaults");
                None
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to read config, using defaults");
                None
            }
        }
    }

    /// Write to the staging file, then swap it over the live file
    ///
    /// On failure the live file keeps its previous contents and the staging
    /// file stays on disk.
    pub fn save(&self, data: &ConfigData) -> Result<(), SaveError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let temp = self.temp_path();

        self.write_temp(&temp, &render(data))
            .map_err(|source| SaveError::WriteTemp {
                path: temp.clone(),
                source,
            })?;

        fs::rename(&temp, &self.path).map_err(|source| SaveError::Replace {
            temp: temp.clone(),
            live: self.path.clone(),
            source,
        })?;

        debug!(path = %self.path.display(), profiles = data.profiles.len(), "Saved config");
        Ok(())
    }

    fn write_temp(&self, temp: &Path, contents: &str) -> std::io::Result<()> {
        if let Some(parent) = temp.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(temp)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::profile::{BRIGHTNESS_MAX, FALLBACK_NAME, GAMMA_DEFAULT};

    fn sample_data() -> ConfigData {
        ConfigData {
            settings: GlobalSettings {
                toggle_hotkey: Some(120),
                next_profile_hotkey: Some(121),
                previous_profile_hotkey: None,
                loop_profiles: true,
                start_minimized: true,
                minimize_to_tray: false,
                launch_on_startup: false,
                selected_display: 1,
                apply_profile_on_launch: true,
                selected_profile_index: Some(1),
                advanced_mode: true,
            },
            simple_profile: Profile::new("", 10, 1.2, 0.9),
            profiles: vec![
                Profile::new("Day", 0, 1.0, 1.0),
                Profile::new("Night", -30, 0.8, 1.4).with_hotkey(97),
                Profile::new("Gaming", 25, 1.35, 2.2),
            ],
        }
    }

    #[test]
    fn test_render_parse_round_trip() {
        let data = sample_data();
        let parsed = parse(&render(&data));
        assert_eq!(parsed, data);
    }

    #[test]
    fn test_render_parse_round_trip_sanitizes_names() {
        let data = ConfigData {
            profiles: vec![
                Profile::new("  a[b]=c ", 5, 1.1, 0.8).with_hotkey(33),
                Profile::new("Tab\tName", -5, 0.9, 1.3),
            ],
            ..ConfigData::default()
        };

        let parsed = parse(&render(&data));

        let names: Vec<_> = parsed.profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["a_b__c", "Tab_Name"]);
        for (before, after) in data.profiles.iter().zip(&parsed.profiles) {
            assert_eq!(before.values(), after.values());
            assert_eq!(before.hotkey, after.hotkey);
        }
    }

    #[test]
    fn test_parse_empty_gives_defaults() {
        let data = parse("");
        assert_eq!(data, ConfigData::default());
    }

    #[test]
    fn test_parse_keeps_first_of_duplicate_names() {
        let contents = "\
[Profile]
Name=Night
Brightness=-10

[Profile]
Name=NIGHT
Brightness=20

[Profile]
Name=Day
";
        let data = parse(contents);
        assert_eq!(data.profiles.len(), 2);
        assert_eq!(data.profiles[0].name, "Night");
        assert_eq!(data.profiles[0].brightness, -10);
        assert_eq!(data.profiles[1].name, "Day");
    }

    #[test]
    fn test_parse_skips_malformed_lines() {
        let contents = "\
; comment
# another comment
[GlobalHotkeys]
this line has no equals sign
LoopProfiles=1
ToggleHotkey=not-a-number

[SomethingNew]
Foo=Bar

[Profile]
Name=Evening
Brightness=abc
Contrast=1.1
Gamma=zzz
Unknown=5
";
        let data = parse(contents);
        assert!(data.settings.loop_profiles);
        assert_eq!(data.settings.toggle_hotkey, None);
        assert_eq!(data.profiles.len(), 1);

        let evening = &data.profiles[0];
        assert_eq!(evening.name, "Evening");
        assert_eq!(evening.brightness, 0);
        assert_eq!(evening.contrast, 1.1);
        assert_eq!(evening.gamma, GAMMA_DEFAULT);
    }

    #[test]
    fn test_parse_sections_and_keys_case_insensitive() {
        let contents = "[globalhotkeys]\nadvancedmode=1\n[profile]\nname=Lower\n";
        let data = parse(contents);
        assert!(data.settings.advanced_mode);
        assert_eq!(data.profiles[0].name, "Lower");
    }

    #[test]
    fn test_parse_drops_profile_without_name() {
        let data = parse("[Profile]\nBrightness=5\n[Profile]\nName=\n");
        assert_eq!(data.profiles.len(), 1);
        assert_eq!(data.profiles[0].name, FALLBACK_NAME);
    }

    #[test]
    fn test_parse_clamps_out_of_range_values() {
        let data = parse("[Profile]\nName=Hot\nBrightness=500\n");
        assert_eq!(data.profiles[0].brightness, BRIGHTNESS_MAX);
    }

    #[test]
    fn test_parse_clears_stale_selection() {
        let data = parse("[GlobalHotkeys]\nSelectedProfileIndex=4\n[Profile]\nName=Only\n");
        assert_eq!(data.settings.selected_profile_index, None);

        let data = parse("[GlobalHotkeys]\nSelectedProfileIndex=-1\n");
        assert_eq!(data.settings.selected_profile_index, None);
    }

    #[test]
    fn test_parse_keeps_duplicate_hotkeys() {
        let data = parse("[GlobalHotkeys]\nToggleHotkey=65\n[Profile]\nName=A\nHotkey=65\n");
        assert_eq!(data.settings.toggle_hotkey, Some(65));
        assert_eq!(data.profiles[0].hotkey, Some(65));
    }

    #[test]
    fn test_render_writes_none_as_sentinels() {
        let rendered = render(&ConfigData::default());
        assert!(rendered.contains("ToggleHotkey=0\n"));
        assert!(rendered.contains("SelectedProfileIndex=-1\n"));
        assert!(rendered.contains("MinimizeToTray=1\n"));
        assert!(!rendered.contains("[Profile]"));
    }

    #[test]
    fn test_store_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("gamma-hotkey.ini"));
        let data = sample_data();

        store.save(&data).unwrap();

        assert!(!store.temp_path().exists());
        assert_eq!(store.load(), Some(data));
    }

    #[test]
    fn test_store_load_missing_file_is_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("missing.ini"));
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_store_load_tolerates_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("gamma-hotkey.ini");
        let mut contents = b"[GlobalHotkeys]\nToggleHotkey=120\n[Profile]\nName=Caf".to_vec();
        contents.push(0xE9);
        contents.extend_from_slice(b"\n[Profile]\nName=Night\nBrightness=-20\n");
        fs::write(&live, contents).unwrap();

        let store = ConfigStore::new(&live);
        let data = store.load().unwrap();

        assert_eq!(data.settings.toggle_hotkey, Some(120));
        assert_eq!(data.profiles.len(), 2);
        assert_eq!(data.profiles[0].name, "Caf\u{FFFD}");
        assert_eq!(data.profiles[1].name, "Night");

        store.save(&data).unwrap();
        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.profiles[1].name, "Night");
        assert_eq!(reloaded.profiles[1].brightness, -20);
    }

    #[test]
    fn test_store_save_failure_keeps_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory at the live path makes the final rename fail
        let live = dir.path().join("config.ini");
        fs::create_dir(&live).unwrap();
        fs::write(live.join("keep"), "x").unwrap();

        let store = ConfigStore::new(&live);
        let result = store.save(&sample_data());

        assert!(matches!(result, Err(SaveError::Replace { .. })));
        assert!(live.join("keep").exists());

        let staged = fs::read_to_string(store.temp_path()).unwrap();
        assert_eq!(parse(&staged), sample_data());
    }

    #[test]
    fn test_temp_path_appends_suffix() {
        let store = ConfigStore::new("/opt/app/gamma.ini");
        assert_eq!(store.temp_path(), PathBuf::from("/opt/app/gamma.ini.tmp"));
    }
}
