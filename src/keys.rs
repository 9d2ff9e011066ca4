//! Human-readable names for platform key codes

use crate::types::KeyCode;

/// Name for a hotkey code as shown in listings
#[cfg(target_os = "linux")]
pub fn key_name(code: KeyCode) -> String {
    let Ok(code) = u16::try_from(code) else {
        return format!("Key {code}");
    };
    let name = format!("{:?}", evdev::Key::new(code));
    match name.strip_prefix("KEY_").or_else(|| name.strip_prefix("BTN_")) {
        Some(short) => short.to_string(),
        None => format!("Key {code}"),
    }
}

#[cfg(windows)]
pub fn key_name(code: KeyCode) -> String {
    vk_name(code)
}

/// Virtual-key code names
#[cfg(any(windows, test))]
fn vk_name(vk: KeyCode) -> String {
    let named = match vk {
        0x08 => "Backspace",
        0x09 => "Tab",
        0x0D => "Enter",
        0x13 => "Pause",
        0x14 => "Caps Lock",
        0x1B => "Esc",
        0x20 => "Space",
        0x21 => "Page Up",
        0x22 => "Page Down",
        0x23 => "End",
        0x24 => "Home",
        0x25 => "Left",
        0x26 => "Up",
        0x27 => "Right",
        0x28 => "Down",
        0x2C => "Print Screen",
        0x2D => "Insert",
        0x2E => "Delete",
        0x5B => "Left Win",
        0x5C => "Right Win",
        0x6A => "Num *",
        0x6B => "Num +",
        0x6D => "Num -",
        0x6E => "Num .",
        0x6F => "Num /",
        0x90 => "Num Lock",
        0x91 => "Scroll Lock",
        0xAD => "Volume Mute",
        0xAE => "Volume Down",
        0xAF => "Volume Up",
        0xB0 => "Next Track",
        0xB1 => "Previous Track",
        0xB3 => "Play/Pause",
        0xBA => ";",
        0xBB => "=",
        0xBC => ",",
        0xBD => "-",
        0xBE => ".",
        0xBF => "/",
        0xC0 => "`",
        0xDB => "[",
        0xDC => "\\",
        0xDD => "]",
        0xDE => "'",
        _ => "",
    };
    if !named.is_empty() {
        return named.to_string();
    }

    match vk {
        // 0-9 and A-Z share their ASCII codes
        0x30..=0x39 | 0x41..=0x5A => char::from_u32(vk).map_or_else(String::new, String::from),
        0x60..=0x69 => format!("Num {}", vk - 0x60),
        0x70..=0x87 => format!("F{}", vk - 0x70 + 1),
        _ => format!("Key 0x{vk:02X}"),
    }
}
