//! GDI displays: `EnumDisplayDevicesW` + `SetDeviceGammaRamp`

use anyhow::Result;
use tracing::debug;
use windows::Win32::Graphics::Gdi::{
    CreateDCW, DISPLAY_DEVICE_ACTIVE, DISPLAY_DEVICEW, DeleteDC, EnumDisplayDevicesW,
};
use windows::Win32::UI::ColorSystem::SetDeviceGammaRamp;
use windows::core::PCWSTR;

use super::DisplayBackend;
use crate::error::GammaError;
use crate::gamma::GammaRamp;
use crate::types::DisplayEntry;

pub struct GdiDisplays;

fn wide_to_string(wide: &[u16]) -> String {
    let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
    String::from_utf16_lossy(&wide[..len])
}

fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn new_device() -> DISPLAY_DEVICEW {
    DISPLAY_DEVICEW {
        cb: std::mem::size_of::<DISPLAY_DEVICEW>() as u32,
        ..Default::default()
    }
}

/// Monitor description attached to an adapter output, if any
fn monitor_name(adapter: &DISPLAY_DEVICEW) -> Option<String> {
    let mut monitor = new_device();
    let found = unsafe {
        EnumDisplayDevicesW(PCWSTR(adapter.DeviceName.as_ptr()), 0, &mut monitor, 0).as_bool()
    };
    found.then(|| wide_to_string(&monitor.DeviceString))
}

impl DisplayBackend for GdiDisplays {
    fn enumerate(&self) -> Result<Vec<DisplayEntry>> {
        let mut displays = Vec::new();
        let mut index = 0u32;

        loop {
            let mut adapter = new_device();
            if !unsafe { EnumDisplayDevicesW(PCWSTR::null(), index, &mut adapter, 0).as_bool() } {
                break;
            }
            index += 1;

            if adapter.StateFlags.0 & DISPLAY_DEVICE_ACTIVE.0 == 0 {
                continue;
            }

            let device_name = wide_to_string(&adapter.DeviceName);
            let label = monitor_name(&adapter).unwrap_or_else(|| wide_to_string(&adapter.DeviceString));
            displays.push(DisplayEntry {
                friendly_name: format!("Display {}: {label}", displays.len() + 1),
                device_name,
            });
        }

        Ok(displays)
    }

    fn set_gamma_ramp(&self, entry: &DisplayEntry, ramp: &GammaRamp) -> Result<(), GammaError> {
        let name = to_wide(&entry.device_name);
        let hdc = unsafe { CreateDCW(PCWSTR::null(), PCWSTR(name.as_ptr()), PCWSTR::null(), None) };
        if hdc.is_invalid() {
            return Err(GammaError::OpenDevice(entry.device_name.clone()));
        }

        // GDI expects red, green, blue laid out back to back
        let table: [[u16; 256]; 3] = [ramp.red, ramp.green, ramp.blue];
        let accepted = unsafe { SetDeviceGammaRamp(hdc, table.as_ptr().cast()).as_bool() };

        if !unsafe { DeleteDC(hdc).as_bool() } {
            debug!(device = %entry.device_name, "DeleteDC failed");
        }

        if accepted {
            Ok(())
        } else {
            Err(GammaError::Rejected(entry.device_name.clone()))
        }
    }
}
