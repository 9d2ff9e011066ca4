//! One running copy per executable path
//!
//! A copy of the binary at another path, or under another name, may run
//! alongside; launching the same file twice is refused.

use anyhow::{Result, bail};
use std::path::Path;
use tracing::warn;
use windows::Win32::Foundation::{CloseHandle, ERROR_ALREADY_EXISTS, GetLastError, HANDLE};
use windows::Win32::System::Threading::CreateMutexW;
use windows::core::PCWSTR;

use crate::constants::app;

/// Holds the named mutex until dropped
pub struct InstanceGuard(HANDLE);

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        let _ = unsafe { CloseHandle(self.0) };
    }
}

/// Mutex names may not contain path separators or drive colons
fn mutex_name(exe: &Path) -> String {
    format!("GammaHotkey_{}", exe.display()).replace(['\\', '/', ':'], "_")
}

/// Claim the instance mutex for this executable
///
/// Fails only when another instance holds it. If the mutex cannot be
/// created at all the launch goes ahead without a guard.
pub fn acquire() -> Result<Option<InstanceGuard>> {
    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            warn!(error = %e, "Cannot resolve executable path, skipping single-instance check");
            return Ok(None);
        }
    };

    let name: Vec<u16> = mutex_name(&exe)
        .encode_utf16()
        .chain(std::iter::once(0))
        .collect();
    let handle = match unsafe { CreateMutexW(None, false, PCWSTR(name.as_ptr())) } {
        Ok(handle) => handle,
        Err(e) => {
            warn!(error = %e, "Failed to create instance mutex, skipping single-instance check");
            return Ok(None);
        }
    };

    if unsafe { GetLastError() } == ERROR_ALREADY_EXISTS {
        let _ = unsafe { CloseHandle(handle) };
        bail!("{} is already running from {}", app::DISPLAY_NAME, exe.display());
    }

    Ok(Some(InstanceGuard(handle)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutex_name_strips_separators() {
        let name = mutex_name(Path::new(r"C:\Tools\gamma-hotkey.exe"));
        assert_eq!(name, "GammaHotkey_C__Tools_gamma-hotkey.exe");
    }
}
