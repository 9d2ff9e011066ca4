use std::cell::RefCell;
use tracing::{debug, warn};
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, HC_ACTION, HHOOK, KBDLLHOOKSTRUCT, MSG, PM_REMOVE,
    PeekMessageW, SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, WH_KEYBOARD_LL,
    WM_KEYDOWN, WM_SYSKEYDOWN,
};

use super::{KeyDisposition, KeyHandler, KeySource};
use crate::error::HotkeyError;

thread_local! {
    // The hook proc runs on the installing thread while it pumps messages
    static HANDLER: RefCell<Option<KeyHandler>> = const { RefCell::new(None) };
}

unsafe extern "system" fn keyboard_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    let key_down = wparam.0 == WM_KEYDOWN as usize || wparam.0 == WM_SYSKEYDOWN as usize;

    if code == HC_ACTION as i32 && key_down {
        let info = unsafe { &*(lparam.0 as *const KBDLLHOOKSTRUCT) };
        let handler = HANDLER.with(|h| h.borrow().clone());

        if let Some(handler) = handler
            && handler(info.vkCode) == KeyDisposition::Consume
        {
            return LRESULT(1);
        }
    }

    unsafe { CallNextHookEx(None, code, wparam, lparam) }
}

/// `WH_KEYBOARD_LL` hook; returning non-zero keeps the key from other apps
#[derive(Default)]
pub struct LowLevelHook {
    hook: Option<HHOOK>,
}

impl KeySource for LowLevelHook {
    fn install(&mut self, handler: KeyHandler) -> Result<(), HotkeyError> {
        self.uninstall();

        let module = unsafe { GetModuleHandleW(None) }
            .map_err(|e| HotkeyError::HookInstall(format!("GetModuleHandleW: {e}")))?;

        HANDLER.with(|h| *h.borrow_mut() = Some(handler));
        let hook = unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_proc), Some(module.into()), 0) }
            .map_err(|e| {
                HANDLER.with(|h| *h.borrow_mut() = None);
                HotkeyError::HookInstall(format!("error code {}", e.code().0))
            })?;

        debug!("Installed low-level keyboard hook");
        self.hook = Some(hook);
        Ok(())
    }

    fn uninstall(&mut self) {
        if let Some(hook) = self.hook.take() {
            if let Err(e) = unsafe { UnhookWindowsHookEx(hook) } {
                warn!(error = %e, "Failed to remove keyboard hook");
            }
            HANDLER.with(|h| *h.borrow_mut() = None);
        }
    }

    fn pump(&mut self) {
        unsafe {
            let mut msg = MSG::default();
            while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }
}

impl Drop for LowLevelHook {
    fn drop(&mut self) {
        self.uninstall();
    }
}
