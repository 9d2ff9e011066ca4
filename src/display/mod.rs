//! Display enumeration and gamma ramp output per platform

use crate::error::GammaError;
use crate::gamma::GammaRamp;
use crate::types::DisplayEntry;

#[cfg(target_os = "linux")]
mod x11;
#[cfg(windows)]
mod gdi;

/// Platform access to attached displays
///
/// Implementations open a handle per call and release it before returning.
pub trait DisplayBackend: Send {
    /// Attached displays in a stable order
    fn enumerate(&self) -> anyhow::Result<Vec<DisplayEntry>>;

    fn set_gamma_ramp(&self, display: &DisplayEntry, ramp: &GammaRamp) -> Result<(), GammaError>;
}

/// Backend for the platform this binary was built for
#[cfg(target_os = "linux")]
pub fn platform_backend() -> Box<dyn DisplayBackend> {
    Box::new(x11::RandrDisplays)
}

#[cfg(windows)]
pub fn platform_backend() -> Box<dyn DisplayBackend> {
    Box::new(gdi::GdiDisplays)
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Recorded {
        writes: Vec<(String, GammaRamp)>,
        reject: bool,
    }

    /// In-memory backend that records every ramp written
    #[derive(Clone)]
    pub struct RecordingDisplay {
        displays: Vec<DisplayEntry>,
        recorded: Arc<Mutex<Recorded>>,
    }

    impl RecordingDisplay {
        /// `DISPLAY1` .. `DISPLAYn`
        pub fn with_displays(count: usize) -> Self {
            let displays = (1..=count)
                .map(|n| DisplayEntry {
                    device_name: format!("DISPLAY{n}"),
                    friendly_name: format!("Test Monitor {n}"),
                })
                .collect();
            Self {
                displays,
                recorded: Arc::default(),
            }
        }

        pub fn writes(&self) -> Vec<(String, GammaRamp)> {
            self.recorded.lock().unwrap().writes.clone()
        }

        /// Make subsequent writes fail as if the driver refused them
        pub fn set_reject(&self, reject: bool) {
            self.recorded.lock().unwrap().reject = reject;
        }
    }

    impl DisplayBackend for RecordingDisplay {
        fn enumerate(&self) -> anyhow::Result<Vec<DisplayEntry>> {
            Ok(self.displays.clone())
        }

        fn set_gamma_ramp(&self, display: &DisplayEntry, ramp: &GammaRamp) -> Result<(), GammaError> {
            let mut recorded = self.recorded.lock().unwrap();
            if recorded.reject {
                return Err(GammaError::Rejected(display.device_name.clone()));
            }
            recorded.writes.push((display.device_name.clone(), ramp.clone()));
            Ok(())
        }
    }
}
