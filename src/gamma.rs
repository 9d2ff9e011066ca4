//! Ramp computation and hardware application

use tracing::{debug, info, warn};

use crate::constants::ramp;
use crate::display::DisplayBackend;
use crate::types::{DisplayEntry, Profile};

/// 256-entry 16-bit lookup table per channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GammaRamp {
    pub red: [u16; ramp::SIZE],
    pub green: [u16; ramp::SIZE],
    pub blue: [u16; ramp::SIZE],
}

impl GammaRamp {
    fn uniform(channel: [u16; ramp::SIZE]) -> Self {
        Self {
            red: channel,
            green: channel,
            blue: channel,
        }
    }

    /// Linear ramp: `i * 257`
    pub fn identity() -> Self {
        let mut channel = [0u16; ramp::SIZE];
        for (i, value) in (0u16..).zip(channel.iter_mut()) {
            *value = i * ramp::IDENTITY_STEP;
        }
        Self::uniform(channel)
    }
}

/// Normalized output curve, kept for preview and diagnostics
pub type Curve = [f32; ramp::SIZE];

pub fn identity_curve() -> Curve {
    let mut curve = [0f32; ramp::SIZE];
    for (i, v) in curve.iter_mut().enumerate() {
        *v = i as f32 / (ramp::SIZE - 1) as f32;
    }
    curve
}

/// Compute the ramp for a profile
///
/// Steps per entry: normalize, offset by brightness, scale around the
/// midpoint by contrast, clamp, then apply the inverse gamma power.
pub fn build_ramp(profile: &Profile) -> (GammaRamp, Curve) {
    let mut channel = [0u16; ramp::SIZE];
    let mut curve = [0f32; ramp::SIZE];
    let offset = profile.brightness as f32 / ramp::BRIGHTNESS_DIVISOR;
    let exponent = 1.0 / profile.gamma;

    for i in 0..ramp::SIZE {
        let mut v = i as f32 / (ramp::SIZE - 1) as f32;
        v += offset;
        v = (v - 0.5) * profile.contrast + 0.5;
        v = v.clamp(0.0, 1.0);
        v = v.powf(exponent);

        curve[i] = v;
        channel[i] = (v * ramp::MAX).round() as u16;
    }

    (GammaRamp::uniform(channel), curve)
}

/// Applies ramps to the enumerated displays through a platform backend
pub struct GammaEngine {
    backend: Box<dyn DisplayBackend>,
    displays: Vec<DisplayEntry>,
    last_curve: Curve,
    apply_failed: bool,
}

impl GammaEngine {
    pub fn new(backend: Box<dyn DisplayBackend>) -> Self {
        let mut engine = Self {
            backend,
            displays: Vec::new(),
            last_curve: identity_curve(),
            apply_failed: false,
        };
        engine.refresh_displays();
        engine
    }

    /// Re-query the backend for attached displays
    pub fn refresh_displays(&mut self) {
        match self.backend.enumerate() {
            Ok(displays) => {
                info!(count = displays.len(), "Enumerated displays");
                for (index, entry) in displays.iter().enumerate() {
                    debug!(index, device = %entry.device_name, label = %entry.friendly_name, "Display");
                }
                self.displays = displays;
            }
            Err(e) => {
                warn!(error = %e, "Failed to enumerate displays");
                self.displays.clear();
            }
        }
    }

    pub fn displays(&self) -> &[DisplayEntry] {
        &self.displays
    }

    /// Last ramp write was rejected by the driver
    pub fn apply_failed(&self) -> bool {
        self.apply_failed
    }

    pub fn curve(&self) -> &Curve {
        &self.last_curve
    }

    /// Build the ramp for `profile` and push it to display `index`
    ///
    /// Out-of-range indices are ignored. A display that cannot be opened
    /// leaves the failure flag untouched; a rejected ramp sets it.
    pub fn apply_profile(&mut self, profile: &Profile, index: usize) {
        let Some(entry) = self.displays.get(index) else {
            debug!(index, count = self.displays.len(), "Ignoring apply to unknown display");
            return;
        };

        let (ramp, curve) = build_ramp(profile);
        self.last_curve = curve;

        match self.backend.set_gamma_ramp(entry, &ramp) {
            Ok(()) => {
                debug!(device = %entry.device_name, brightness = profile.brightness, contrast = profile.contrast, gamma = profile.gamma, "Applied gamma ramp");
                self.apply_failed = false;
            }
            Err(crate::error::GammaError::Rejected(name)) => {
                warn!(device = %name, "Driver rejected gamma ramp, values may be too extreme");
                self.apply_failed = true;
            }
            Err(e) => {
                warn!(error = %e, "Failed to apply gamma ramp");
            }
        }
    }

    /// Restore the linear ramp on display `index`
    pub fn reset_display(&mut self, index: usize) {
        let Some(entry) = self.displays.get(index) else {
            debug!(index, "Ignoring reset of unknown display");
            return;
        };

        self.last_curve = identity_curve();
        match self.backend.set_gamma_ramp(entry, &GammaRamp::identity()) {
            Ok(()) => debug!(device = %entry.device_name, "Reset gamma ramp"),
            Err(e) => warn!(error = %e, "Failed to reset gamma ramp"),
        }
    }
}
