//! X11 displays through the RandR extension
//!
//! Each RandR output driving a CRTC is one display. Ramps are resampled to
//! the CRTC's gamma size, which is 256 on most drivers but not all.

use anyhow::{Context, Result};
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::randr::{self, ConnectionExt as RandrExt};
use x11rb::rust_connection::RustConnection;

use super::DisplayBackend;
use crate::error::GammaError;
use crate::gamma::GammaRamp;
use crate::types::DisplayEntry;

pub struct RandrDisplays;

/// Connected output with an assigned CRTC
struct ActiveOutput {
    name: String,
    crtc: randr::Crtc,
    width: u16,
    height: u16,
}

fn connect() -> Result<RustConnection> {
    let (conn, _screen) = x11rb::connect(None).context("Failed to connect to X11 server")?;
    Ok(conn)
}

fn active_outputs(conn: &RustConnection) -> Result<Vec<ActiveOutput>> {
    let root = conn
        .setup()
        .roots
        .first()
        .context("X11 server reported no screens")?
        .root;

    let resources = conn
        .randr_get_screen_resources_current(root)
        .context("Failed to query RandR screen resources")?
        .reply()
        .context("Failed to get reply for RandR screen resources")?;

    let mut outputs = Vec::new();
    for output in resources.outputs {
        let info = conn
            .randr_get_output_info(output, resources.config_timestamp)
            .context("Failed to query RandR output")?
            .reply()
            .context("Failed to get reply for RandR output")?;

        if info.connection != randr::Connection::CONNECTED || info.crtc == x11rb::NONE {
            continue;
        }

        let crtc = conn
            .randr_get_crtc_info(info.crtc, resources.config_timestamp)
            .context("Failed to query RandR CRTC")?
            .reply()
            .context("Failed to get reply for RandR CRTC")?;

        outputs.push(ActiveOutput {
            name: String::from_utf8_lossy(&info.name).into_owned(),
            crtc: info.crtc,
            width: crtc.width,
            height: crtc.height,
        });
    }

    Ok(outputs)
}

/// Linearly interpolate a 256-entry channel onto `size` entries
fn resample(channel: &[u16], size: usize) -> Vec<u16> {
    if size == channel.len() {
        return channel.to_vec();
    }
    if size <= 1 || channel.is_empty() {
        return channel.iter().take(size).copied().collect();
    }

    let last = (channel.len() - 1) as f32;
    (0..size)
        .map(|i| {
            let pos = i as f32 * last / (size - 1) as f32;
            let lo = pos.floor() as usize;
            let hi = (lo + 1).min(channel.len() - 1);
            let frac = pos - lo as f32;
            let value = f32::from(channel[lo]) * (1.0 - frac) + f32::from(channel[hi]) * frac;
            value.round() as u16
        })
        .collect()
}

impl DisplayBackend for RandrDisplays {
    fn enumerate(&self) -> Result<Vec<DisplayEntry>> {
        let conn = connect()?;
        Ok(active_outputs(&conn)?
            .into_iter()
            .map(|o| DisplayEntry {
                friendly_name: format!("{} ({}x{})", o.name, o.width, o.height),
                device_name: o.name,
            })
            .collect())
    }

    fn set_gamma_ramp(&self, entry: &DisplayEntry, ramp: &GammaRamp) -> Result<(), GammaError> {
        let open_failed = |e: anyhow::Error| {
            debug!(device = %entry.device_name, error = %e, "Failed to open display");
            GammaError::OpenDevice(entry.device_name.clone())
        };

        let conn = connect().map_err(open_failed)?;
        let output = active_outputs(&conn)
            .map_err(open_failed)?
            .into_iter()
            .find(|o| o.name == entry.device_name)
            .ok_or_else(|| GammaError::UnknownDisplay(entry.device_name.clone()))?;

        let rejected = |e: &dyn std::fmt::Display| {
            debug!(device = %entry.device_name, error = %e, "Gamma ramp not accepted");
            GammaError::Rejected(entry.device_name.clone())
        };

        let size = conn
            .randr_get_crtc_gamma_size(output.crtc)
            .map_err(|e| rejected(&e))?
            .reply()
            .map_err(|e| rejected(&e))?
            .size;
        let size = usize::from(size);

        conn.randr_set_crtc_gamma(
            output.crtc,
            &resample(&ramp.red, size),
            &resample(&ramp.green, size),
            &resample(&ramp.blue, size),
        )
        .map_err(|e| rejected(&e))?
        .check()
        .map_err(|e| rejected(&e))?;

        Ok(())
    }
}
