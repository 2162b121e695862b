#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Heater devices behind `filpal_traits::ControlledHeater`.
//!
//! [`Heater`] smooths sensor readings and forwards each tick to its active
//! control ([`ControlBangBang`] or [`ControlPid`]). [`SimulatedHotend`] feeds a
//! heater from a first-order thermal model so the whole stack can run without
//! a printer.

pub mod control;
pub mod error;
pub mod heater;
pub mod registry;
pub mod sim;

pub use control::{ControlBangBang, ControlPid, PidGains};
pub use error::HeaterError;
pub use heater::{Heater, HeaterSpec};
pub use registry::HeaterRegistry;
pub use sim::{SimulatedHotend, ThermalModel};

/// Simulated hotend or bed with PID control, sized from the heater name.
pub fn simulated(name: &str) -> error::Result<SimulatedHotend> {
    let bed = name.contains("bed");
    let (spec, gains, model) = if bed {
        (HeaterSpec::BED, PidGains::BED, ThermalModel::BED)
    } else {
        (HeaterSpec::EXTRUDER, PidGains::EXTRUDER, ThermalModel::HOTEND)
    };
    let control = ControlPid::new(gains, spec.max_power, spec.smooth_time, model.ambient)?;
    let heater = Heater::new(name, spec, Box::new(control), model.ambient)?;
    Ok(SimulatedHotend::new(heater, model))
}
