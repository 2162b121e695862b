//! Seams between the filament calibration logic and the printer host.
//!
//! Nothing here depends on a concrete heater or gcode runtime; `filpal_core`
//! is written against these traits and `filpal_heater` provides real devices.

pub mod control;
pub mod host;

pub use control::{ControlSwap, ControlledHeater, HeaterControl};
pub use host::Host;

/// Error type crossing trait boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
