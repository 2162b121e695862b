#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Filament calibration logic (host-agnostic).
//!
//! This crate holds the filament module's behaviour. All printer interactions
//! go through `filpal_traits::Host`, `filpal_traits::ControlledHeater` and
//! `filpal_traits::HeaterControl`.
//!
//! ## Architecture
//!
//! - **Parameter store**: per-filament profiles and the loaded pointer (`store`)
//! - **Trace parsing**: traced argument series from executed gcode (`trace`)
//! - **Fitting**: commanded -> target correction curves (`fit`)
//! - **Interception**: correction layer over a heater's control (`interceptor`)
//! - **Calibration**: tuning-tower sweeps from a fixed test catalog (`calibration`)
//! - **Swap**: polled filament swap state machine (`swap`)
//! - **Dispatch**: command lines to operations (`command`, `dispatch`)
//!
//! The control tick only ever runs `CorrectedControl::temperature_update`,
//! which does arithmetic and one forwarding call. Store and file access happen
//! in command handlers.

pub mod atomic;
pub mod calibration;
pub mod command;
pub mod config;
pub mod conversions;
pub mod dispatch;
pub mod error;
pub mod fit;
pub mod inject;
pub mod interceptor;
pub mod mocks;
pub mod store;
pub mod swap;
pub mod trace;
pub mod util;

pub use crate::calibration::{CalibrateRequest, CalibrationOrchestrator, SweepSchedule};
pub use crate::command::{Command, parse_line};
pub use crate::config::{CalibrationCfg, FitCfg, Settings, SwapCfg, TraceCfg};
pub use crate::dispatch::Filpal;
pub use crate::error::{FilpalError, Result};
pub use crate::fit::{CurveFitter, FitError, FitResult, fit};
pub use crate::interceptor::{ControllerInterceptor, CorrectedControl, InterceptorBinding};
pub use crate::store::{ParamValue, ParameterStore, Profile};
pub use crate::swap::{FilamentSwap, SwapRequest, SwapState};
pub use crate::trace::{ArgumentSeries, ParseError, ParseOutcome, TraceParser};
