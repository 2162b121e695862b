//! Runtime configuration for the filament commands.
//!
//! These are the structs the command handlers read. They are separate from the
//! TOML-deserialized config in `filpal_config`; see `conversions` for the
//! mapping.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Trace scanning and annotation.
#[derive(Debug, Clone)]
pub struct TraceCfg {
    /// Command that opens the print body. Default: `START_PRINT`.
    pub print_start_marker: String,
    /// Suffix written onto line 0 once a file has been parsed. Default: `;PARSED`.
    pub parsed_marker: String,
    /// Verb of the injected parse-result line. Default: `FILPAL_INJECTOR`.
    pub inject_command: String,
}

impl Default for TraceCfg {
    fn default() -> Self {
        Self {
            print_start_marker: "START_PRINT".into(),
            parsed_marker: ";PARSED".into(),
            inject_command: "FILPAL_INJECTOR".into(),
        }
    }
}

/// Curve fitting.
#[derive(Debug, Clone)]
pub struct FitCfg {
    /// Highest degree for equal-length series longer than three. Range: 0..=2.
    pub max_degree: usize,
}

impl Default for FitCfg {
    fn default() -> Self {
        Self { max_degree: 2 }
    }
}

/// Calibration prints.
#[derive(Debug, Clone)]
pub struct CalibrationCfg {
    /// Sweep bands when FILPAL_CALIBRATE has no BANDS.
    pub default_bands: u32,
    pub extruder_heater: String,
    pub bed_heater: String,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            default_bands: 10,
            extruder_heater: "extruder".into(),
            bed_heater: "heater_bed".into(),
        }
    }
}

/// Filament swap moves. Lengths in mm, speeds in mm/min.
#[derive(Debug, Clone)]
pub struct SwapCfg {
    pub heater: String,
    pub prime_mm: f64,
    pub prime_speed: f64,
    pub unload_mm: f64,
    pub unload_speed: f64,
    pub load_mm: f64,
    pub load_speed: f64,
    /// The heater is "at temperature" once `current >= target - temp_tolerance`.
    pub temp_tolerance: f64,
}

impl Default for SwapCfg {
    fn default() -> Self {
        Self {
            heater: "extruder".into(),
            prime_mm: 1.0,
            prime_speed: 100.0,
            unload_mm: 500.0,
            unload_speed: 1000.0,
            load_mm: 500.0,
            load_speed: 100.0,
            temp_tolerance: 2.0,
        }
    }
}

/// Everything the dispatcher needs, with paths already expanded.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub params_file: PathBuf,
    pub sdcard_dir: PathBuf,
    /// Tracked mnemonic -> participates in correction.
    pub parse_commands: BTreeMap<String, bool>,
    /// Heater-affecting mnemonic -> heater name.
    pub heater_commands: BTreeMap<String, String>,
    pub trace: TraceCfg,
    pub fit: FitCfg,
    pub calibration: CalibrationCfg,
    pub swap: SwapCfg,
}
