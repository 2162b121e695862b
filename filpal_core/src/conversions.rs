//! `From` implementations bridging `filpal_config` types to `filpal_core` types.

use crate::config::{CalibrationCfg, FitCfg, Settings, SwapCfg, TraceCfg};

// ── TraceCfg ─────────────────────────────────────────────────────────────────

impl From<&filpal_config::TraceCfg> for TraceCfg {
    fn from(c: &filpal_config::TraceCfg) -> Self {
        Self {
            print_start_marker: c.print_start_marker.clone(),
            parsed_marker: c.parsed_marker.clone(),
            inject_command: c.inject_command.clone(),
        }
    }
}

// ── FitCfg ───────────────────────────────────────────────────────────────────

impl From<&filpal_config::FitCfg> for FitCfg {
    fn from(c: &filpal_config::FitCfg) -> Self {
        Self {
            max_degree: c.max_degree,
        }
    }
}

// ── CalibrationCfg ───────────────────────────────────────────────────────────

impl From<&filpal_config::CalibrationCfg> for CalibrationCfg {
    fn from(c: &filpal_config::CalibrationCfg) -> Self {
        Self {
            default_bands: c.default_bands,
            extruder_heater: c.extruder_heater.clone(),
            bed_heater: c.bed_heater.clone(),
        }
    }
}

// ── SwapCfg ──────────────────────────────────────────────────────────────────

impl From<&filpal_config::SwapCfg> for SwapCfg {
    fn from(c: &filpal_config::SwapCfg) -> Self {
        Self {
            heater: c.heater.clone(),
            prime_mm: c.prime_mm,
            prime_speed: c.prime_speed,
            unload_mm: c.unload_mm,
            unload_speed: c.unload_speed,
            load_mm: c.load_mm,
            load_speed: c.load_speed,
            temp_tolerance: c.temp_tolerance,
        }
    }
}

// ── Settings ─────────────────────────────────────────────────────────────────

impl From<&filpal_config::Config> for Settings {
    fn from(c: &filpal_config::Config) -> Self {
        Self {
            params_file: c.params_path(),
            sdcard_dir: c.sdcard_path(),
            parse_commands: c.parse_commands.clone(),
            heater_commands: c.heater_commands.clone(),
            trace: (&c.trace).into(),
            fit: (&c.fit).into(),
            calibration: (&c.calibration).into(),
            swap: (&c.swap).into(),
        }
    }
}
