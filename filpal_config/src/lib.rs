#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Startup configuration for the filament calibration module.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - Paths accept a leading `~`, expanded against `$HOME`.
//!
//! A config that fails `validate()` must stop the module from initializing.
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct Paths {
    /// Filament parameter store (sectioned TOML).
    pub params_file: String,
    /// Directory holding printable gcode and calibration files.
    pub sdcard_dir: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TraceCfg {
    /// Command that opens the print body; the parse result is injected after it.
    pub print_start_marker: String,
    /// Suffix appended to line 0 of a parsed file.
    pub parsed_marker: String,
    /// Verb written in front of the injected `parse_vals=` argument.
    pub inject_command: String,
}

impl Default for TraceCfg {
    fn default() -> Self {
        Self {
            print_start_marker: "START_PRINT".to_string(),
            parsed_marker: ";PARSED".to_string(),
            inject_command: "FILPAL_INJECTOR".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FitCfg {
    /// Highest polynomial degree used when series are longer than three samples.
    pub max_degree: usize,
}

impl Default for FitCfg {
    fn default() -> Self {
        Self { max_degree: 2 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Number of sweep bands when the command does not give BANDS.
    pub default_bands: u32,
    pub extruder_heater: String,
    pub bed_heater: String,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            default_bands: 10,
            extruder_heater: "extruder".to_string(),
            bed_heater: "heater_bed".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SwapCfg {
    /// Heater used when FILPAL_SWAP omits HEATER.
    pub heater: String,
    pub prime_mm: f64,
    /// mm/min
    pub prime_speed: f64,
    pub unload_mm: f64,
    pub unload_speed: f64,
    pub load_mm: f64,
    pub load_speed: f64,
    /// Heater counts as "at temperature" within this many degrees below target.
    pub temp_tolerance: f64,
}

impl Default for SwapCfg {
    fn default() -> Self {
        Self {
            heater: "extruder".to_string(),
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

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub paths: Paths,
    /// Tracked mnemonic -> whether its values participate in correction.
    pub parse_commands: BTreeMap<String, bool>,
    /// Heater-affecting mnemonics and the heater each one drives.
    #[serde(default)]
    pub heater_commands: BTreeMap<String, String>,
    #[serde(default)]
    pub trace: TraceCfg,
    #[serde(default)]
    pub fit: FitCfg,
    #[serde(default)]
    pub calibration: CalibrationCfg,
    #[serde(default)]
    pub swap: SwapCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Expand a leading `~` against `$HOME`; other paths pass through.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~')
        && (rest.is_empty() || rest.starts_with('/'))
        && let Some(home) = std::env::var_os("HOME")
    {
        let mut p = PathBuf::from(home);
        let rest = rest.trim_start_matches('/');
        if !rest.is_empty() {
            p.push(rest);
        }
        return p;
    }
    PathBuf::from(path)
}

fn is_command_name(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

impl Config {
    pub fn params_path(&self) -> PathBuf {
        expand_home(&self.paths.params_file)
    }

    pub fn sdcard_path(&self) -> PathBuf {
        expand_home(&self.paths.sdcard_dir)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Paths
        if self.paths.params_file.trim().is_empty() {
            eyre::bail!("paths.params_file must not be empty");
        }
        if self.paths.sdcard_dir.trim().is_empty() {
            eyre::bail!("paths.sdcard_dir must not be empty");
        }

        // Tracked commands
        if self.parse_commands.is_empty() {
            eyre::bail!("parse_commands must name at least one command");
        }
        for name in self.parse_commands.keys() {
            if !is_command_name(name) {
                eyre::bail!("parse_commands key '{name}' must be an upper-case command name");
            }
        }
        for (name, heater) in &self.heater_commands {
            if !self.parse_commands.contains_key(name) {
                eyre::bail!("heater_commands.{name} is not listed in parse_commands");
            }
            if heater.trim().is_empty() {
                eyre::bail!("heater_commands.{name} must name a heater");
            }
        }

        // Trace markers
        if !is_command_name(&self.trace.print_start_marker) {
            eyre::bail!("trace.print_start_marker must be an upper-case command name");
        }
        if self.trace.parsed_marker.trim().is_empty() {
            eyre::bail!("trace.parsed_marker must not be empty");
        }
        if !is_command_name(&self.trace.inject_command) {
            eyre::bail!("trace.inject_command must be an upper-case command name");
        }

        // Fit
        if self.fit.max_degree > 2 {
            eyre::bail!("fit.max_degree must be in [0, 2]");
        }

        // Calibration
        if self.calibration.default_bands == 0 {
            eyre::bail!("calibration.default_bands must be >= 1");
        }

        // Swap
        let swap = &self.swap;
        for (key, v) in [
            ("prime_mm", swap.prime_mm),
            ("unload_mm", swap.unload_mm),
            ("load_mm", swap.load_mm),
        ] {
            if !v.is_finite() || v < 0.0 {
                eyre::bail!("swap.{key} must be >= 0");
            }
        }
        for (key, v) in [
            ("prime_speed", swap.prime_speed),
            ("unload_speed", swap.unload_speed),
            ("load_speed", swap.load_speed),
        ] {
            if !v.is_finite() || v <= 0.0 {
                eyre::bail!("swap.{key} must be > 0");
            }
        }
        if !swap.temp_tolerance.is_finite() || swap.temp_tolerance < 0.0 {
            eyre::bail!("swap.temp_tolerance must be >= 0");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
