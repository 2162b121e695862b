//! Simulated printer host for `filpal exec`.

use std::path::PathBuf;

use eyre::{Result, WrapErr};
use filpal_core::Settings;
use filpal_heater::{HeaterRegistry, SimulatedHotend};
use filpal_traits::{BoxError, ControlledHeater, Host};
use serde_json::json;

/// Seconds of simulated time per heater tick.
pub const SIM_STEP_S: f64 = 0.3;

pub struct SimHost {
    heaters: HeaterRegistry<SimulatedHotend>,
    sdcard_dir: PathBuf,
    json: bool,
}

impl SimHost {
    /// One simulated heater for every heater name the settings mention.
    pub fn from_settings(settings: &Settings, json: bool) -> Result<Self> {
        let mut names: Vec<&str> = vec![
            settings.swap.heater.as_str(),
            settings.calibration.extruder_heater.as_str(),
            settings.calibration.bed_heater.as_str(),
        ];
        names.extend(settings.heater_commands.values().map(String::as_str));
        names.sort_unstable();
        names.dedup();

        let mut heaters = HeaterRegistry::new();
        for name in names {
            let sim = filpal_heater::simulated(name)
                .wrap_err_with(|| format!("create simulated heater {name}"))?;
            heaters.register(sim)?;
        }
        Ok(Self {
            heaters,
            sdcard_dir: settings.sdcard_dir.clone(),
            json,
        })
    }

    pub fn heaters(&self) -> &HeaterRegistry<SimulatedHotend> {
        &self.heaters
    }

    /// Advance every heater by one step.
    pub fn tick(&mut self) {
        for h in self.heaters.iter_mut() {
            h.advance(SIM_STEP_S);
        }
    }

    fn emit(&self, event: &str, text: &str) {
        if self.json {
            println!("{}", json!({ "event": event, "text": text }));
        } else if event == "script" {
            println!("> {text}");
        } else {
            println!("// {text}");
        }
    }

    fn set_heater_temperature(&mut self, script: &str) -> std::result::Result<(), BoxError> {
        let mut heater = None;
        let mut target = 0.0;
        for word in script.split_whitespace().skip(1) {
            if let Some(h) = word.strip_prefix("HEATER=") {
                heater = Some(h);
            } else if let Some(t) = word.strip_prefix("TARGET=") {
                target = t.parse::<f64>().map_err(|e| format!("bad TARGET '{t}': {e}"))?;
            }
        }
        let name = heater.ok_or("SET_HEATER_TEMPERATURE needs HEATER")?;
        self.heaters.require_mut(name)?.heater_mut().set_target(target)?;
        Ok(())
    }
}

impl Host for SimHost {
    fn run_script(&mut self, script: &str) -> std::result::Result<(), BoxError> {
        self.emit("script", script);
        if script.starts_with("SET_HEATER_TEMPERATURE ") {
            self.set_heater_temperature(script)?;
        }
        Ok(())
    }

    fn respond_info(&mut self, msg: &str) {
        self.emit("respond", msg);
    }

    fn list_files(&mut self) -> std::result::Result<Vec<String>, BoxError> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.sdcard_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        files.sort();
        Ok(files)
    }

    fn heater(&mut self, name: &str) -> Option<&mut dyn ControlledHeater> {
        self.heaters.lookup(name)
    }
}
