//! Calibration prints.
//!
//! Each catalog test sweeps one parameter linearly across the height of a
//! tuning tower. The orchestrator picks the calibration file, works out the
//! sweep from the requested or profile bounds and starts the print; the
//! operator records the result afterwards with FILPAL_UPDATER.

use crate::config::CalibrationCfg;
use crate::error::{FilpalError, Result};
use crate::store::{ParamValue, Profile};
use crate::util::gcode_num;
use filpal_traits::Host;

/// Height of one sweep band in mm.
pub const BAND_HEIGHT_MM: f64 = 10.0;

/// What a tuning tower adjusts while a test prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepTarget {
    ExtruderTemp,
    BedTemp,
    ZOffset,
    Flowrate,
    FanSpeed,
    Retraction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestSpec {
    pub name: &'static str,
    pub target: SweepTarget,
    /// Profile keys supplying MIN / MAX when the command omits them.
    pub min_key: Option<&'static str>,
    pub max_key: Option<&'static str>,
    /// Parameter the operator should record once the print is done.
    pub records: &'static str,
}

pub const CATALOG: &[TestSpec] = &[
    TestSpec {
        name: "extruder_temp",
        target: SweepTarget::ExtruderTemp,
        min_key: Some("hotend_min_temp"),
        max_key: Some("hotend_max_temp"),
        records: "hotend_current_temp",
    },
    TestSpec {
        name: "bed_temp",
        target: SweepTarget::BedTemp,
        min_key: None,
        max_key: None,
        records: "M140",
    },
    TestSpec {
        name: "z_offset",
        target: SweepTarget::ZOffset,
        min_key: None,
        max_key: None,
        records: "z_offset",
    },
    TestSpec {
        name: "flowrate",
        target: SweepTarget::Flowrate,
        min_key: None,
        max_key: None,
        records: "flowrate",
    },
    TestSpec {
        name: "fan_speed",
        target: SweepTarget::FanSpeed,
        min_key: Some("fan_min"),
        max_key: Some("fan_max"),
        records: "fan_min",
    },
    TestSpec {
        name: "retraction",
        target: SweepTarget::Retraction,
        min_key: None,
        max_key: None,
        records: "retraction",
    },
];

pub fn lookup_test(name: &str) -> Result<&'static TestSpec> {
    CATALOG
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| FilpalError::UnknownTest(name.to_string()))
}

/// Linear sweep: band `i` (from the bottom) prints at `max - i * step`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepSchedule {
    pub start: f64,
    /// Change per mm of height (negative: the tower sweeps downward).
    pub factor: f64,
    pub bands: u32,
    pub band_height: f64,
}

impl SweepSchedule {
    pub fn new(min: f64, max: f64, bands: u32) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() {
            return Err(FilpalError::InvalidArgument("MIN and MAX must be numbers".into()));
        }
        if min >= max {
            return Err(FilpalError::InvalidArgument(format!(
                "MIN ({min}) must be below MAX ({max})"
            )));
        }
        if bands == 0 {
            return Err(FilpalError::InvalidArgument("BANDS must be at least 1".into()));
        }
        let factor = -(max - min) / (f64::from(bands) * BAND_HEIGHT_MM);
        // Tuning towers sample the middle of each band; start half a band
        // above MAX so band 0 prints at MAX.
        let start = max - factor * BAND_HEIGHT_MM / 2.0;
        Ok(Self {
            start,
            factor,
            bands,
            band_height: BAND_HEIGHT_MM,
        })
    }

    /// Value printed in band `i` (0 = bottom).
    pub fn band_value(&self, i: u32) -> f64 {
        self.start + self.factor * (f64::from(i) + 0.5) * self.band_height
    }

    pub fn step(&self) -> f64 {
        -self.factor * self.band_height
    }
}

/// A fully resolved calibration request.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationPlan {
    pub test: &'static TestSpec,
    pub file: String,
    pub schedule: SweepSchedule,
}

impl CalibrationPlan {
    /// `TUNING_TOWER` line that drives the sweep.
    pub fn tower_script(&self, cfg: &CalibrationCfg) -> String {
        let (command, parameter) = match self.test.target {
            SweepTarget::ExtruderTemp => (
                format!("SET_HEATER_TEMPERATURE HEATER={}", cfg.extruder_heater),
                "TARGET",
            ),
            SweepTarget::BedTemp => (
                format!("SET_HEATER_TEMPERATURE HEATER={}", cfg.bed_heater),
                "TARGET",
            ),
            SweepTarget::ZOffset => ("SET_GCODE_OFFSET".to_string(), "Z"),
            SweepTarget::Flowrate => ("M221".to_string(), "S"),
            SweepTarget::FanSpeed => ("M106".to_string(), "S"),
            SweepTarget::Retraction => ("SET_RETRACTION".to_string(), "RETRACT_LENGTH"),
        };
        format!(
            "TUNING_TOWER COMMAND='{command}' PARAMETER={parameter} START={} FACTOR={:.6} BAND={}",
            gcode_num(self.schedule.start),
            self.schedule.factor,
            gcode_num(self.schedule.band_height),
        )
    }

    pub fn print_script(&self) -> String {
        format!("SDCARD_PRINT_FILE FILENAME={}", self.file)
    }
}

/// Requested values from FILPAL_CALIBRATE.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrateRequest {
    pub test: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub filament_type: Option<String>,
    pub bands: Option<u32>,
}

/// Prefer `<test>_<type>.gcode`, fall back to `<test>.gcode`.
pub fn resolve_file(test: &str, filament_type: Option<&str>, files: &[String]) -> Option<String> {
    let typed = filament_type.map(|t| format!("{test}_{t}.gcode"));
    let generic = format!("{test}.gcode");
    typed
        .into_iter()
        .chain(std::iter::once(generic))
        .find(|candidate| files.iter().any(|f| f.eq_ignore_ascii_case(candidate)))
}

/// `explicit`, else the profile default under `key`. Without a loaded
/// profile a needed default is `NoLoadedFilament`.
fn bound(explicit: Option<f64>, key: Option<&str>, profile: Option<&Profile>, which: &str) -> Result<f64> {
    if let Some(v) = explicit {
        return Ok(v);
    }
    let Some(k) = key else {
        return Err(FilpalError::InvalidArgument(format!("{which} is required for this test")));
    };
    let profile = profile.ok_or(FilpalError::NoLoadedFilament)?;
    profile.get(k).and_then(ParamValue::as_number).ok_or_else(|| {
        FilpalError::InvalidArgument(format!("{which} not given and the loaded filament has no {k}"))
    })
}

pub struct CalibrationOrchestrator<'a> {
    cfg: &'a CalibrationCfg,
}

impl<'a> CalibrationOrchestrator<'a> {
    pub fn new(cfg: &'a CalibrationCfg) -> Self {
        Self { cfg }
    }

    /// Resolve test, file and sweep without touching the printer.
    pub fn plan(
        &self,
        req: &CalibrateRequest,
        profile: Option<&Profile>,
        files: &[String],
    ) -> Result<CalibrationPlan> {
        let test = lookup_test(&req.test)?;
        let filament_type = req
            .filament_type
            .as_deref()
            .or_else(|| profile?.get("filament_type")?.as_text());
        let file = resolve_file(test.name, filament_type, files)
            .ok_or_else(|| FilpalError::TestNotFound(test.name.to_string()))?;
        let min = bound(req.min, test.min_key, profile, "MIN")?;
        let max = bound(req.max, test.max_key, profile, "MAX")?;
        let schedule = SweepSchedule::new(min, max, req.bands.unwrap_or(self.cfg.default_bands))?;
        Ok(CalibrationPlan {
            test,
            file,
            schedule,
        })
    }

    /// Plan, then start the tower and the print.
    pub fn run(
        &self,
        host: &mut dyn Host,
        req: &CalibrateRequest,
        profile: Option<&Profile>,
    ) -> Result<CalibrationPlan> {
        let files = host
            .list_files()
            .map_err(|e| FilpalError::Host(format!("cannot list calibration files: {e}")))?;
        let plan = self.plan(req, profile, &files)?;
        for script in [plan.tower_script(self.cfg), plan.print_script()] {
            host.run_script(&script)
                .map_err(|e| FilpalError::Host(e.to_string()))?;
        }
        tracing::info!(
            test = plan.test.name,
            file = %plan.file,
            start = plan.schedule.start,
            factor = plan.schedule.factor,
            bands = plan.schedule.bands,
            "calibration print started"
        );
        host.respond_info(&format!(
            "Once the calibration print is completed, use FILPAL_UPDATER to record the new value for {}",
            plan.test.records
        ));
        Ok(plan)
    }
}
