use filpal_traits::{ControlSwap, ControlledHeater, HeaterControl};

use crate::error::{HeaterError, Result};

/// Static limits of one heater.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaterSpec {
    pub min_temp: f64,
    pub max_temp: f64,
    /// Seconds over which readings are averaged for `smoothed_temp`.
    pub smooth_time: f64,
    pub max_power: f64,
}

impl HeaterSpec {
    pub const EXTRUDER: Self = Self {
        min_temp: 0.0,
        max_temp: 300.0,
        smooth_time: 1.0,
        max_power: 1.0,
    };
    pub const BED: Self = Self {
        min_temp: 0.0,
        max_temp: 130.0,
        smooth_time: 1.0,
        max_power: 1.0,
    };

    fn validate(&self, name: &str) -> Result<()> {
        if !(self.min_temp.is_finite() && self.max_temp.is_finite()) || self.min_temp >= self.max_temp {
            return Err(HeaterError::InvalidSetting(format!(
                "{name}: min_temp ({}) must be below max_temp ({})",
                self.min_temp, self.max_temp
            )));
        }
        if self.smooth_time.is_nan() || self.smooth_time <= 0.0 {
            return Err(HeaterError::InvalidSetting(format!(
                "{name}: smooth_time must be positive"
            )));
        }
        if self.max_power.is_nan() || self.max_power <= 0.0 || self.max_power > 1.0 {
            return Err(HeaterError::InvalidSetting(format!(
                "{name}: max_power must be in (0, 1]"
            )));
        }
        Ok(())
    }
}

/// A heater: sensor smoothing, a target and the control that drives it.
pub struct Heater {
    name: String,
    spec: HeaterSpec,
    inv_smooth_time: f64,
    last_temp: f64,
    last_temp_time: f64,
    smoothed_temp: f64,
    target_temp: f64,
    last_pwm: f64,
    // Only `None` inside `replace_control`.
    control: Option<Box<dyn HeaterControl>>,
}

impl std::fmt::Debug for Heater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heater")
            .field("name", &self.name)
            .field("smoothed_temp", &self.smoothed_temp)
            .field("target_temp", &self.target_temp)
            .field("last_pwm", &self.last_pwm)
            .field("control", &self.control_name())
            .finish_non_exhaustive()
    }
}

impl Heater {
    pub fn new(
        name: impl Into<String>,
        spec: HeaterSpec,
        control: Box<dyn HeaterControl>,
        ambient: f64,
    ) -> Result<Self> {
        let name = name.into();
        spec.validate(&name)?;
        tracing::debug!(heater = %name, control = control.name(), "heater created");
        Ok(Self {
            name,
            inv_smooth_time: 1.0 / spec.smooth_time,
            spec,
            last_temp: ambient,
            last_temp_time: 0.0,
            smoothed_temp: ambient,
            target_temp: 0.0,
            last_pwm: 0.0,
            control: Some(control),
        })
    }

    pub fn spec(&self) -> &HeaterSpec {
        &self.spec
    }

    /// `0` turns the heater off and is always accepted.
    pub fn set_target(&mut self, degrees: f64) -> Result<()> {
        let in_range = degrees >= self.spec.min_temp && degrees <= self.spec.max_temp;
        if degrees != 0.0 && !in_range {
            return Err(HeaterError::TargetOutOfRange {
                heater: self.name.clone(),
                target: degrees,
                min: self.spec.min_temp,
                max: self.spec.max_temp,
            });
        }
        tracing::debug!(heater = %self.name, target = degrees, "target set");
        self.target_temp = degrees;
        Ok(())
    }

    pub fn target(&self) -> f64 {
        self.target_temp
    }

    pub fn smoothed_temp(&self) -> f64 {
        self.smoothed_temp
    }

    /// Raw reading of the last update.
    pub fn last_temp(&self) -> f64 {
        self.last_temp
    }

    pub fn last_pwm(&self) -> f64 {
        self.last_pwm
    }

    /// Sensor callback: smooth `temp`, run the control, return the duty.
    pub fn temperature_update(&mut self, read_time: f64, temp: f64) -> f64 {
        let time_diff = read_time - self.last_temp_time;
        self.last_temp = temp;
        self.last_temp_time = read_time;
        let adj_time = (time_diff * self.inv_smooth_time).min(1.0);
        self.smoothed_temp += (temp - self.smoothed_temp) * adj_time;

        let target = self.target_temp;
        let duty = self
            .control
            .as_mut()
            .map_or(0.0, |c| c.temperature_update(read_time, temp, target));
        self.last_pwm = duty.clamp(0.0, self.spec.max_power);
        if temp > self.spec.max_temp {
            tracing::warn!(heater = %self.name, temp, max = self.spec.max_temp, "heater above max_temp");
        }
        self.last_pwm
    }

    pub fn check_busy(&self, eventtime: f64) -> bool {
        self.control
            .as_ref()
            .is_some_and(|c| c.check_busy(eventtime, self.smoothed_temp, self.target_temp))
    }
}

impl ControlledHeater for Heater {
    fn name(&self) -> &str {
        &self.name
    }

    fn temperature(&self) -> (f64, f64) {
        (self.smoothed_temp, self.target_temp)
    }

    fn replace_control(&mut self, swap: ControlSwap<'_>) {
        if let Some(old) = self.control.take() {
            let new = swap(old);
            tracing::debug!(heater = %self.name, control = new.name(), "control replaced");
            self.control = Some(new);
        }
    }

    fn control_name(&self) -> &'static str {
        self.control.as_ref().map_or("none", |c| c.name())
    }

    fn target_range(&self) -> Option<(f64, f64)> {
        Some((self.spec.min_temp, self.spec.max_temp))
    }
}
