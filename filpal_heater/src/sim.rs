//! First-order thermal simulation for tests and the CLI.

use filpal_traits::{ControlSwap, ControlledHeater};

use crate::heater::Heater;

/// `dT/dt = (ambient + gain * duty - T) / time_constant`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalModel {
    pub ambient: f64,
    /// Steady-state rise above ambient at full duty.
    pub gain: f64,
    /// Seconds.
    pub time_constant: f64,
}

impl ThermalModel {
    pub const HOTEND: Self = Self {
        ambient: 25.0,
        gain: 300.0,
        time_constant: 120.0,
    };
    pub const BED: Self = Self {
        ambient: 25.0,
        gain: 110.0,
        time_constant: 240.0,
    };
}

/// A [`Heater`] whose sensor reads a simulated block.
#[derive(Debug)]
pub struct SimulatedHotend {
    heater: Heater,
    model: ThermalModel,
    temp: f64,
    now: f64,
}

impl SimulatedHotend {
    pub fn new(heater: Heater, model: ThermalModel) -> Self {
        Self {
            heater,
            temp: model.ambient,
            model,
            now: 0.0,
        }
    }

    pub fn heater(&self) -> &Heater {
        &self.heater
    }

    pub fn heater_mut(&mut self) -> &mut Heater {
        &mut self.heater
    }

    /// True block temperature.
    pub fn temp(&self) -> f64 {
        self.temp
    }

    pub fn now(&self) -> f64 {
        self.now
    }

    /// Integrate `dt` seconds at the last duty, then deliver one reading.
    pub fn advance(&mut self, dt: f64) -> f64 {
        let m = self.model;
        let duty = self.heater.last_pwm();
        self.temp += dt * (m.ambient + m.gain * duty - self.temp) / m.time_constant;
        self.now += dt;
        self.heater.temperature_update(self.now, self.temp)
    }

    /// Advance in `step` increments for `seconds`.
    pub fn run_for(&mut self, seconds: f64, step: f64) {
        let mut left = seconds;
        while left > 0.0 {
            let dt = step.min(left);
            self.advance(dt);
            left -= dt;
        }
    }
}

impl ControlledHeater for SimulatedHotend {
    fn name(&self) -> &str {
        self.heater.name()
    }

    fn temperature(&self) -> (f64, f64) {
        self.heater.temperature()
    }

    fn replace_control(&mut self, swap: ControlSwap<'_>) {
        self.heater.replace_control(swap);
    }

    fn control_name(&self) -> &'static str {
        self.heater.control_name()
    }

    fn target_range(&self) -> Option<(f64, f64)> {
        self.heater.target_range()
    }
}
