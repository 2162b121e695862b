//! The two classic heater control strategies.

use filpal_traits::HeaterControl;

use crate::error::{HeaterError, Result};

/// Gains are given on the 0..255 PWM scale printer configs use.
pub const PID_PARAM_BASE: f64 = 255.0;
/// Settled when within this many degrees of target...
pub const PID_SETTLE_DELTA: f64 = 1.0;
/// ...and changing slower than this (degrees per second).
pub const PID_SETTLE_SLOPE: f64 = 0.1;

/// Full power below `target - max_delta`, off above `target + max_delta`.
#[derive(Debug, Clone)]
pub struct ControlBangBang {
    max_delta: f64,
    max_power: f64,
    heating: bool,
}

impl ControlBangBang {
    pub fn new(max_delta: f64, max_power: f64) -> Result<Self> {
        if max_delta.is_nan() || max_delta <= 0.0 {
            return Err(HeaterError::InvalidSetting(format!(
                "max_delta must be positive, got {max_delta}"
            )));
        }
        check_power(max_power)?;
        Ok(Self {
            max_delta,
            max_power,
            heating: false,
        })
    }
}

impl HeaterControl for ControlBangBang {
    fn temperature_update(&mut self, _read_time: f64, temp: f64, target_temp: f64) -> f64 {
        if self.heating && temp >= target_temp + self.max_delta {
            self.heating = false;
        } else if !self.heating && temp <= target_temp - self.max_delta {
            self.heating = true;
        }
        if self.heating { self.max_power } else { 0.0 }
    }

    fn check_busy(&self, _eventtime: f64, smoothed_temp: f64, target_temp: f64) -> bool {
        smoothed_temp < target_temp - self.max_delta
    }

    fn reset(self: Box<Self>) -> Box<dyn HeaterControl> {
        self
    }

    fn name(&self) -> &'static str {
        "bang_bang"
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl PidGains {
    /// Typical hotend tuning.
    pub const EXTRUDER: Self = Self {
        kp: 22.2,
        ki: 1.08,
        kd: 114.0,
    };
    /// Typical heated bed tuning.
    pub const BED: Self = Self {
        kp: 54.0,
        ki: 0.77,
        kd: 948.0,
    };
}

/// PID with a smoothed derivative and an integral clamped to what
/// `max_power` can use.
#[derive(Debug, Clone)]
pub struct ControlPid {
    kp: f64,
    ki: f64,
    kd: f64,
    max_power: f64,
    min_deriv_time: f64,
    temp_integ_max: f64,
    prev_temp: f64,
    prev_temp_time: f64,
    prev_temp_deriv: f64,
    prev_temp_integ: f64,
}

impl ControlPid {
    /// `smooth_time` doubles as the derivative averaging window.
    pub fn new(gains: PidGains, max_power: f64, smooth_time: f64, ambient: f64) -> Result<Self> {
        check_power(max_power)?;
        if [gains.kp, gains.ki, gains.kd].iter().any(|g| !g.is_finite() || *g < 0.0) {
            return Err(HeaterError::InvalidSetting(format!(
                "PID gains must be finite and non-negative, got {gains:?}"
            )));
        }
        if smooth_time.is_nan() || smooth_time <= 0.0 {
            return Err(HeaterError::InvalidSetting(format!(
                "smooth_time must be positive, got {smooth_time}"
            )));
        }
        let ki = gains.ki / PID_PARAM_BASE;
        Ok(Self {
            kp: gains.kp / PID_PARAM_BASE,
            ki,
            kd: gains.kd / PID_PARAM_BASE,
            max_power,
            min_deriv_time: smooth_time,
            temp_integ_max: if ki > 0.0 { max_power / ki } else { 0.0 },
            prev_temp: ambient,
            prev_temp_time: 0.0,
            prev_temp_deriv: 0.0,
            prev_temp_integ: 0.0,
        })
    }
}

impl HeaterControl for ControlPid {
    fn temperature_update(&mut self, read_time: f64, temp: f64, target_temp: f64) -> f64 {
        let time_diff = read_time - self.prev_temp_time;
        let temp_diff = temp - self.prev_temp;
        let temp_deriv = if time_diff >= self.min_deriv_time {
            temp_diff / time_diff
        } else {
            (self.prev_temp_deriv * (self.min_deriv_time - time_diff) + temp_diff)
                / self.min_deriv_time
        };
        let temp_err = target_temp - temp;
        let temp_integ =
            (self.prev_temp_integ + temp_err * time_diff).clamp(0.0, self.temp_integ_max);
        let co = self.kp * temp_err + self.ki * temp_integ - self.kd * temp_deriv;
        let bounded_co = co.clamp(0.0, self.max_power);

        self.prev_temp = temp;
        self.prev_temp_time = read_time;
        self.prev_temp_deriv = temp_deriv;
        // No integral windup while saturated.
        if co == bounded_co {
            self.prev_temp_integ = temp_integ;
        }
        bounded_co
    }

    fn check_busy(&self, _eventtime: f64, smoothed_temp: f64, target_temp: f64) -> bool {
        (target_temp - smoothed_temp).abs() > PID_SETTLE_DELTA
            || self.prev_temp_deriv.abs() > PID_SETTLE_SLOPE
    }

    fn reset(self: Box<Self>) -> Box<dyn HeaterControl> {
        self
    }

    fn name(&self) -> &'static str {
        "pid"
    }
}

fn check_power(max_power: f64) -> Result<()> {
    if max_power > 0.0 && max_power <= 1.0 {
        Ok(())
    } else {
        Err(HeaterError::InvalidSetting(format!(
            "max_power must be in (0, 1], got {max_power}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bang_bang_hysteresis() {
        let mut c = ControlBangBang::new(2.0, 1.0).unwrap();
        assert_eq!(c.temperature_update(0.0, 190.0, 200.0), 1.0);
        // Keeps heating through the band.
        assert_eq!(c.temperature_update(1.0, 201.0, 200.0), 1.0);
        assert_eq!(c.temperature_update(2.0, 202.0, 200.0), 0.0);
        // Stays off until it falls below the band.
        assert_eq!(c.temperature_update(3.0, 199.0, 200.0), 0.0);
        assert_eq!(c.temperature_update(4.0, 198.0, 200.0), 1.0);
        assert!(c.check_busy(4.0, 197.0, 200.0));
        assert!(!c.check_busy(4.0, 198.5, 200.0));
    }

    #[test]
    fn pid_saturates_far_below_target() {
        let mut c = ControlPid::new(PidGains::EXTRUDER, 0.8, 1.0, 25.0).unwrap();
        assert_eq!(c.temperature_update(0.3, 25.0, 210.0), 0.8);
        assert!(c.check_busy(0.3, 25.0, 210.0));
        // Heater off: no output, no integral.
        let mut c = ControlPid::new(PidGains::EXTRUDER, 1.0, 1.0, 25.0).unwrap();
        assert_eq!(c.temperature_update(0.3, 25.0, 0.0), 0.0);
        assert_eq!(c.prev_temp_integ, 0.0);
    }

    #[test]
    fn rejects_bad_settings() {
        assert!(ControlBangBang::new(0.0, 1.0).is_err());
        assert!(ControlBangBang::new(2.0, 1.5).is_err());
        assert!(ControlPid::new(PidGains::EXTRUDER, 0.0, 1.0, 25.0).is_err());
        assert!(ControlPid::new(PidGains::EXTRUDER, 1.0, 0.0, 25.0).is_err());
        let bad = PidGains {
            kp: f64::NAN,
            ..PidGains::EXTRUDER
        };
        assert!(ControlPid::new(bad, 1.0, 1.0, 25.0).is_err());
    }
}
