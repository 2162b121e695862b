//! Correction layer over a heater's control strategy.
//!
//! A heater is either Direct (its own control sees raw targets) or Corrected
//! (a [`CorrectedControl`] rewrites each target through a [`FitResult`] before
//! delegating). Installing over an existing correction unwraps it first, so
//! layers never stack. Reverting hands back the very control instance that was
//! replaced.

use std::collections::BTreeMap;

use filpal_traits::{ControlledHeater, HeaterControl};

use crate::error::{FilpalError, Result};
use crate::fit::FitResult;

pub const CORRECTED_CONTROL_NAME: &str = "filpal_corrected";

/// Wraps a control strategy and corrects every target it is given.
pub struct CorrectedControl {
    inner: Box<dyn HeaterControl>,
    fit: FitResult,
    range: Option<(f64, f64)>,
}

impl CorrectedControl {
    pub fn new(inner: Box<dyn HeaterControl>, fit: FitResult) -> Self {
        Self {
            inner,
            fit,
            range: None,
        }
    }

    /// Keep corrected targets within the heater's `[min_temp, max_temp]`.
    #[must_use]
    pub fn with_range(mut self, range: Option<(f64, f64)>) -> Self {
        self.range = range;
        self
    }

    pub fn fit(&self) -> FitResult {
        self.fit
    }

    /// Target handed to the wrapped control. A zero target means "heater
    /// off" and is never corrected into a non-zero one. A corrected target
    /// never leaves the heater's range.
    #[inline]
    pub fn corrected_target(&self, target_temp: f64) -> f64 {
        if target_temp <= 0.0 {
            return target_temp;
        }
        let corrected = self.fit.correct(target_temp);
        match self.range {
            Some((min, max)) => corrected.max(min).min(max),
            None => corrected,
        }
    }
}

impl HeaterControl for CorrectedControl {
    fn temperature_update(&mut self, read_time: f64, temp: f64, target_temp: f64) -> f64 {
        let target = self.corrected_target(target_temp);
        self.inner.temperature_update(read_time, temp, target)
    }

    fn check_busy(&self, eventtime: f64, smoothed_temp: f64, target_temp: f64) -> bool {
        self.inner.check_busy(eventtime, smoothed_temp, target_temp)
    }

    fn reset(self: Box<Self>) -> Box<dyn HeaterControl> {
        self.inner
    }

    fn is_corrected(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        CORRECTED_CONTROL_NAME
    }
}

/// What is installed on one heater.
#[derive(Debug, Clone, PartialEq)]
pub struct InterceptorBinding {
    pub heater: String,
    pub mnemonic: String,
    pub fit: FitResult,
    /// Name of the control the wrapper replaced and will hand back.
    pub replaced: &'static str,
}

/// Tracks the active correction per heater.
#[derive(Debug, Default)]
pub struct ControllerInterceptor {
    bindings: BTreeMap<String, InterceptorBinding>,
}

fn unwrap_correction(control: Box<dyn HeaterControl>) -> Box<dyn HeaterControl> {
    if control.is_corrected() {
        control.reset()
    } else {
        control
    }
}

impl ControllerInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn binding(&self, heater: &str) -> Option<&InterceptorBinding> {
        self.bindings.get(heater)
    }

    pub fn bindings(&self) -> impl Iterator<Item = &InterceptorBinding> {
        self.bindings.values()
    }

    pub fn is_corrected(&self, heater: &str) -> bool {
        self.bindings.contains_key(heater)
    }

    /// Wrap the heater's control with `fit`, replacing any earlier correction.
    pub fn install(
        &mut self,
        heater: &mut dyn ControlledHeater,
        mnemonic: &str,
        fit: FitResult,
    ) -> InterceptorBinding {
        let name = heater.name().to_string();
        let range = heater.target_range();
        let mut replaced = heater.control_name();
        heater.replace_control(Box::new(|old: Box<dyn HeaterControl>| -> Box<dyn HeaterControl> {
            let base = unwrap_correction(old);
            replaced = base.name();
            Box::new(CorrectedControl::new(base, fit).with_range(range))
        }));
        if self.bindings.contains_key(&name) {
            tracing::info!(heater = %name, "previous correction unwrapped before reinstall");
        }
        tracing::info!(heater = %name, mnemonic, %fit, replaced, "correction installed");
        let binding = InterceptorBinding {
            heater: name.clone(),
            mnemonic: mnemonic.to_string(),
            fit,
            replaced,
        };
        self.bindings.insert(name, binding.clone());
        binding
    }

    /// Restore the control that the correction on `heater` replaced.
    ///
    /// Reverting a heater with no correction installed is a `State` error.
    pub fn revert(&mut self, heater: &mut dyn ControlledHeater) -> Result<InterceptorBinding> {
        let name = heater.name().to_string();
        let binding = self.bindings.remove(&name).ok_or_else(|| {
            FilpalError::State(format!("no correction installed on heater '{name}'"))
        })?;
        heater.replace_control(Box::new(unwrap_correction));
        tracing::info!(heater = %name, restored = heater.control_name(), "correction reverted");
        Ok(binding)
    }

    /// Names of all corrected heaters.
    pub fn heaters(&self) -> Vec<String> {
        self.bindings.keys().cloned().collect()
    }
}
