/// A temperature control strategy, driven from the heater's periodic
/// sensor callback.
///
/// This is the capability set the correction layer wraps: an update toward
/// the target, a settle/busy query and a reset that peels off one layer.
pub trait HeaterControl {
    /// Run one control tick and return the requested output duty.
    fn temperature_update(&mut self, read_time: f64, temp: f64, target_temp: f64) -> f64;

    /// Whether the heater is still approaching `target_temp`.
    fn check_busy(&self, eventtime: f64, smoothed_temp: f64, target_temp: f64) -> bool;

    /// Remove one wrapping layer and return what it wrapped.
    ///
    /// Plain strategies have nothing to unwrap and return themselves.
    fn reset(self: Box<Self>) -> Box<dyn HeaterControl>;

    /// True for a strategy that rewrites targets before delegating.
    fn is_corrected(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str;
}

/// Replacement function handed to [`ControlledHeater::replace_control`].
pub type ControlSwap<'a> =
    Box<dyn FnOnce(Box<dyn HeaterControl>) -> Box<dyn HeaterControl> + 'a>;

/// A device whose control strategy can be swapped in place.
pub trait ControlledHeater {
    fn name(&self) -> &str;

    /// `(smoothed_temp, target_temp)` as last observed.
    fn temperature(&self) -> (f64, f64);

    /// Replace the active control with `swap(old)` in a single step; no
    /// control tick can observe the heater between the take and the put.
    fn replace_control(&mut self, swap: ControlSwap<'_>);

    /// Name of the outermost active control.
    fn control_name(&self) -> &'static str;

    /// `(min_temp, max_temp)` a target may take, if the device enforces one.
    fn target_range(&self) -> Option<(f64, f64)> {
        None
    }
}
