use crate::BoxError;
use crate::control::ControlledHeater;

/// The printer host as seen by filament commands.
///
/// Each call runs to completion; the host is cooperative and single threaded.
pub trait Host {
    /// Queue a gcode script for execution.
    fn run_script(&mut self, script: &str) -> Result<(), BoxError>;

    /// Print an informational message to the operator console.
    fn respond_info(&mut self, msg: &str);

    /// File names available on the virtual SD card.
    fn list_files(&mut self) -> Result<Vec<String>, BoxError>;

    /// Look up a heater by its configured name.
    fn heater(&mut self, name: &str) -> Option<&mut dyn ControlledHeater>;
}
