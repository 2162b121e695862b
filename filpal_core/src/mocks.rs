//! Test and helper mocks for filpal_core

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use filpal_traits::{BoxError, ControlSwap, ControlledHeater, HeaterControl, Host};

/// Calls a [`MockControl`] received, shared with the test that built it.
#[derive(Debug, Default)]
pub struct ControlLog {
    /// `(read_time, temp, target_temp)` per update.
    pub updates: Vec<(f64, f64, f64)>,
    /// `(eventtime, smoothed_temp, target_temp)` per busy query.
    pub busy_queries: Vec<(f64, f64, f64)>,
}

/// A control that records its inputs and answers with fixed values.
pub struct MockControl {
    pub id: u32,
    pub busy: bool,
    pub duty: f64,
    pub log: Rc<RefCell<ControlLog>>,
}

impl MockControl {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            busy: false,
            duty: 0.5,
            log: Rc::default(),
        }
    }

    pub fn busy(mut self, busy: bool) -> Self {
        self.busy = busy;
        self
    }

    /// Handle to the call log that stays valid after the control is boxed.
    pub fn log(&self) -> Rc<RefCell<ControlLog>> {
        Rc::clone(&self.log)
    }
}

impl HeaterControl for MockControl {
    fn temperature_update(&mut self, read_time: f64, temp: f64, target_temp: f64) -> f64 {
        self.log
            .borrow_mut()
            .updates
            .push((read_time, temp, target_temp));
        self.duty
    }

    fn check_busy(&self, eventtime: f64, smoothed_temp: f64, target_temp: f64) -> bool {
        self.log
            .borrow_mut()
            .busy_queries
            .push((eventtime, smoothed_temp, target_temp));
        self.busy
    }

    fn reset(self: Box<Self>) -> Box<dyn HeaterControl> {
        self
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// A heater whose temperature the test sets directly.
pub struct MockHeater {
    pub name: String,
    pub smoothed: f64,
    pub target: f64,
    pub range: Option<(f64, f64)>,
    control: Option<Box<dyn HeaterControl>>,
}

impl MockHeater {
    pub fn new(name: &str, control: impl HeaterControl + 'static) -> Self {
        Self {
            name: name.to_string(),
            smoothed: 25.0,
            target: 0.0,
            range: None,
            control: Some(Box::new(control)),
        }
    }

    /// Address of the active control allocation, for identity checks.
    pub fn control_addr(&self) -> Option<*const ()> {
        self.control
            .as_deref()
            .map(|c| std::ptr::from_ref(c).cast::<()>())
    }

    /// Drive one control tick at the current temperature and target.
    pub fn tick(&mut self, read_time: f64) -> Option<f64> {
        let (temp, target) = (self.smoothed, self.target);
        self.control
            .as_mut()
            .map(|c| c.temperature_update(read_time, temp, target))
    }

    pub fn check_busy(&self, eventtime: f64) -> Option<bool> {
        self.control
            .as_ref()
            .map(|c| c.check_busy(eventtime, self.smoothed, self.target))
    }
}

impl ControlledHeater for MockHeater {
    fn name(&self) -> &str {
        &self.name
    }

    fn temperature(&self) -> (f64, f64) {
        (self.smoothed, self.target)
    }

    fn replace_control(&mut self, swap: ControlSwap<'_>) {
        if let Some(old) = self.control.take() {
            self.control = Some(swap(old));
        }
    }

    fn control_name(&self) -> &'static str {
        self.control.as_ref().map_or("none", |c| c.name())
    }

    fn target_range(&self) -> Option<(f64, f64)> {
        self.range
    }
}

/// Host that records scripts and operator messages.
///
/// `SET_HEATER_TEMPERATURE HEATER=<h> TARGET=<t>` updates the named mock
/// heater's target so swap sequences can be driven by setting `smoothed`.
#[derive(Default)]
pub struct RecordingHost {
    pub scripts: Vec<String>,
    pub messages: Vec<String>,
    pub files: Vec<String>,
    pub heaters: BTreeMap<String, MockHeater>,
    /// When set, `run_script` fails with this message.
    pub fail_scripts: Option<String>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_heater(mut self, heater: MockHeater) -> Self {
        self.heaters.insert(heater.name.clone(), heater);
        self
    }

    pub fn with_files<I: IntoIterator<Item = S>, S: Into<String>>(mut self, files: I) -> Self {
        self.files.extend(files.into_iter().map(Into::into));
        self
    }

    pub fn heater_mut(&mut self, name: &str) -> Option<&mut MockHeater> {
        self.heaters.get_mut(name)
    }

    fn apply_heater_target(&mut self, script: &str) {
        let mut words = script.split_whitespace();
        if words.next() != Some("SET_HEATER_TEMPERATURE") {
            return;
        }
        let mut heater = None;
        let mut target = None;
        for w in words {
            if let Some(h) = w.strip_prefix("HEATER=") {
                heater = Some(h.to_string());
            } else if let Some(t) = w.strip_prefix("TARGET=") {
                target = t.parse::<f64>().ok();
            }
        }
        if let (Some(h), Some(t)) = (heater, target)
            && let Some(mh) = self.heaters.get_mut(&h)
        {
            mh.target = t;
        }
    }
}

impl Host for RecordingHost {
    fn run_script(&mut self, script: &str) -> Result<(), BoxError> {
        if let Some(msg) = &self.fail_scripts {
            return Err(msg.clone().into());
        }
        self.apply_heater_target(script);
        self.scripts.push(script.to_string());
        Ok(())
    }

    fn respond_info(&mut self, msg: &str) {
        self.messages.push(msg.to_string());
    }

    fn list_files(&mut self) -> Result<Vec<String>, BoxError> {
        Ok(self.files.clone())
    }

    fn heater(&mut self, name: &str) -> Option<&mut dyn ControlledHeater> {
        self.heaters
            .get_mut(name)
            .map(|h| h as &mut dyn ControlledHeater)
    }
}
