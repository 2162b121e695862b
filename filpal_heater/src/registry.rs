use std::collections::BTreeMap;

use filpal_traits::ControlledHeater;

use crate::error::{HeaterError, Result};

/// Heaters by configured name.
#[derive(Debug)]
pub struct HeaterRegistry<H> {
    heaters: BTreeMap<String, H>,
}

impl<H> Default for HeaterRegistry<H> {
    fn default() -> Self {
        Self {
            heaters: BTreeMap::new(),
        }
    }
}

impl<H: ControlledHeater> HeaterRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names must be unique.
    pub fn register(&mut self, heater: H) -> Result<()> {
        let name = heater.name().to_string();
        if self.heaters.contains_key(&name) {
            return Err(HeaterError::InvalidSetting(format!(
                "heater '{name}' registered twice"
            )));
        }
        tracing::debug!(heater = %name, "heater registered");
        self.heaters.insert(name, heater);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&H> {
        self.heaters.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut H> {
        self.heaters.get_mut(name)
    }

    pub fn require_mut(&mut self, name: &str) -> Result<&mut H> {
        self.heaters
            .get_mut(name)
            .ok_or_else(|| HeaterError::UnknownHeater(name.to_string()))
    }

    /// The seam the filament commands look heaters up through.
    pub fn lookup(&mut self, name: &str) -> Option<&mut dyn ControlledHeater> {
        self.heaters
            .get_mut(name)
            .map(|h| h as &mut dyn ControlledHeater)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.heaters.keys().map(String::as_str)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut H> {
        self.heaters.values_mut()
    }

    pub fn len(&self) -> usize {
        self.heaters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heaters.is_empty()
    }
}
