//! Filament swap sequence.
//!
//! `Idle -> Unloading -> WaitingForInsert -> Loading -> Idle`. Heating is
//! never waited on in place: the host loop calls [`FilamentSwap::poll`] and the
//! sequence advances once the heater is within tolerance of its target.

use filpal_traits::Host;

use crate::config::SwapCfg;
use crate::error::{FilpalError, Result};
use crate::store::{ParameterStore, hotend_temp};
use crate::util::gcode_num;

/// Filament to load once the old one is out.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadTarget {
    pub fila_id: String,
    pub temp: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SwapState {
    Idle,
    /// Heating to `temp` before retracting the old filament.
    Unloading {
        heater: String,
        temp: f64,
        load: Option<LoadTarget>,
    },
    /// Heated to the load temperature; waiting for the operator.
    WaitingForInsert { heater: String, load: LoadTarget },
    /// Operator confirmed; extrude once at temperature.
    Loading { heater: String, load: LoadTarget },
}

impl SwapState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Unloading { .. } => "unloading",
            Self::WaitingForInsert { .. } => "waiting_for_insert",
            Self::Loading { .. } => "loading",
        }
    }
}

/// Arguments of FILPAL_SWAP.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapRequest {
    pub heater: Option<String>,
    pub unload: bool,
    pub load: Option<String>,
    pub load_temp: Option<f64>,
    pub unload_temp: Option<f64>,
}

impl Default for SwapRequest {
    fn default() -> Self {
        Self {
            heater: None,
            unload: true,
            load: None,
            load_temp: None,
            unload_temp: None,
        }
    }
}

#[derive(Debug)]
pub struct FilamentSwap {
    cfg: SwapCfg,
    state: SwapState,
}

fn host_err(e: &filpal_traits::BoxError) -> FilpalError {
    FilpalError::Host(e.to_string())
}

impl FilamentSwap {
    pub fn new(cfg: SwapCfg) -> Self {
        Self {
            cfg,
            state: SwapState::Idle,
        }
    }

    pub fn state(&self) -> &SwapState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == SwapState::Idle
    }

    fn set_target(&self, host: &mut dyn Host, heater: &str, temp: f64) -> Result<()> {
        host.run_script(&format!(
            "SET_HEATER_TEMPERATURE HEATER={heater} TARGET={}",
            gcode_num(temp)
        ))
        .map_err(|e| host_err(&e))
    }

    fn at_temperature(&self, host: &mut dyn Host, heater: &str, temp: f64) -> Result<bool> {
        let h = host
            .heater(heater)
            .ok_or_else(|| FilpalError::Host(format!("unknown heater '{heater}'")))?;
        let (current, _) = h.temperature();
        Ok(current >= temp - self.cfg.temp_tolerance)
    }

    fn enter(&mut self, next: SwapState) {
        tracing::info!(from = self.state.name(), to = next.name(), "swap state");
        self.state = next;
    }

    /// Begin a swap. Temperatures are resolved up front so a missing value
    /// fails before anything is heated.
    pub fn start(
        &mut self,
        host: &mut dyn Host,
        store: &mut ParameterStore,
        req: &SwapRequest,
    ) -> Result<()> {
        if !self.is_idle() {
            return Err(FilpalError::State(format!(
                "a filament swap is already {}",
                self.state.name()
            )));
        }
        let heater = req.heater.clone().unwrap_or_else(|| self.cfg.heater.clone());
        if host.heater(&heater).is_none() {
            return Err(FilpalError::Host(format!("unknown heater '{heater}'")));
        }
        let load = match &req.load {
            Some(id) => Some(LoadTarget {
                fila_id: id.clone(),
                temp: match req.load_temp {
                    Some(t) => t,
                    None => hotend_temp(store.get_profile(id)?).ok_or_else(|| {
                        FilpalError::InvalidArgument(format!(
                            "filament '{id}' has no hotend temperature, give LOAD_TEMP"
                        ))
                    })?,
                },
            }),
            None => None,
        };

        if req.unload {
            let temp = match req.unload_temp {
                Some(t) => t,
                None => hotend_temp(store.get_loaded_profile()?).ok_or_else(|| {
                    FilpalError::InvalidArgument(
                        "loaded filament has no hotend temperature, give UNLOAD_TEMP".into(),
                    )
                })?,
            };
            self.set_target(host, &heater, temp)?;
            self.enter(SwapState::Unloading { heater, temp, load });
            return Ok(());
        }
        match load {
            Some(load) => {
                store.set_loaded(&load.fila_id)?;
                self.begin_insert(host, heater, load)
            }
            None => Err(FilpalError::InvalidArgument(
                "nothing to do: UNLOAD=0 and no LOAD given".into(),
            )),
        }
    }

    fn begin_insert(
        &mut self,
        host: &mut dyn Host,
        heater: String,
        load: LoadTarget,
    ) -> Result<()> {
        self.set_target(host, &heater, load.temp)?;
        host.respond_info(&format!(
            "Insert filament {} and run FILPAL_LOAD_CONTINUE when ready to extrude",
            load.fila_id
        ));
        self.enter(SwapState::WaitingForInsert { heater, load });
        Ok(())
    }

    /// Operator has inserted the new filament.
    pub fn continue_load(&mut self) -> Result<()> {
        let SwapState::WaitingForInsert { heater, load } = &self.state else {
            return Err(FilpalError::State(format!(
                "FILPAL_LOAD_CONTINUE is only valid while waiting for filament (swap is {})",
                self.state.name()
            )));
        };
        let next = SwapState::Loading {
            heater: heater.clone(),
            load: load.clone(),
        };
        self.enter(next);
        Ok(())
    }

    /// Advance if the heater has reached its target. Returns true when the
    /// state changed.
    ///
    /// Once the unload temperature is reached the swap is Idle before the
    /// retract is issued; an error after that point leaves it Idle and the
    /// operator restarts the remaining steps with FILPAL_SWAP.
    pub fn poll(&mut self, host: &mut dyn Host, store: &mut ParameterStore) -> Result<bool> {
        match self.state.clone() {
            SwapState::Idle | SwapState::WaitingForInsert { .. } => Ok(false),
            SwapState::Unloading { heater, temp, load } => {
                if !self.at_temperature(host, &heater, temp)? {
                    return Ok(false);
                }
                // Leave Unloading before any motion: a failure past this
                // point must not retract a second time on the next poll.
                self.enter(SwapState::Idle);
                let cfg = &self.cfg;
                for script in [
                    format!("G1 F{} E{}", gcode_num(cfg.prime_speed), gcode_num(cfg.prime_mm)),
                    format!("G1 F{} E-{}", gcode_num(cfg.unload_speed), gcode_num(cfg.unload_mm)),
                ] {
                    host.run_script(&script).map_err(|e| host_err(&e))?;
                }
                tracing::info!(heater = %heater, "filament unloaded");
                match load {
                    Some(load) => {
                        store.set_loaded(&load.fila_id)?;
                        self.begin_insert(host, heater, load)?;
                    }
                    None => host.respond_info("Filament unloaded"),
                }
                Ok(true)
            }
            SwapState::Loading { heater, load } => {
                if !self.at_temperature(host, &heater, load.temp)? {
                    return Ok(false);
                }
                host.run_script(&format!(
                    "G1 F{} E{}",
                    gcode_num(self.cfg.load_speed),
                    gcode_num(self.cfg.load_mm)
                ))
                .map_err(|e| host_err(&e))?;
                host.respond_info(&format!("Filament {} loaded", load.fila_id));
                self.enter(SwapState::Idle);
                Ok(true)
            }
        }
    }
}
