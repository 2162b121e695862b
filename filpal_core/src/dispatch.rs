//! The filament module as the host sees it: one entry point per command line,
//! plus a poll hook for the host loop.

use filpal_traits::Host;

use crate::calibration::CalibrationOrchestrator;
use crate::command::{Command, UpdateRequest, parse_line};
use crate::config::Settings;
use crate::error::{FilpalError, Result};
use crate::fit::{CurveFitter, FitResult};
use crate::inject::{FitSource, HEATER_LETTER, PlannedFit, plan};
use crate::interceptor::ControllerInterceptor;
use crate::store::{ParamValue, ParameterStore, Profile};
use crate::swap::{FilamentSwap, SwapState};
use crate::trace::{ParseOutcome, ParseVals, TraceParser};

pub struct Filpal {
    settings: Settings,
    store: ParameterStore,
    parser: TraceParser,
    fitter: CurveFitter,
    interceptor: ControllerInterceptor,
    swap: FilamentSwap,
}

impl Filpal {
    /// Validate `cfg` and open the parameter store.
    pub fn from_config(cfg: &filpal_config::Config) -> Result<Self> {
        cfg.validate()
            .map_err(|e| FilpalError::Config(e.to_string()))?;
        Self::new(Settings::from(cfg))
    }

    pub fn new(settings: Settings) -> Result<Self> {
        if settings.parse_commands.is_empty() {
            return Err(FilpalError::Config("parse_commands must name at least one command".into()));
        }
        let store = ParameterStore::open(settings.params_file.clone())?;
        let parser = TraceParser::new(settings.parse_commands.keys().cloned(), settings.trace.clone());
        let fitter = CurveFitter::new(settings.fit.max_degree);
        let swap = FilamentSwap::new(settings.swap.clone());
        tracing::info!(
            params = %settings.params_file.display(),
            sdcard = %settings.sdcard_dir.display(),
            tracked = settings.parse_commands.len(),
            "filament module ready"
        );
        Ok(Self {
            settings,
            store,
            parser,
            fitter,
            interceptor: ControllerInterceptor::new(),
            swap,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    pub fn interceptor(&self) -> &ControllerInterceptor {
        &self.interceptor
    }

    pub fn swap_state(&self) -> &SwapState {
        self.swap.state()
    }

    /// Parse and run one command line.
    pub fn handle(&mut self, host: &mut dyn Host, line: &str) -> Result<()> {
        let cmd = parse_line(line)?;
        let verb = cmd.verb();
        self.execute(host, cmd).inspect_err(|e| {
            tracing::warn!(command = verb, error = %e, "command failed");
        })
    }

    pub fn execute(&mut self, host: &mut dyn Host, cmd: Command) -> Result<()> {
        tracing::debug!(command = cmd.verb(), "dispatch");
        match cmd {
            Command::Calibrate(req) => {
                let profile = match self.store.get_loaded_profile() {
                    Ok(p) => Some(p),
                    Err(FilpalError::NoLoadedFilament) => None,
                    Err(e) => return Err(e),
                };
                CalibrationOrchestrator::new(&self.settings.calibration).run(host, &req, profile)?;
                Ok(())
            }
            Command::Swap(req) => self.swap.start(host, &mut self.store, &req),
            Command::LoadContinue => {
                self.swap.continue_load()?;
                self.poll(host).map(|_| ())
            }
            Command::Parse { file_name } => self.parse(host, &file_name).map(|_| ()),
            Command::Inject { parse_vals } => self.inject(host, &parse_vals).map(|_| ()),
            Command::Update(req) => self.update(host, &req),
            Command::Revert { heater } => self.revert(host, heater.as_deref()),
        }
    }

    /// Host-loop hook; advances a pending filament swap.
    pub fn poll(&mut self, host: &mut dyn Host) -> Result<bool> {
        self.swap.poll(host, &mut self.store)
    }

    /// Scan a file on the SD card and annotate it in place.
    pub fn parse(&mut self, host: &mut dyn Host, file_name: &str) -> Result<ParseOutcome> {
        let name = file_name.to_lowercase();
        if name.is_empty() || name.contains('/') || name.contains("..") {
            return Err(FilpalError::InvalidArgument(format!(
                "FILE_NAME '{file_name}' must name a file on the SD card"
            )));
        }
        let path = self.settings.sdcard_dir.join(&name);
        let outcome = self.parser.parse_file(&path)?;
        host.respond_info(&format!("File opened:{name} Parse Success"));
        Ok(outcome)
    }

    /// Fit the loaded filament's targets against traced values and install
    /// heater corrections. Nothing is installed unless every fit succeeds.
    pub fn inject(&mut self, host: &mut dyn Host, parse_vals: &str) -> Result<Vec<PlannedFit>> {
        let vals: ParseVals = serde_json::from_str(parse_vals).map_err(|e| {
            tracing::error!(error = %e, "parse_vals rejected");
            FilpalError::InvalidArgument(format!("unable to retrieve file parse values: {e}"))
        })?;
        let fila_id = self
            .store
            .loaded_id()
            .ok_or(FilpalError::NoLoadedFilament)?
            .to_string();
        let profile = self.store.get_profile(&fila_id)?;
        let fits = plan(profile, &vals, &self.settings.parse_commands, &self.fitter)?;

        let heater_fits: Vec<(&String, &PlannedFit)> = fits
            .iter()
            .filter(|f| f.letter == HEATER_LETTER)
            .filter_map(|f| {
                self.settings
                    .heater_commands
                    .get(&f.mnemonic)
                    .map(|heater| (heater, f))
            })
            .collect();
        for (heater, _) in &heater_fits {
            if host.heater(heater).is_none() {
                return Err(FilpalError::Host(format!("unknown heater '{heater}'")));
            }
        }
        let fitted: Vec<(&str, FitResult)> = fits
            .iter()
            .filter(|f| f.letter == HEATER_LETTER && f.source == FitSource::Fitted)
            .map(|f| (f.mnemonic.as_str(), f.fit))
            .collect();
        self.store.record_corrections(&fila_id, &fitted)?;
        for (heater, f) in &heater_fits {
            let Some(h) = host.heater(heater) else {
                continue;
            };
            self.interceptor.install(h, &f.mnemonic, f.fit);
            host.respond_info(&format!("{} correction on {heater}: {}", f.mnemonic, f.fit));
        }
        if heater_fits.is_empty() {
            host.respond_info("No heater corrections applied");
        }
        Ok(fits)
    }

    /// Update or report filament parameters.
    pub fn update(&mut self, host: &mut dyn Host, req: &UpdateRequest) -> Result<()> {
        let id = match &req.fila_id {
            Some(id) => id.clone(),
            None => self
                .store
                .loaded_id()
                .ok_or(FilpalError::NoLoadedFilament)?
                .to_string(),
        };
        let mut values = Profile::new();
        if let Some(raw) = &req.params {
            let batch: Profile = serde_json::from_str(raw).map_err(|e| {
                FilpalError::InvalidArgument(format!("PARAMS must be a JSON object: {e}"))
            })?;
            values.extend(batch);
        }
        match (&req.param, &req.value) {
            (Some(p), Some(v)) => {
                values.insert(p.clone(), ParamValue::from_arg(v));
            }
            (Some(p), None) => {
                return Err(FilpalError::InvalidArgument(format!("PARAM={p} needs a VALUE")));
            }
            (None, Some(_)) => {
                return Err(FilpalError::InvalidArgument("VALUE given without PARAM".into()));
            }
            (None, None) => {}
        }
        if !values.is_empty() {
            self.store.set_values(&id, &values)?;
            host.respond_info(&format!("Updated {} parameter(s) for {id}", values.len()));
        } else if !req.lookup {
            return Err(FilpalError::InvalidArgument(
                "nothing to update: give PARAM and VALUE, PARAMS, or LOOKUP=1".into(),
            ));
        }
        if req.lookup {
            let profile = self.store.get_profile(&id)?;
            host.respond_info(&format_profile(&id, profile));
        }
        Ok(())
    }

    /// Put back the original control on one or all corrected heaters.
    pub fn revert(&mut self, host: &mut dyn Host, heater: Option<&str>) -> Result<()> {
        let names = match heater {
            Some(h) => vec![h.to_string()],
            None => self.interceptor.heaters(),
        };
        if names.is_empty() {
            host.respond_info("No corrected heaters");
            return Ok(());
        }
        for name in names {
            let h = host
                .heater(&name)
                .ok_or_else(|| FilpalError::Host(format!("unknown heater '{name}'")))?;
            self.interceptor.revert(h)?;
            host.respond_info(&format!("Restored original control on {name}"));
        }
        Ok(())
    }
}

/// Multi-line operator report of one profile.
pub fn format_profile(id: &str, profile: &Profile) -> String {
    let mut out = format!("Filament {id}:");
    if profile.is_empty() {
        out.push_str(" (no parameters)");
    }
    for (k, v) in profile {
        out.push_str(&format!("\n  {k} = {v}"));
    }
    out
}
