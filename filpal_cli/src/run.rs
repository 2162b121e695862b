//! Subcommand bodies.

use eyre::{Result, WrapErr};
use filpal_core::dispatch::format_profile;
use filpal_core::{CurveFitter, Filpal, FilpalError, SwapState};
use filpal_traits::ControlledHeater;
use serde_json::json;

use crate::host::{SIM_STEP_S, SimHost};

/// Dispatch `lines` in order. After each line the simulation runs until a
/// pending swap stops waiting on a heater.
pub fn run_exec(filpal: &mut Filpal, lines: &[String], max_wait_s: f64, json: bool) -> Result<()> {
    let mut host = SimHost::from_settings(filpal.settings(), json)?;
    for line in lines {
        tracing::info!(line = %line, "exec");
        filpal
            .handle(&mut host, line)
            .wrap_err_with(|| format!("command failed: {line}"))?;
        settle(filpal, &mut host, max_wait_s)?;
    }
    report(filpal, &host, json);
    Ok(())
}

fn waiting_on_heater(state: &SwapState) -> bool {
    matches!(state, SwapState::Unloading { .. } | SwapState::Loading { .. })
}

fn settle(filpal: &mut Filpal, host: &mut SimHost, max_wait_s: f64) -> Result<()> {
    let mut waited = 0.0;
    while waiting_on_heater(filpal.swap_state()) {
        if waited >= max_wait_s {
            eyre::bail!(
                "swap still {} after {max_wait_s:.0}s of simulated heating",
                filpal.swap_state().name()
            );
        }
        host.tick();
        waited += SIM_STEP_S;
        filpal.poll(host)?;
    }
    if waited > 0.0 {
        tracing::debug!(waited_s = waited, "swap settled");
    }
    Ok(())
}

fn report(filpal: &Filpal, host: &SimHost, json: bool) {
    let heaters: Vec<_> = host
        .heaters()
        .names()
        .filter_map(|n| host.heaters().get(n))
        .map(|h| {
            let (temp, target) = h.temperature();
            (h.name().to_string(), h.control_name(), temp, target)
        })
        .collect();
    if json {
        let hs: Vec<_> = heaters
            .iter()
            .map(|(name, control, temp, target)| {
                json!({ "name": name, "control": control, "temp": temp, "target": target })
            })
            .collect();
        println!(
            "{}",
            json!({
                "event": "done",
                "loaded": filpal.store().loaded_id(),
                "swap_state": filpal.swap_state().name(),
                "heaters": hs,
            })
        );
    } else {
        for (name, control, temp, target) in heaters {
            println!("{name}: control={control} temp={temp:.1} target={target:.1}");
        }
    }
}

pub fn run_parse(filpal: &mut Filpal, file: &str, json: bool) -> Result<()> {
    let mut host = SimHost::from_settings(filpal.settings(), json)?;
    let outcome = filpal.parse(&mut host, file)?;
    if json {
        println!(
            "{}",
            json!({ "event": "parsed", "marker_line": outcome.marker_line, "parse_vals": outcome.parse_vals() })
        );
    } else {
        println!("{}", outcome.to_json().map_err(FilpalError::from)?);
    }
    Ok(())
}

pub fn run_fit(observed: &[f64], commanded: &[f64], max_degree: usize, json: bool) -> Result<()> {
    let fit = CurveFitter::new(max_degree)
        .fit(observed, commanded)
        .map_err(FilpalError::from)?;
    let [c0, c1, c2] = fit.coefficients();
    if json {
        println!("{}", json!({ "c0": c0, "c1": c1, "c2": c2, "degree": fit.degree() }));
    } else {
        println!("{fit}");
    }
    Ok(())
}

pub fn run_show(filpal: &Filpal, id: Option<&str>, json: bool) -> Result<()> {
    let store = filpal.store();
    let (id, profile) = match id {
        Some(id) => (id, store.get_profile(id)?),
        None => {
            let profile = store.get_loaded_profile()?;
            (store.loaded_id().unwrap_or_default(), profile)
        }
    };
    if json {
        println!("{}", json!({ "fila_id": id, "profile": profile }));
    } else {
        println!("{}", format_profile(id, profile));
    }
    Ok(())
}
