//! From traced values to installed corrections.
//!
//! For every tracked mnemonic flagged for correction, the profile's target
//! series (observed) is fitted against the traced series (commanded), letter
//! by letter. All fits are computed before any heater is touched; a single
//! failure installs nothing.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::fit::{CurveFitter, FitResult};
use crate::store::{ParamValue, Profile, stored_correction};
use crate::trace::{ParseVals, find_series};
use crate::util::median;

/// Letter whose fit drives a heater correction.
pub const HEATER_LETTER: &str = "S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitSource {
    /// Computed from this trace.
    Fitted,
    /// Reused from the profile's stored coefficients.
    Stored,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedFit {
    pub mnemonic: String,
    pub letter: String,
    pub fit: FitResult,
    pub source: FitSource,
}

/// Bring two series to a cardinality the fitter accepts.
///
/// One value on either side, or equal lengths, pass through. Anything else is
/// collapsed to the two medians.
pub fn reduce(observed: &[f64], commanded: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let passthrough = observed.len() == 1
        || commanded.len() == 1
        || (observed.len() == commanded.len() && !observed.is_empty());
    if passthrough {
        return (observed.to_vec(), commanded.to_vec());
    }
    (
        median(observed).into_iter().collect(),
        median(commanded).into_iter().collect(),
    )
}

/// Compute every fit the trace supports.
pub fn plan(
    profile: &Profile,
    parse_vals: &ParseVals,
    tracked: &BTreeMap<String, bool>,
    fitter: &CurveFitter,
) -> Result<Vec<PlannedFit>> {
    let mut out = Vec::new();
    for (mnemonic, _) in tracked.iter().filter(|(_, on)| **on) {
        let before = out.len();
        if let Some(ParamValue::Series(targets)) = profile.get(mnemonic) {
            for (letter, observed) in targets {
                let Some(commanded) = find_series(parse_vals, mnemonic, letter) else {
                    continue;
                };
                if observed.is_empty() || commanded.is_empty() {
                    continue;
                }
                let (obs, cmd) = reduce(observed, commanded);
                let fit = fitter.fit(&obs, &cmd)?;
                tracing::debug!(mnemonic = %mnemonic, letter = %letter, %fit, "fitted");
                out.push(PlannedFit {
                    mnemonic: mnemonic.clone(),
                    letter: letter.clone(),
                    fit,
                    source: FitSource::Fitted,
                });
            }
        }
        if out.len() > before {
            continue;
        }
        if let Some(fit) = stored_correction(profile, mnemonic) {
            tracing::debug!(mnemonic = %mnemonic, %fit, "reusing stored correction");
            out.push(PlannedFit {
                mnemonic: mnemonic.clone(),
                letter: HEATER_LETTER.to_string(),
                fit,
                source: FitSource::Stored,
            });
        } else {
            tracing::debug!(mnemonic = %mnemonic, "nothing to fit");
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TracedCommand;

    fn series(pairs: &[(&str, Vec<f64>)]) -> ParamValue {
        ParamValue::Series(pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect())
    }

    fn traced(cmd: &str, s: &[f64]) -> TracedCommand {
        TracedCommand {
            command: cmd.into(),
            args: BTreeMap::from([("S".to_string(), s.iter().copied().collect())]),
        }
    }

    #[test]
    fn reduce_rules() {
        assert_eq!(reduce(&[1.0], &[1.0, 2.0, 3.0]).1.len(), 3);
        assert_eq!(reduce(&[1.0, 2.0], &[1.0, 2.0]).0.len(), 2);
        assert_eq!(
            reduce(&[1.0, 2.0], &[5.0, 6.0, 7.0]),
            (vec![2.0], vec![6.0])
        );
    }

    #[test]
    fn fits_only_flagged_and_traced() {
        let profile = Profile::from([
            ("M104".to_string(), series(&[("S", vec![210.0])])),
            ("M140".to_string(), series(&[("S", vec![60.0])])),
        ]);
        let vals = ParseVals::from([
            ("0".to_string(), traced("M104", &[200.0])),
            ("1".to_string(), traced("M140", &[55.0])),
        ]);
        let tracked = BTreeMap::from([("M104".to_string(), true), ("M140".to_string(), false)]);
        let fits = plan(&profile, &vals, &tracked, &CurveFitter::default()).unwrap();
        assert_eq!(fits.len(), 1);
        assert_eq!(fits[0].mnemonic, "M104");
        assert_eq!(fits[0].fit, FitResult::new(0.0, 1.05, 0.0));
        assert_eq!(fits[0].source, FitSource::Fitted);
    }

    #[test]
    fn stored_correction_used_when_untraced() {
        let profile = Profile::from([
            ("M104".to_string(), series(&[("S", vec![210.0])])),
            ("correction_M104".to_string(), ParamValue::List(vec![1.0, 1.0, 0.0])),
        ]);
        let tracked = BTreeMap::from([("M104".to_string(), true)]);
        let fits = plan(&profile, &ParseVals::new(), &tracked, &CurveFitter::default()).unwrap();
        assert_eq!(fits[0].source, FitSource::Stored);
        assert_eq!(fits[0].fit, FitResult::new(1.0, 1.0, 0.0));
    }
}
