//! Filament parameter store.
//!
//! One TOML table per filament id plus a reserved `[loaded]` table naming the
//! active filament. Every write is validated in full, then persisted with an
//! atomic rename before the in-memory copy changes.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::atomic::write_atomic;
use crate::error::{FilpalError, Result, io_error};
use crate::fit::FitResult;
use crate::util::median;

/// Section holding the loaded filament id.
pub const LOADED_SECTION: &str = "loaded";
const LOADED_KEY: &str = "fila_id";

/// Parameters that may be created on a profile that does not have them yet.
pub const ALLOWED_PARAMS: &[&str] = &[
    "hotend_min_temp",
    "hotend_max_temp",
    "hotend_initial_temp",
    "hotend_current_temp",
    "retraction",
    "fan_min",
    "fan_max",
    "z_offset",
    "filament_type",
    "flowrate",
    "M104",
    "M109",
    "M140",
    "M190",
];

/// Key prefix under which accepted fit coefficients are kept.
pub const CORRECTION_PREFIX: &str = "correction_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
    List(Vec<f64>),
    /// Per-letter target series, e.g. `M104 = { S = [205.0, 210.0] }`.
    Series(BTreeMap<String, Vec<f64>>),
}

impl ParamValue {
    /// Interpret an operator-supplied `VALUE=`: number, JSON list, or text.
    pub fn from_arg(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(v) = raw.parse::<f64>()
            && v.is_finite()
        {
            return Self::Number(v);
        }
        if (raw.starts_with('[') || raw.starts_with('{'))
            && let Ok(v) = serde_json::from_str::<Self>(raw)
        {
            return v;
        }
        Self::Text(raw.trim_matches('"').to_string())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn series(&self, letter: &str) -> Option<&[f64]> {
        match self {
            Self::Series(m) => m.get(letter).map(Vec::as_slice),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::List(v) => write!(f, "{v:?}"),
            Self::Series(m) => {
                let parts: Vec<String> = m.iter().map(|(k, v)| format!("{k}={v:?}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

/// Parameter name -> value for one filament.
pub type Profile = BTreeMap<String, ParamValue>;

/// Hotend temperature a profile prints at: `hotend_current_temp`, else the
/// median of its `M104 S` targets.
pub fn hotend_temp(profile: &Profile) -> Option<f64> {
    profile
        .get("hotend_current_temp")
        .and_then(ParamValue::as_number)
        .or_else(|| profile.get("M104").and_then(|v| v.series("S")).and_then(median))
}

/// Coefficients kept under `correction_<mnemonic>`, if well formed.
pub fn stored_correction(profile: &Profile, mnemonic: &str) -> Option<FitResult> {
    match profile.get(&format!("{CORRECTION_PREFIX}{mnemonic}"))? {
        ParamValue::List(c) if c.len() == 3 && c.iter().all(|v| v.is_finite()) => {
            Some(FitResult::new(c[0], c[1], c[2]))
        }
        _ => None,
    }
}

#[derive(Debug)]
pub struct ParameterStore {
    path: PathBuf,
    profiles: BTreeMap<String, Profile>,
    loaded: Option<String>,
}

impl ParameterStore {
    /// Open the store at `path`; a missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "parameter file absent, starting empty");
                String::new()
            }
            Err(e) => return Err(io_error("cannot read parameter file", &path, &e)),
        };
        let mut sections: BTreeMap<String, Profile> = toml::from_str(&text).map_err(|e| {
            tracing::error!(path = %path.display(), error = %e, "parameter file is malformed");
            FilpalError::Config(format!("parameter file {}: {e}", path.display()))
        })?;
        let loaded = sections
            .remove(LOADED_SECTION)
            .and_then(|mut s| s.remove(LOADED_KEY))
            .and_then(|v| v.as_text().map(str::to_owned));
        tracing::debug!(profiles = sections.len(), loaded = ?loaded, "parameter store opened");
        Ok(Self {
            path,
            profiles: sections,
            loaded,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn loaded_id(&self) -> Option<&str> {
        self.loaded.as_deref()
    }

    pub fn get_profile(&self, id: &str) -> Result<&Profile> {
        self.profiles
            .get(id)
            .ok_or_else(|| FilpalError::NotFound(id.to_string()))
    }

    pub fn get_loaded_profile(&self) -> Result<&Profile> {
        let id = self.loaded.as_deref().ok_or(FilpalError::NoLoadedFilament)?;
        self.get_profile(id)
    }

    /// Write every key of `values` into profile `id`, or nothing at all.
    ///
    /// A key must already exist on the profile or be in [`ALLOWED_PARAMS`].
    /// The profile must exist; only [`ParameterStore::set_loaded`] creates one.
    pub fn set_values(&mut self, id: &str, values: &Profile) -> Result<()> {
        check_id(id)?;
        let current = self.get_profile(id)?;
        if let Some(bad) = values
            .keys()
            .find(|k| !ALLOWED_PARAMS.contains(&k.as_str()) && !current.contains_key(*k))
        {
            tracing::warn!(fila_id = id, key = %bad, "unrecognized parameter rejected");
            return Err(FilpalError::UnrecognizedParameter(bad.clone()));
        }
        self.commit(id, |profile| {
            for (k, v) in values {
                profile.insert(k.clone(), v.clone());
            }
        })?;
        for key in values.keys() {
            tracing::info!(fila_id = id, key = %key, "profile updated");
        }
        Ok(())
    }

    /// Point the loaded filament at `id`, creating an empty profile if needed.
    pub fn set_loaded(&mut self, id: &str) -> Result<()> {
        check_id(id)?;
        let previous = self.loaded.replace(id.to_string());
        let created = !self.profiles.contains_key(id);
        if created {
            self.profiles.insert(id.to_string(), Profile::new());
        }
        if let Err(e) = self.persist() {
            self.loaded = previous;
            if created {
                self.profiles.remove(id);
            }
            return Err(e);
        }
        tracing::info!(fila_id = id, created, "loaded filament set");
        Ok(())
    }

    /// Keep accepted coefficients on profile `id` as `correction_<mnemonic>`.
    ///
    /// All entries land in one write: either every correction is stored or
    /// none is.
    pub fn record_corrections(&mut self, id: &str, fits: &[(&str, FitResult)]) -> Result<()> {
        check_id(id)?;
        self.get_profile(id)?;
        if fits.is_empty() {
            return Ok(());
        }
        self.commit(id, |profile| {
            for (mnemonic, fit) in fits {
                profile.insert(
                    format!("{CORRECTION_PREFIX}{mnemonic}"),
                    ParamValue::List(fit.coefficients().to_vec()),
                );
            }
        })?;
        for (mnemonic, fit) in fits {
            tracing::info!(fila_id = id, mnemonic = *mnemonic, %fit, "correction stored");
        }
        Ok(())
    }

    /// Apply `edit` to a copy of profile `id`, persist, then keep the copy.
    fn commit(&mut self, id: &str, edit: impl FnOnce(&mut Profile)) -> Result<()> {
        let mut profile = self.profiles.get(id).cloned().unwrap_or_default();
        edit(&mut profile);
        let previous = self.profiles.insert(id.to_string(), profile);
        if let Err(e) = self.persist() {
            match previous {
                Some(p) => self.profiles.insert(id.to_string(), p),
                None => self.profiles.remove(id),
            };
            return Err(e);
        }
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        let text = self.render()?;
        write_atomic(&self.path, text.as_bytes())
            .map_err(|e| io_error("cannot write parameter file", &self.path, &e))
    }

    fn render(&self) -> Result<String> {
        let mut doc = toml::Table::new();
        if let Some(id) = &self.loaded {
            let mut loaded = toml::Table::new();
            loaded.insert(LOADED_KEY.into(), toml::Value::String(id.clone()));
            doc.insert(LOADED_SECTION.into(), toml::Value::Table(loaded));
        }
        for (id, profile) in &self.profiles {
            let table = toml::Value::try_from(profile)
                .map_err(|e| FilpalError::Io(format!("cannot encode profile {id}: {e}")))?;
            doc.insert(id.clone(), table);
        }
        Ok(doc.to_string())
    }
}

fn check_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(FilpalError::InvalidArgument("filament id must not be empty".into()));
    }
    if id == LOADED_SECTION {
        return Err(FilpalError::InvalidArgument(format!(
            "'{LOADED_SECTION}' is reserved and cannot be a filament id"
        )));
    }
    Ok(())
}
