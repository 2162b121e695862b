//! Command trace scanning.
//!
//! A trace is the gcode a print job actually issued. For every tracked
//! mnemonic the parser collects the numeric argument values per argument
//! letter, sorted ascending, and records where the print body starts so the
//! caller can inject the result there.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::atomic::write_atomic;
use crate::config::TraceCfg;
use crate::error::io_error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("file already parsed")]
    AlreadyParsed,
    #[error("line {line}: cannot read '{token}' as a number")]
    InvalidValue { line: usize, token: String },
    #[error("no {0} command found in file")]
    MissingMarker(String),
    #[error("cannot encode parse result: {0}")]
    Encode(String),
}

/// Sorted values of one argument letter of one mnemonic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArgumentSeries(Vec<f64>);

impl ArgumentSeries {
    /// Insert keeping ascending order.
    pub fn push(&mut self, value: f64) {
        let at = self.0.partition_point(|v| *v <= value);
        self.0.insert(at, value);
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<f64> for ArgumentSeries {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut s = Self::default();
        for v in iter {
            s.push(v);
        }
        s
    }
}

/// One entry of the injected `parse_vals` mapping:
/// `{"command": "M104", "S": [200.0, 205.0]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TracedCommand {
    pub command: String,
    #[serde(flatten)]
    pub args: BTreeMap<String, ArgumentSeries>,
}

/// Tracked-command index (as a string) -> traced values.
pub type ParseVals = BTreeMap<String, TracedCommand>;

/// Look up the series for `mnemonic`/`letter` in a decoded `parse_vals`.
pub fn find_series<'a>(vals: &'a ParseVals, mnemonic: &str, letter: &str) -> Option<&'a [f64]> {
    vals.values()
        .find(|c| c.command == mnemonic)
        .and_then(|c| c.args.get(letter))
        .map(ArgumentSeries::values)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    /// In tracked-command order; mnemonics that never occur have no letters.
    pub commands: Vec<TracedCommand>,
    /// Zero-based index of the print-start marker line.
    pub marker_line: usize,
}

impl ParseOutcome {
    pub fn series(&self, mnemonic: &str, letter: &str) -> Option<&[f64]> {
        self.commands
            .iter()
            .find(|c| c.command == mnemonic)
            .and_then(|c| c.args.get(letter))
            .map(ArgumentSeries::values)
    }

    pub fn parse_vals(&self) -> ParseVals {
        self.commands
            .iter()
            .enumerate()
            .map(|(i, c)| (i.to_string(), c.clone()))
            .collect()
    }

    pub fn to_json(&self) -> Result<String, ParseError> {
        serde_json::to_string(&self.parse_vals()).map_err(|e| ParseError::Encode(e.to_string()))
    }
}

/// Strip a `;` comment and surrounding whitespace.
fn code_part(line: &str) -> &str {
    line.split(';').next().unwrap_or_default().trim()
}

#[derive(Debug, Clone)]
pub struct TraceParser {
    commands: Vec<String>,
    cfg: TraceCfg,
}

impl TraceParser {
    pub fn new<I, S>(tracked: I, cfg: TraceCfg) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            commands: tracked.into_iter().map(Into::into).collect(),
            cfg,
        }
    }

    pub fn tracked(&self) -> &[String] {
        &self.commands
    }

    /// Scan `lines` without modifying anything.
    pub fn scan<S: AsRef<str>>(&self, lines: &[S]) -> Result<ParseOutcome, ParseError> {
        if let Some(first) = lines.first()
            && first.as_ref().contains(&self.cfg.parsed_marker)
        {
            return Err(ParseError::AlreadyParsed);
        }
        let mut commands: Vec<TracedCommand> = self
            .commands
            .iter()
            .map(|c| TracedCommand {
                command: c.clone(),
                args: BTreeMap::new(),
            })
            .collect();
        let mut marker_line = None;

        for (idx, raw) in lines.iter().enumerate() {
            let mut tokens = code_part(raw.as_ref()).split_whitespace();
            let Some(head) = tokens.next() else {
                continue;
            };
            let head = head.to_ascii_uppercase();
            if head == self.cfg.print_start_marker {
                marker_line.get_or_insert(idx);
                continue;
            }
            let Some(entry) = commands.iter_mut().find(|c| c.command == head) else {
                continue;
            };
            for token in tokens {
                let value = parse_argument(token).ok_or_else(|| ParseError::InvalidValue {
                    line: idx + 1,
                    token: token.to_string(),
                })?;
                entry.args.entry(value.0).or_default().push(value.1);
            }
        }

        let marker_line =
            marker_line.ok_or_else(|| ParseError::MissingMarker(self.cfg.print_start_marker.clone()))?;
        tracing::debug!(marker_line, lines = lines.len(), "trace scanned");
        Ok(ParseOutcome {
            commands,
            marker_line,
        })
    }

    /// Annotated copy of `lines`: line 0 marked parsed, the parse result
    /// inserted right after the print-start marker.
    pub fn annotate<S: AsRef<str>>(
        &self,
        lines: &[S],
        outcome: &ParseOutcome,
    ) -> Result<String, ParseError> {
        let inject = format!("{} parse_vals={}", self.cfg.inject_command, outcome.to_json()?);
        let mut out = String::new();
        for (idx, line) in lines.iter().enumerate() {
            out.push_str(line.as_ref());
            if idx == 0 {
                out.push(' ');
                out.push_str(&self.cfg.parsed_marker);
            }
            out.push('\n');
            if idx == outcome.marker_line {
                out.push_str(&inject);
                out.push('\n');
            }
        }
        Ok(out)
    }

    /// Scan `path` and commit the annotated file in one rename.
    ///
    /// Nothing is written unless the whole scan succeeds.
    pub fn parse_file(&self, path: &Path) -> crate::Result<ParseOutcome> {
        let text = std::fs::read_to_string(path).map_err(|e| io_error("cannot read trace", path, &e))?;
        let lines: Vec<&str> = text.lines().collect();
        let outcome = self.scan(&lines[..]).inspect_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "trace rejected");
        })?;
        let annotated = self.annotate(&lines[..], &outcome)?;
        write_atomic(path, annotated.as_bytes())
            .map_err(|e| io_error("cannot write parsed trace", path, &e))?;
        tracing::info!(
            path = %path.display(),
            marker_line = outcome.marker_line,
            "trace parsed and annotated"
        );
        Ok(outcome)
    }
}

/// `S215` -> `("S", 215.0)`. The letter is upper-cased.
fn parse_argument(token: &str) -> Option<(String, f64)> {
    let mut chars = token.chars();
    let letter = chars.next().filter(char::is_ascii_alphabetic)?;
    let value: f64 = chars.as_str().parse().ok()?;
    value
        .is_finite()
        .then(|| (letter.to_ascii_uppercase().to_string(), value))
}
