//! Host command lines: `VERB KEY=VALUE ...`.
//!
//! The command set is fixed. Keys are case-insensitive; values may be JSON
//! containing spaces as long as brackets and quotes balance.

use std::collections::BTreeMap;

use crate::calibration::CalibrateRequest;
use crate::error::{FilpalError, Result};
use crate::swap::SwapRequest;

/// Arguments of FILPAL_UPDATER.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateRequest {
    pub fila_id: Option<String>,
    pub param: Option<String>,
    pub value: Option<String>,
    /// JSON object of parameter -> value.
    pub params: Option<String>,
    pub lookup: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Calibrate(CalibrateRequest),
    Swap(SwapRequest),
    LoadContinue,
    Parse { file_name: String },
    Inject { parse_vals: String },
    Update(UpdateRequest),
    Revert { heater: Option<String> },
}

impl Command {
    pub const VERBS: &'static [&'static str] = &[
        "FILPAL_CALIBRATE",
        "FILPAL_SWAP",
        "FILPAL_LOAD_CONTINUE",
        "FILPAL_PARSE",
        "FILPAL_INJECTOR",
        "FILPAL_UPDATER",
        "FILPAL_REVERT",
    ];

    pub fn verb(&self) -> &'static str {
        match self {
            Self::Calibrate(_) => "FILPAL_CALIBRATE",
            Self::Swap(_) => "FILPAL_SWAP",
            Self::LoadContinue => "FILPAL_LOAD_CONTINUE",
            Self::Parse { .. } => "FILPAL_PARSE",
            Self::Inject { .. } => "FILPAL_INJECTOR",
            Self::Update(_) => "FILPAL_UPDATER",
            Self::Revert { .. } => "FILPAL_REVERT",
        }
    }
}

/// `KEY=VALUE` arguments with upper-cased keys.
#[derive(Debug, Default)]
pub struct Args(BTreeMap<String, String>);

impl Args {
    pub fn parse(text: &str) -> Result<Self> {
        let mut map = BTreeMap::new();
        for token in split_args(text)? {
            let (k, v) = token.split_once('=').ok_or_else(|| {
                FilpalError::InvalidArgument(format!("malformed argument '{token}', expected KEY=VALUE"))
            })?;
            if k.is_empty() {
                return Err(FilpalError::InvalidArgument(format!("malformed argument '{token}'")));
            }
            map.insert(k.to_ascii_uppercase(), v.to_string());
        }
        Ok(Self(map))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| FilpalError::InvalidArgument(format!("missing required argument {key}")))
    }

    pub fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        self.get(key)
            .map(|v| {
                v.parse::<f64>()
                    .ok()
                    .filter(|x| x.is_finite())
                    .ok_or_else(|| FilpalError::InvalidArgument(format!("{key}={v} is not a number")))
            })
            .transpose()
    }

    pub fn get_u32(&self, key: &str) -> Result<Option<u32>> {
        self.get(key)
            .map(|v| {
                v.parse::<u32>().map_err(|_| {
                    FilpalError::InvalidArgument(format!("{key}={v} is not a whole number"))
                })
            })
            .transpose()
    }

    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key).map(str::to_ascii_lowercase).as_deref() {
            None => Ok(default),
            Some("1" | "true" | "yes") => Ok(true),
            Some("0" | "false" | "no") => Ok(false),
            Some(v) => Err(FilpalError::InvalidArgument(format!("{key}={v} is not a boolean"))),
        }
    }

    fn owned(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_owned)
    }
}

/// Split on whitespace outside of quotes and brackets.
fn split_args(text: &str) -> Result<Vec<&str>> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut quoted = false;
    let mut escaped = false;
    let mut start = None;
    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            '{' | '[' if !quoted => depth += 1,
            '}' | ']' if !quoted => depth -= 1,
            c if c.is_whitespace() && !quoted && depth == 0 => {
                if let Some(s) = start.take() {
                    out.push(&text[s..i]);
                }
                continue;
            }
            _ => {}
        }
        start.get_or_insert(i);
    }
    if quoted || depth != 0 {
        return Err(FilpalError::InvalidArgument(
            "unbalanced quotes or brackets in arguments".into(),
        ));
    }
    if let Some(s) = start {
        out.push(&text[s..]);
    }
    Ok(out)
}

pub fn parse_line(line: &str) -> Result<Command> {
    let line = line.trim();
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let verb = verb.to_ascii_uppercase();
    let args = Args::parse(rest)?;
    let cmd = match verb.as_str() {
        "FILPAL_CALIBRATE" => Command::Calibrate(CalibrateRequest {
            test: args.require("TEST")?.to_string(),
            min: args.get_f64("MIN")?,
            max: args.get_f64("MAX")?,
            filament_type: args.owned("TYPE"),
            bands: args.get_u32("BANDS")?,
        }),
        "FILPAL_SWAP" => Command::Swap(SwapRequest {
            heater: args.owned("HEATER"),
            unload: args.get_bool("UNLOAD", true)?,
            load: args.owned("LOAD"),
            load_temp: args.get_f64("LOAD_TEMP")?,
            unload_temp: args.get_f64("UNLOAD_TEMP")?,
        }),
        "FILPAL_LOAD_CONTINUE" => Command::LoadContinue,
        "FILPAL_PARSE" => Command::Parse {
            file_name: args.require("FILE_NAME")?.to_lowercase(),
        },
        "FILPAL_INJECTOR" => Command::Inject {
            parse_vals: args.require("PARSE_VALS")?.to_string(),
        },
        "FILPAL_UPDATER" => Command::Update(UpdateRequest {
            fila_id: args.owned("FILA_ID"),
            param: args.owned("PARAM"),
            value: args.owned("VALUE"),
            params: args.owned("PARAMS"),
            lookup: args.get_bool("LOOKUP", false)?,
        }),
        "FILPAL_REVERT" => Command::Revert {
            heater: args.owned("HEATER"),
        },
        "" => return Err(FilpalError::InvalidArgument("empty command".into())),
        other => return Err(FilpalError::InvalidArgument(format!("unknown command {other}"))),
    };
    Ok(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn calibrate_arguments() {
        let cmd = parse_line("FILPAL_CALIBRATE TEST=extruder_temp MIN=190 max=230 BANDS=8").unwrap();
        assert_eq!(
            cmd,
            Command::Calibrate(CalibrateRequest {
                test: "extruder_temp".into(),
                min: Some(190.0),
                max: Some(230.0),
                filament_type: None,
                bands: Some(8),
            })
        );
    }

    #[test]
    fn file_name_is_lower_cased() {
        assert_eq!(
            parse_line("filpal_parse FILE_NAME=Cube.GCODE").unwrap(),
            Command::Parse {
                file_name: "cube.gcode".into()
            }
        );
    }

    #[test]
    fn json_values_may_contain_spaces() {
        let cmd = parse_line(r#"FILPAL_UPDATER PARAMS={"filament_type": "PLA CF", "fan_min": 20}"#).unwrap();
        let Command::Update(req) = cmd else {
            panic!("expected update");
        };
        assert_eq!(req.params.as_deref(), Some(r#"{"filament_type": "PLA CF", "fan_min": 20}"#));
    }

    #[test]
    fn swap_defaults_to_unload() {
        let Command::Swap(req) = parse_line("FILPAL_SWAP LOAD=PETG-1").unwrap() else {
            panic!("expected swap");
        };
        assert!(req.unload);
        assert_eq!(req.load.as_deref(), Some("PETG-1"));
    }

    #[rstest]
    #[case("FILPAL_FROB")]
    #[case("")]
    #[case("FILPAL_CALIBRATE")]
    #[case("FILPAL_CALIBRATE TEST=extruder_temp MIN=hot")]
    #[case("FILPAL_CALIBRATE TEST=extruder_temp BANDS=-1")]
    #[case("FILPAL_SWAP UNLOAD=maybe")]
    #[case("FILPAL_PARSE cube.gcode")]
    #[case("FILPAL_INJECTOR parse_vals={\"0\":")]
    fn rejects(#[case] line: &str) {
        assert!(matches!(parse_line(line), Err(FilpalError::InvalidArgument(_))), "{line}");
    }
}
