//! Human-readable error descriptions and structured JSON error formatting.

use filpal_core::{FilpalError, FitError, ParseError};
use filpal_heater::HeaterError;

fn explain(what: &str, causes: &str, fix: &str) -> String {
    format!("What happened: {what}\nLikely causes: {causes}\nHow to fix: {fix}")
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(fe) = err.downcast_ref::<FilpalError>() {
        return match fe {
            FilpalError::Config(msg) => explain(
                &format!("Invalid configuration ({msg})."),
                "Missing [paths] or [parse_commands], or an out-of-range value in the TOML.",
                "Edit the config file, then rerun. See etc/filpal.toml for a sample.",
            ),
            FilpalError::NotFound(id) => explain(
                &format!("No filament profile named '{id}'."),
                "The id is misspelled or the profile was never created.",
                "Check the ids with `filpal show`, or create it by loading it with FILPAL_SWAP LOAD=<id>.",
            ),
            FilpalError::NoLoadedFilament => explain(
                "No filament is loaded.",
                "The parameter file has no [loaded] section yet.",
                "Run FILPAL_SWAP LOAD=<id>, or FILPAL_UPDATER with FILA_ID.",
            ),
            FilpalError::UnknownTest(name) => explain(
                &format!("Test '{name}' is not a calibration test."),
                "Misspelled TEST name.",
                "Use one of extruder_temp, bed_temp, z_offset, flowrate, fan_speed, retraction.",
            ),
            FilpalError::TestNotFound(name) => explain(
                &format!("No calibration file for test '{name}'."),
                "The SD card has neither <test>_<type>.gcode nor <test>.gcode.",
                "Copy the calibration gcode into paths.sdcard_dir.",
            ),
            FilpalError::Parse(ParseError::AlreadyParsed) => explain(
                "The file was already parsed.",
                "Its first line carries the parsed marker.",
                "Print it as is; the injected FILPAL_INJECTOR line already holds the values.",
            ),
            FilpalError::Parse(ParseError::MissingMarker(marker)) => explain(
                &format!("The file has no {marker} line."),
                "The slicer start gcode does not call the print-start macro.",
                &format!("Add {marker} to the slicer start gcode, or set trace.print_start_marker."),
            ),
            FilpalError::Parse(pe) => explain(
                &format!("The file could not be parsed ({pe})."),
                "A tracked command carries a non-numeric argument.",
                "Fix the offending line in the gcode and parse again.",
            ),
            FilpalError::Fit(FitError::UnsupportedCardinality { .. }) => explain(
                &format!("No correction could be fitted ({fe})."),
                "The profile series and the traced series cannot be paired.",
                "Record one target per traced value, or a single target.",
            ),
            FilpalError::Fit(_) => explain(
                &format!("No correction could be fitted ({fe})."),
                "Non-finite values or a degenerate series.",
                "Check the profile series with FILPAL_UPDATER LOOKUP=1.",
            ),
            FilpalError::UnrecognizedParameter(key) => explain(
                &format!("The parameter '{key}' is not recognized."),
                "Misspelled parameter name.",
                "Use a known parameter such as hotend_current_temp, fan_min or M104.",
            ),
            FilpalError::State(msg) => explain(
                &format!("Command not valid now ({msg})."),
                "A swap is in progress, or there is nothing to continue or revert.",
                "Finish or restart the swap sequence.",
            ),
            FilpalError::Io(msg) => explain(
                &format!("File access failed ({msg})."),
                "Missing directory or insufficient permissions.",
                "Check paths.params_file and paths.sdcard_dir.",
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(HeaterError::TargetOutOfRange { .. }) = err.downcast_ref::<HeaterError>() {
        return explain(
            &format!("{err}."),
            "A profile or command temperature beyond the heater limits.",
            "Correct the temperature in the filament profile.",
        );
    }

    if err.downcast_ref::<toml::de::Error>().is_some() {
        return explain(
            "The config file is not valid TOML.",
            "A typo or a value of the wrong type.",
            &format!("Fix the config file. Parser said: {err:#}"),
        );
    }

    // Generic fallback
    let msg = err.to_string();
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable reason names for JSON output.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<FilpalError>() {
        Some(FilpalError::Config(_)) => "Config",
        Some(FilpalError::NotFound(_)) => "NotFound",
        Some(FilpalError::UnknownTest(_)) => "UnknownTest",
        Some(FilpalError::TestNotFound(_)) => "TestNotFound",
        Some(FilpalError::Parse(_)) => "Parse",
        Some(FilpalError::Fit(_)) => "Fit",
        Some(FilpalError::UnrecognizedParameter(_)) => "UnrecognizedParameter",
        Some(FilpalError::NoLoadedFilament) => "NoLoadedFilament",
        Some(FilpalError::InvalidArgument(_)) => "InvalidArgument",
        Some(FilpalError::State(_)) => "State",
        Some(FilpalError::Io(_)) => "Io",
        Some(FilpalError::Host(_)) => "Host",
        None => "Error",
    }
}

/// Stable exit codes per error kind; anything untyped returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<FilpalError>() {
        Some(FilpalError::Config(_)) => 3,
        Some(FilpalError::NotFound(_) | FilpalError::NoLoadedFilament) => 4,
        Some(FilpalError::UnknownTest(_) | FilpalError::TestNotFound(_)) => 5,
        Some(FilpalError::Parse(_)) => 6,
        Some(FilpalError::Fit(_)) => 7,
        Some(FilpalError::UnrecognizedParameter(_) | FilpalError::InvalidArgument(_)) => 8,
        Some(FilpalError::State(_)) => 9,
        Some(FilpalError::Io(_)) => 10,
        Some(FilpalError::Host(_)) => 11,
        None => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
