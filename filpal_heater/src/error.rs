use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HeaterError {
    #[error("requested temperature ({target:.1}) out of range ({min:.1}:{max:.1}) for heater {heater}")]
    TargetOutOfRange {
        heater: String,
        target: f64,
        min: f64,
        max: f64,
    },
    #[error("invalid heater setting: {0}")]
    InvalidSetting(String),
    #[error("unknown heater '{0}'")]
    UnknownHeater(String),
}

pub type Result<T> = std::result::Result<T, HeaterError>;
