use std::{io, path::PathBuf, process::ExitStatus};

/// The temperature or governor node could not be read.
#[derive(thiserror::Error, Debug)]
pub enum SensorError {
    #[error("failed to read temperature from {path}: {source}")]
    TemperatureUnreadable { path: PathBuf, source: io::Error },

    #[error("malformed temperature value '{raw}' in {path}")]
    TemperatureMalformed { path: PathBuf, raw: String },

    #[error("failed to read governor from {path}: {source}")]
    GovernorUnreadable { path: PathBuf, source: io::Error },

    #[error("governor file {path} is empty")]
    GovernorEmpty { path: PathBuf },
}

/// The frequency-control command did not apply the requested bounds.
#[derive(thiserror::Error, Debug)]
pub enum FrequencyError {
    #[error("failed to run '{command}': {source}")]
    Spawn { command: String, source: io::Error },

    #[error("'{command}' exited with {status}")]
    ExitStatus { command: String, status: ExitStatus },
}

#[derive(thiserror::Error, Debug)]
#[error("failed to write brightness {value} to {path}: {source}")]
pub struct LedError {
    pub path: PathBuf,
    pub value: u8,
    pub source: io::Error,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
