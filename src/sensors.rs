use std::{
    fs, io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};

use crate::error::SensorError;

/// One reading of the thermal zone and the active governor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThermalSample {
    pub timestamp: DateTime<Local>,
    /// Whole degrees Celsius.
    pub temperature_c: i32,
    pub governor: String,
}

/// Reads a sysfs temperature node (milli-degrees) as whole degrees,
/// truncating toward zero.
pub fn read_temperature(path: impl AsRef<Path>) -> Result<i32, SensorError> {
    let path = path.as_ref();
    let raw_value_str = fs::read_to_string(path).map_err(|source| SensorError::TemperatureUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = raw_value_str.trim();
    match raw.parse::<i32>() {
        Ok(milli) => Ok(milli / 1000),
        Err(_) => Err(SensorError::TemperatureMalformed {
            path: path.to_path_buf(),
            raw: raw.to_string(),
        }),
    }
}

/// Reads the first whitespace-delimited token of the governor node.
pub fn read_governor(path: impl AsRef<Path>) -> Result<String, SensorError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| SensorError::GovernorUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    contents
        .split_whitespace()
        .next()
        .map(str::to_string)
        .ok_or_else(|| SensorError::GovernorEmpty {
            path: path.to_path_buf(),
        })
}

#[derive(Debug, Clone)]
pub struct Sampler {
    temp_path: PathBuf,
    governor_path: PathBuf,
}

impl Sampler {
    pub fn new(temp_path: impl Into<PathBuf>, governor_path: impl Into<PathBuf>) -> Self {
        Sampler {
            temp_path: temp_path.into(),
            governor_path: governor_path.into(),
        }
    }

    pub fn sample(&self, now: DateTime<Local>) -> Result<ThermalSample, SensorError> {
        Ok(ThermalSample {
            timestamp: now,
            temperature_c: read_temperature(&self.temp_path)?,
            governor: read_governor(&self.governor_path)?,
        })
    }

    /// Fails early when a node is missing, so a misconfigured path shows up
    /// at startup rather than as a stream of unavailable samples.
    pub fn check_paths(&self) -> io::Result<()> {
        for path in [&self.temp_path, &self.governor_path] {
            if !path.exists() {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("sensor path does not exist: {}", path.display()),
                ));
            }
        }
        Ok(())
    }
}
