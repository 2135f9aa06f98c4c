use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use clap::Parser;
use directories::ProjectDirs;
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    controller::{FrequencyBounds, Thresholds},
    error::ConfigError,
    indicator::{BlinkTiming, LedPaths},
};

pub const DEFAULT_TEMP_PATH: &str = "/sys/class/thermal/thermal_zone0/temp";
pub const DEFAULT_GOVERNOR_PATH: &str = "/sys/devices/system/cpu/cpu0/cpufreq/scaling_governor";
pub const DEFAULT_RED_PATH: &str = "/sys/class/leds/onecloud:red:alive/brightness";
pub const DEFAULT_GREEN_PATH: &str = "/sys/class/leds/onecloud:green:alive/brightness";
pub const DEFAULT_BLUE_PATH: &str = "/sys/class/leds/onecloud:blue:alive/brightness";
pub const DEFAULT_LOG_FILE: &str = "cpu_control.log";
pub const DEFAULT_FREQ_COMMAND: &str = "cpufreq-set";
pub const DEFAULT_GOVERNOR: &str = "ondemand";

pub const DEFAULT_LOW_THRESHOLD: i32 = 42;
pub const DEFAULT_HIGH_THRESHOLD: i32 = 46;
pub const DEFAULT_FLOOR_MHZ: u32 = 400;
pub const DEFAULT_RAISED_CEILING_MHZ: u32 = 1540;
pub const DEFAULT_LOWERED_CEILING_MHZ: u32 = 800;

pub const DEFAULT_INTERVAL_SECS: u64 = 6;
pub const DEFAULT_LOG_MAX_LINES: usize = 500;
pub const DEFAULT_HISTORY_LEN: usize = 5;
pub const DEFAULT_STATS_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_BLINK_ON_MS: u64 = 2000;
pub const DEFAULT_BLINK_OFF_MS: u64 = 1000;

const LOCAL_CONFIG_FILE: &str = "./thermoled.toml";

// --- Config File Struct ---
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub temp_path: Option<PathBuf>,
    pub governor_path: Option<PathBuf>,
    pub led_red_path: Option<PathBuf>,
    pub led_green_path: Option<PathBuf>,
    pub led_blue_path: Option<PathBuf>,
    pub governor: Option<String>,
    pub low_threshold: Option<i32>,
    pub high_threshold: Option<i32>,
    pub floor_mhz: Option<u32>,
    pub raised_ceiling_mhz: Option<u32>,
    pub lowered_ceiling_mhz: Option<u32>,
    pub freq_command: Option<String>,
    pub interval_secs: Option<u64>,
    pub log_file: Option<PathBuf>,
    pub log_max_lines: Option<usize>,
    pub history_len: Option<usize>,
    pub stats_interval_secs: Option<u64>,
    pub stats_file: Option<PathBuf>,
    pub blink_on_ms: Option<u64>,
    pub blink_off_ms: Option<u64>,
}

// --- Command Line Arguments ---
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Throttles CPU frequency by temperature and signals the thermal band on the status LED.", long_about = None)]
pub struct CliArgs {
    /// Optional path to a TOML configuration file.
    #[arg(long, short = 'c', value_name = "FILE_PATH")]
    pub config: Option<PathBuf>,

    /// Seconds between temperature samples (overrides config file).
    #[arg(long, short = 'i', value_name = "SECONDS")]
    pub interval: Option<u64>,

    /// Path of the plain-text event log (overrides config file).
    #[arg(long, value_name = "FILE_PATH")]
    pub log_file: Option<PathBuf>,

    /// Write a JSON stats snapshot here at every checkpoint and on exit.
    #[arg(long, value_name = "FILE_PATH")]
    pub stats_file: Option<PathBuf>,

    /// Do not touch the LED brightness files.
    #[arg(long)]
    pub no_leds: bool,

    /// Sample once, print the report and exit (no LED output).
    #[arg(long)]
    pub once: bool,

    /// Enable debug-level diagnostics on stderr.
    #[arg(long, short, action = clap::ArgAction::SetTrue)]
    pub verbose: bool,
}

/// Fully resolved runtime settings (CLI > file > default).
#[derive(Debug, Clone)]
pub struct Settings {
    pub temp_path: PathBuf,
    pub governor_path: PathBuf,
    pub leds: LedPaths,
    pub leds_enabled: bool,
    pub governor: String,
    pub thresholds: Thresholds,
    pub raise_bounds: FrequencyBounds,
    pub lower_bounds: FrequencyBounds,
    pub freq_command: String,
    pub interval: Duration,
    pub log_file: PathBuf,
    pub log_max_lines: usize,
    pub history_len: usize,
    pub stats_interval_secs: u64,
    pub stats_file: Option<PathBuf>,
    pub blink: BlinkTiming,
    pub once: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings::merge(&CliArgs::default(), FileConfig::default())
    }
}

impl Settings {
    /// Merges CLI arguments over file values over built-in defaults and
    /// validates the result.
    pub fn resolve(cli: &CliArgs, file: FileConfig) -> Result<Self, ConfigError> {
        let settings = Settings::merge(cli, file);
        settings.validate()?;
        Ok(settings)
    }

    fn merge(cli: &CliArgs, file: FileConfig) -> Self {
        Settings {
            temp_path: file
                .temp_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMP_PATH)),
            governor_path: file
                .governor_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_GOVERNOR_PATH)),
            leds: LedPaths {
                red: file
                    .led_red_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_RED_PATH)),
                green: file
                    .led_green_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_GREEN_PATH)),
                blue: file
                    .led_blue_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_BLUE_PATH)),
            },
            leds_enabled: !cli.no_leds,
            governor: file
                .governor
                .unwrap_or_else(|| DEFAULT_GOVERNOR.to_string()),
            thresholds: Thresholds {
                low: file.low_threshold.unwrap_or(DEFAULT_LOW_THRESHOLD),
                high: file.high_threshold.unwrap_or(DEFAULT_HIGH_THRESHOLD),
            },
            raise_bounds: FrequencyBounds {
                min_mhz: file.floor_mhz.unwrap_or(DEFAULT_FLOOR_MHZ),
                max_mhz: file
                    .raised_ceiling_mhz
                    .unwrap_or(DEFAULT_RAISED_CEILING_MHZ),
            },
            lower_bounds: FrequencyBounds {
                min_mhz: file.floor_mhz.unwrap_or(DEFAULT_FLOOR_MHZ),
                max_mhz: file
                    .lowered_ceiling_mhz
                    .unwrap_or(DEFAULT_LOWERED_CEILING_MHZ),
            },
            freq_command: file
                .freq_command
                .unwrap_or_else(|| DEFAULT_FREQ_COMMAND.to_string()),
            interval: Duration::from_secs(
                cli.interval
                    .or(file.interval_secs)
                    .unwrap_or(DEFAULT_INTERVAL_SECS),
            ),
            log_file: cli
                .log_file
                .clone()
                .or(file.log_file)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            log_max_lines: file.log_max_lines.unwrap_or(DEFAULT_LOG_MAX_LINES),
            history_len: file.history_len.unwrap_or(DEFAULT_HISTORY_LEN),
            stats_interval_secs: file
                .stats_interval_secs
                .unwrap_or(DEFAULT_STATS_INTERVAL_SECS),
            stats_file: cli.stats_file.clone().or(file.stats_file),
            blink: BlinkTiming {
                on: Duration::from_millis(file.blink_on_ms.unwrap_or(DEFAULT_BLINK_ON_MS)),
                off: Duration::from_millis(file.blink_off_ms.unwrap_or(DEFAULT_BLINK_OFF_MS)),
            },
            once: cli.once,
        }
    }

    /// Whether the LED thread should run; `--once` never drives the LED.
    pub fn indicator_enabled(&self) -> bool {
        self.leds_enabled && !self.once
    }

    /// Rejects settings the control loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thresholds.low >= self.thresholds.high {
            return Err(ConfigError::Invalid(format!(
                "low_threshold ({}°C) must be less than high_threshold ({}°C)",
                self.thresholds.low, self.thresholds.high
            )));
        }

        for (name, bounds) in [("raise", self.raise_bounds), ("lower", self.lower_bounds)] {
            if bounds.min_mhz > bounds.max_mhz {
                return Err(ConfigError::Invalid(format!(
                    "{} bounds: floor {}MHz exceeds ceiling {}MHz",
                    name, bounds.min_mhz, bounds.max_mhz
                )));
            }
        }

        if self.interval.is_zero() {
            return Err(ConfigError::Invalid(
                "interval must be greater than 0 seconds".to_string(),
            ));
        }
        if self.interval.as_secs() > 3600 {
            warn!("Interval of {} seconds is very long (> 1 hour)", self.interval.as_secs());
        }

        if self.log_max_lines == 0 {
            return Err(ConfigError::Invalid("log_max_lines must be at least 1".to_string()));
        }
        if self.history_len == 0 {
            return Err(ConfigError::Invalid("history_len must be at least 1".to_string()));
        }
        if self.stats_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "stats_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.freq_command.trim().is_empty() {
            return Err(ConfigError::Invalid("freq_command must not be empty".to_string()));
        }
        if self.governor.trim().is_empty() {
            return Err(ConfigError::Invalid("governor must not be empty".to_string()));
        }

        Ok(())
    }
}

/// Finds and loads the configuration file.
///
/// An explicit path must exist. Otherwise the user config directory and the
/// current directory are searched, and a missing file yields the defaults.
pub fn load_config_file(config_path: Option<&Path>) -> Result<FileConfig, ConfigError> {
    let mut config_path_to_load = config_path.map(Path::to_path_buf);

    if config_path_to_load.is_none() {
        if let Some(proj_dirs) = ProjectDirs::from("org", "thermoled", "thermoled") {
            let user_config_path = proj_dirs.config_dir().join("config.toml");
            if user_config_path.exists() {
                info!("Using default config file: {}", user_config_path.display());
                config_path_to_load = Some(user_config_path);
            }
        }

        if config_path_to_load.is_none() {
            let current_dir_path = PathBuf::from(LOCAL_CONFIG_FILE);
            if current_dir_path.exists() {
                info!("Using config file in current dir: {}", current_dir_path.display());
                config_path_to_load = Some(current_dir_path);
            }
        }
    }

    match config_path_to_load {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            toml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
        }
        None => {
            info!("No config file specified or found in default locations.");
            Ok(FileConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_board_layout() {
        let settings = Settings::default();
        assert_eq!(settings.temp_path, PathBuf::from(DEFAULT_TEMP_PATH));
        assert_eq!(settings.thresholds, Thresholds { low: 42, high: 46 });
        assert_eq!(settings.raise_bounds, FrequencyBounds { min_mhz: 400, max_mhz: 1540 });
        assert_eq!(settings.lower_bounds, FrequencyBounds { min_mhz: 400, max_mhz: 800 });
        assert_eq!(settings.log_max_lines, 500);
        assert_eq!(settings.history_len, 5);
        assert_eq!(settings.interval, Duration::from_secs(6));
        assert!(settings.leds_enabled);
    }

    #[test]
    fn cli_overrides_file() {
        let file: FileConfig = toml::from_str(
            r#"
            interval_secs = 30
            log_file = "from-file.log"
            low_threshold = 50
            high_threshold = 60
            "#,
        )
        .unwrap();
        let cli = CliArgs {
            interval: Some(2),
            no_leds: true,
            ..CliArgs::default()
        };

        let settings = Settings::resolve(&cli, file).unwrap();
        assert_eq!(settings.interval, Duration::from_secs(2));
        assert_eq!(settings.log_file, PathBuf::from("from-file.log"));
        assert_eq!(settings.thresholds, Thresholds { low: 50, high: 60 });
        assert!(!settings.leds_enabled);
    }

    #[test]
    fn example_config_matches_defaults() {
        let file: FileConfig = toml::from_str(include_str!("../thermoled.example.toml")).unwrap();
        let settings = Settings::resolve(&CliArgs::default(), file).unwrap();
        let defaults = Settings::default();
        assert_eq!(settings.leds, defaults.leds);
        assert_eq!(settings.thresholds, defaults.thresholds);
        assert_eq!(settings.raise_bounds, defaults.raise_bounds);
        assert_eq!(settings.lower_bounds, defaults.lower_bounds);
        assert_eq!(settings.blink, defaults.blink);
        assert_eq!(settings.log_file, defaults.log_file);
        assert_eq!(settings.stats_file, None);
    }

    #[test]
    fn single_sample_runs_without_leds() {
        assert!(Settings::default().indicator_enabled());

        let cli = CliArgs {
            once: true,
            ..CliArgs::default()
        };
        let settings = Settings::resolve(&cli, FileConfig::default()).unwrap();
        assert!(settings.leds_enabled);
        assert!(!settings.indicator_enabled());

        let cli = CliArgs {
            no_leds: true,
            ..CliArgs::default()
        };
        assert!(!Settings::resolve(&cli, FileConfig::default()).unwrap().indicator_enabled());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let parsed: Result<FileConfig, _> = toml::from_str("fan_speed = 3");
        assert!(parsed.is_err());
    }

    #[test]
    fn inverted_thresholds_are_invalid() {
        let file = FileConfig {
            low_threshold: Some(46),
            high_threshold: Some(46),
            ..FileConfig::default()
        };
        let err = Settings::resolve(&CliArgs::default(), file).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_interval_is_invalid() {
        let cli = CliArgs {
            interval: Some(0),
            ..CliArgs::default()
        };
        assert!(Settings::resolve(&cli, FileConfig::default()).is_err());
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thermoled.toml");
        fs::write(&path, "governor = \"schedutil\"\nhistory_len = 8\n").unwrap();

        let file = load_config_file(Some(&path)).unwrap();
        assert_eq!(file.governor.as_deref(), Some("schedutil"));
        assert_eq!(file.history_len, Some(8));
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_file(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
