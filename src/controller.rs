//! Hysteresis controller for the CPU frequency bounds.
//!
//! Two thresholds split the temperature range into cool, moderate and hot
//! bands. Entering the cool band raises the frequency ceiling, entering the
//! hot band lowers it. The moderate band never changes anything, so the last
//! applied bounds hold until the opposite threshold is crossed.

use std::{fmt, process::Command};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{error::FrequencyError, sensors::ThermalSample};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Temperatures at or below this are cool.
    pub low: i32,
    /// Temperatures at or above this are hot.
    pub high: i32,
}

/// Coarse temperature band used to pick the LED colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Cool,
    Moderate,
    Hot,
}

impl Thresholds {
    pub fn band(&self, temp_c: i32) -> Band {
        if temp_c <= self.low {
            Band::Cool
        } else if temp_c >= self.high {
            Band::Hot
        } else {
            Band::Moderate
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Band::Cool => write!(f, "cool"),
            Band::Moderate => write!(f, "moderate"),
            Band::Hot => write!(f, "hot"),
        }
    }
}

/// Which frequency bounds were applied last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThrottleState {
    /// Nothing applied yet; both transitions are armed.
    #[default]
    Initial,
    /// The raised ceiling is in effect.
    Raising,
    /// The lowered ceiling is in effect.
    Lowering,
}

impl ThrottleState {
    /// Short label used for transition counting and the event log.
    pub fn label(self) -> &'static str {
        match self {
            ThrottleState::Initial => "initial",
            ThrottleState::Raising => "raising",
            ThrottleState::Lowering => "lowering",
        }
    }

    /// Status shown when an iteration leaves the bounds untouched.
    pub fn steady_status(self) -> &'static str {
        match self {
            ThrottleState::Initial => "initial state",
            ThrottleState::Raising => "raising",
            ThrottleState::Lowering => "lowering",
        }
    }
}

impl fmt::Display for ThrottleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyBounds {
    pub min_mhz: u32,
    pub max_mhz: u32,
}

/// Applies CPU frequency bounds.
pub trait FrequencyControl {
    fn apply(&mut self, bounds: FrequencyBounds) -> Result<(), FrequencyError>;
}

/// Runs `cpufreq-set` (or a compatible tool) as `<cmd> -d <min>MHz -u <max>MHz`.
#[derive(Debug, Clone)]
pub struct CpufreqSet {
    command: String,
}

impl CpufreqSet {
    pub fn new(command: impl Into<String>) -> Self {
        CpufreqSet {
            command: command.into(),
        }
    }

    pub fn args(bounds: FrequencyBounds) -> [String; 4] {
        [
            "-d".to_string(),
            format!("{}MHz", bounds.min_mhz),
            "-u".to_string(),
            format!("{}MHz", bounds.max_mhz),
        ]
    }
}

impl FrequencyControl for CpufreqSet {
    fn apply(&mut self, bounds: FrequencyBounds) -> Result<(), FrequencyError> {
        let args = Self::args(bounds);
        debug!("Running {} {}", self.command, args.join(" "));

        let status = Command::new(&self.command)
            .args(&args)
            .status()
            .map_err(|source| FrequencyError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(FrequencyError::ExitStatus {
                command: self.command.clone(),
                status,
            })
        }
    }
}

/// What one controller evaluation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Bounds that were successfully applied this iteration, if any.
    pub applied: Option<FrequencyBounds>,
    /// Human-readable status for the screen and history.
    pub status: String,
    /// State after this evaluation.
    pub state: ThrottleState,
}

#[derive(Debug, Clone)]
pub struct Controller {
    thresholds: Thresholds,
    governor: String,
    raise_bounds: FrequencyBounds,
    lower_bounds: FrequencyBounds,
    state: ThrottleState,
}

impl Controller {
    pub fn new(
        thresholds: Thresholds,
        governor: impl Into<String>,
        raise_bounds: FrequencyBounds,
        lower_bounds: FrequencyBounds,
    ) -> Self {
        Controller {
            thresholds,
            governor: governor.into(),
            raise_bounds,
            lower_bounds,
            state: ThrottleState::Initial,
        }
    }

    pub fn state(&self) -> ThrottleState {
        self.state
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Evaluates one sample, invoking `freq` at most once.
    ///
    /// A failed invocation leaves the state untouched so the next qualifying
    /// sample tries again.
    pub fn evaluate(&mut self, sample: &ThermalSample, freq: &mut dyn FrequencyControl) -> Decision {
        let eligible = sample.governor == self.governor;
        let temp = sample.temperature_c;

        let target = if eligible && temp <= self.thresholds.low && self.state != ThrottleState::Raising {
            Some((ThrottleState::Raising, self.raise_bounds))
        } else if eligible && temp >= self.thresholds.high && self.state != ThrottleState::Lowering {
            Some((ThrottleState::Lowering, self.lower_bounds))
        } else {
            None
        };

        let Some((next, bounds)) = target else {
            return Decision {
                applied: None,
                status: self.state.steady_status().to_string(),
                state: self.state,
            };
        };

        match freq.apply(bounds) {
            Ok(()) => {
                info!(
                    "{}°C: frequency bounds set to {}-{}MHz ({} -> {})",
                    temp, bounds.min_mhz, bounds.max_mhz, self.state, next
                );
                self.state = next;
                let status = match next {
                    ThrottleState::Lowering => {
                        format!("lowered frequency ceiling to {}MHz", bounds.max_mhz)
                    }
                    _ => format!("raised frequency ceiling to {}MHz", bounds.max_mhz),
                };
                Decision {
                    applied: Some(bounds),
                    status,
                    state: self.state,
                }
            }
            Err(e) => {
                warn!("Failed to apply frequency bounds at {}°C: {}", temp, e);
                Decision {
                    applied: None,
                    status: "frequency change failed".to_string(),
                    state: self.state,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    /// Records every requested bounds change; optionally fails them.
    #[derive(Default)]
    struct RecordingControl {
        calls: Vec<FrequencyBounds>,
        fail: bool,
    }

    impl FrequencyControl for RecordingControl {
        fn apply(&mut self, bounds: FrequencyBounds) -> Result<(), FrequencyError> {
            self.calls.push(bounds);
            if self.fail {
                Err(FrequencyError::Spawn {
                    command: "cpufreq-set".to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                })
            } else {
                Ok(())
            }
        }
    }

    fn sample(temp: i32, governor: &str) -> ThermalSample {
        ThermalSample {
            timestamp: Local::now(),
            temperature_c: temp,
            governor: governor.to_string(),
        }
    }

    fn controller() -> Controller {
        Controller::new(
            Thresholds { low: 42, high: 46 },
            "ondemand",
            FrequencyBounds { min_mhz: 400, max_mhz: 1540 },
            FrequencyBounds { min_mhz: 400, max_mhz: 800 },
        )
    }

    #[test]
    fn bands_split_at_thresholds() {
        let t = Thresholds { low: 42, high: 46 };
        assert_eq!(t.band(42), Band::Cool);
        assert_eq!(t.band(43), Band::Moderate);
        assert_eq!(t.band(45), Band::Moderate);
        assert_eq!(t.band(46), Band::Hot);
        assert_eq!(t.band(-5), Band::Cool);
    }

    #[test]
    fn cool_then_hot_applies_each_bound_once() {
        let mut c = controller();
        let mut freq = RecordingControl::default();

        let d = c.evaluate(&sample(40, "ondemand"), &mut freq);
        assert_eq!(d.state, ThrottleState::Raising);
        assert_eq!(d.status, "raised frequency ceiling to 1540MHz");
        assert_eq!(freq.calls, vec![FrequencyBounds { min_mhz: 400, max_mhz: 1540 }]);

        let d = c.evaluate(&sample(50, "ondemand"), &mut freq);
        assert_eq!(d.state, ThrottleState::Lowering);
        assert_eq!(d.status, "lowered frequency ceiling to 800MHz");
        assert_eq!(freq.calls.len(), 2);
        assert_eq!(freq.calls[1], FrequencyBounds { min_mhz: 400, max_mhz: 800 });
    }

    #[test]
    fn latched_state_suppresses_repeats() {
        let mut c = controller();
        let mut freq = RecordingControl::default();

        c.evaluate(&sample(50, "ondemand"), &mut freq);
        let d = c.evaluate(&sample(55, "ondemand"), &mut freq);
        assert_eq!(d.applied, None);
        assert_eq!(d.status, "lowering");

        let d = c.evaluate(&sample(44, "ondemand"), &mut freq);
        assert_eq!(d.applied, None);
        assert_eq!(freq.calls.len(), 1);

        // High transition re-arms the low one.
        let d = c.evaluate(&sample(41, "ondemand"), &mut freq);
        assert_eq!(d.state, ThrottleState::Raising);
        assert_eq!(freq.calls.len(), 2);
    }

    #[test]
    fn other_governors_are_left_alone() {
        let mut c = controller();
        let mut freq = RecordingControl::default();

        for t in [0, 40, 42, 44, 46, 80] {
            let d = c.evaluate(&sample(t, "performance"), &mut freq);
            assert_eq!(d.status, "initial state");
        }
        assert!(freq.calls.is_empty());
        assert_eq!(c.state(), ThrottleState::Initial);
    }

    #[test]
    fn failed_command_is_retried_next_sample() {
        let mut c = controller();
        let mut freq = RecordingControl {
            fail: true,
            ..Default::default()
        };

        let d = c.evaluate(&sample(40, "ondemand"), &mut freq);
        assert_eq!(d.state, ThrottleState::Initial);
        assert_eq!(d.status, "frequency change failed");
        assert_eq!(d.applied, None);

        freq.fail = false;
        let d = c.evaluate(&sample(40, "ondemand"), &mut freq);
        assert_eq!(d.state, ThrottleState::Raising);
        assert_eq!(freq.calls.len(), 2);
    }

    #[test]
    fn cpufreq_args_use_mhz_suffix() {
        let args = CpufreqSet::args(FrequencyBounds { min_mhz: 400, max_mhz: 800 });
        assert_eq!(args, ["-d", "400MHz", "-u", "800MHz"].map(String::from));
    }

    #[test]
    fn missing_command_is_a_spawn_error() {
        let mut freq = CpufreqSet::new("/nonexistent/thermoled-cpufreq-set");
        let err = freq
            .apply(FrequencyBounds { min_mhz: 400, max_mhz: 800 })
            .unwrap_err();
        assert!(matches!(err, FrequencyError::Spawn { .. }));
    }

    #[test]
    fn non_zero_exit_is_reported() {
        let mut freq = CpufreqSet::new("false");
        let err = freq
            .apply(FrequencyBounds { min_mhz: 400, max_mhz: 800 })
            .unwrap_err();
        assert!(matches!(err, FrequencyError::ExitStatus { .. }));
    }
}
