use std::{
    fs::{self, File},
    io::{self, BufWriter},
    path::Path,
};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::{controller::ThrottleState, history::HistoryRing};

/// Formats a duration in seconds as `HH:MM:SS`.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Renders an optional temperature, `N/A` when nothing was sampled.
pub fn format_temp(temp: Option<i32>) -> String {
    match temp {
        Some(t) => format!("{}°C", t),
        None => "N/A".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ThrottleState,
    pub to: ThrottleState,
}

/// Counters kept for the lifetime of the monitor.
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub started_at: DateTime<Local>,
    pub max_temp: Option<i32>,
    pub min_temp: Option<i32>,
    pub transitions: u64,
    pub last_state: Option<ThrottleState>,
    pub last_checkpoint: DateTime<Local>,
}

impl RunStats {
    pub fn new(started_at: DateTime<Local>) -> Self {
        RunStats {
            started_at,
            max_temp: None,
            min_temp: None,
            transitions: 0,
            last_state: None,
            last_checkpoint: started_at,
        }
    }

    pub fn record_temperature(&mut self, temp: i32) {
        self.max_temp = Some(self.max_temp.map_or(temp, |m| m.max(temp)));
        self.min_temp = Some(self.min_temp.map_or(temp, |m| m.min(temp)));
    }

    /// Feeds the state after an iteration; returns the transition if the
    /// label changed. The first observation never counts.
    pub fn observe_state(&mut self, state: ThrottleState) -> Option<Transition> {
        let previous = self.last_state.replace(state);
        match previous {
            Some(from) if from != state => {
                self.transitions += 1;
                Some(Transition { from, to: state })
            }
            _ => None,
        }
    }

    pub fn elapsed_secs(&self, now: DateTime<Local>) -> i64 {
        (now - self.started_at).num_seconds()
    }

    pub fn checkpoint_due(&self, now: DateTime<Local>, interval_secs: u64) -> bool {
        let since = (now - self.last_checkpoint).num_seconds();
        since >= 0 && since as u64 >= interval_secs
    }

    pub fn mark_checkpoint(&mut self, now: DateTime<Local>) {
        self.last_checkpoint = now;
    }

    pub fn summary_line(&self, now: DateTime<Local>) -> String {
        format!(
            "run stats - elapsed: {}, transitions: {}, max: {}, min: {}",
            format_duration(self.elapsed_secs(now)),
            self.transitions,
            format_temp(self.max_temp),
            format_temp(self.min_temp)
        )
    }
}

#[derive(Serialize)]
struct StatsSnapshot<'a> {
    written_at: DateTime<Local>,
    stats: &'a RunStats,
    state: ThrottleState,
    history: &'a HistoryRing,
}

/// Saves a JSON snapshot atomically via a temporary file.
pub fn save_snapshot(
    path: &Path,
    now: DateTime<Local>,
    stats: &RunStats,
    state: ThrottleState,
    history: &HistoryRing,
) -> Result<(), io::Error> {
    let snapshot = StatsSnapshot {
        written_at: now,
        stats,
        state,
        history,
    };

    let temp_path = path.with_extension("tmp");
    let file = File::create(&temp_path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &snapshot)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("JSON serialization error: {}", e)))?;

    fs::rename(&temp_path, path)?;
    Ok(())
}
