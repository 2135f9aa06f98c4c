use std::{
    io::{self, Write},
    path::Path,
};

use chrono::{DateTime, Local};

use crate::{
    eventlog::format_timestamp,
    history::HistoryRing,
    stats::{RunStats, format_duration, format_temp},
};

const RULE: &str = "=====================================";
const THIN_RULE: &str = "-------------------------------------";
const CLEAR_SCREEN: &str = "\x1B[2J\x1B[H";

/// Everything the status screen shows for one iteration.
pub struct Report<'a> {
    pub now: DateTime<Local>,
    pub stats: &'a RunStats,
    pub current_temp: Option<i32>,
    /// Label of the throttle state currently in effect.
    pub status: &'a str,
    pub history: &'a HistoryRing,
    pub log_path: &'a Path,
}

pub fn render(report: &Report<'_>) -> String {
    let stats = report.stats;

    let mut lines = vec![
        format!("[{}] CPU temperature monitor", format_timestamp(report.now)),
        RULE.to_string(),
        format!("Started:      {}", format_timestamp(stats.started_at)),
        format!("Run time:     {}", format_duration(stats.elapsed_secs(report.now))),
        format!("Transitions:  {}", stats.transitions),
        format!("Max temp:     {}", format_temp(stats.max_temp)),
        format!("Min temp:     {}", format_temp(stats.min_temp)),
        THIN_RULE.to_string(),
        format!("Current temp: {}", format_temp(report.current_temp)),
        format!("Status:       {}", report.status),
        String::new(),
        format!("Last {} readings:", report.history.len()),
        format!("{:<26} {:>6}   {}", "Time", "Temp", "Status"),
        THIN_RULE.to_string(),
    ];
    lines.extend(report.history.iter().map(|entry| {
        format!(
            "{:<26} {:>6}   {}",
            format_timestamp(entry.timestamp),
            format_temp(entry.temperature_c),
            entry.status
        )
    }));
    lines.push(String::new());
    lines.push(format!("Log file: {}", report.log_path.display()));
    lines.push(RULE.to_string());

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Prints the rendered screen, optionally clearing the terminal first.
pub fn print_screen(screen: &str, clear: bool) -> io::Result<()> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    if clear {
        lock.write_all(CLEAR_SCREEN.as_bytes())?;
    }
    lock.write_all(screen.as_bytes())?;
    lock.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryEntry;
    use chrono::TimeDelta;

    #[test]
    fn empty_run_reports_na() {
        let now = Local::now();
        let stats = RunStats::new(now);
        let history = HistoryRing::new(5);
        let screen = render(&Report {
            now,
            stats: &stats,
            current_temp: None,
            status: "initial state",
            history: &history,
            log_path: Path::new("cpu_control.log"),
        });

        assert!(screen.contains("Max temp:     N/A"));
        assert!(screen.contains("Min temp:     N/A"));
        assert!(screen.contains("Run time:     00:00:00"));
        assert!(screen.contains("Status:       initial state"));
        assert!(screen.contains("Log file: cpu_control.log"));
    }

    #[test]
    fn history_rows_are_listed_in_order() {
        let start = Local::now();
        let now = start + TimeDelta::seconds(3661);
        let mut stats = RunStats::new(start);
        stats.record_temperature(44);
        stats.record_temperature(39);

        let mut history = HistoryRing::new(5);
        for (temp, status) in [(Some(44), "initial state"), (None, "sensor unavailable"), (Some(39), "raising")] {
            history.push(HistoryEntry {
                timestamp: now,
                temperature_c: temp,
                status: status.to_string(),
            });
        }

        let screen = render(&Report {
            now,
            stats: &stats,
            current_temp: Some(39),
            status: "raising",
            history: &history,
            log_path: Path::new("cpu_control.log"),
        });

        assert!(screen.contains("Run time:     01:01:01"));
        assert!(screen.contains("Max temp:     44°C"));
        assert!(screen.contains("Current temp: 39°C"));
        assert!(screen.ends_with(&format!("{}\n", RULE)));
        let first = screen.find("initial state").unwrap();
        let second = screen.find("sensor unavailable").unwrap();
        let third = screen.rfind("raising").unwrap();
        assert!(first < second && second < third);
    }
}
