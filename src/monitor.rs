//! The polling loop: sample, decide, indicate, report.

use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::{
    config::Settings,
    controller::{Controller, FrequencyBounds, FrequencyControl},
    eventlog::EventLog,
    history::{HistoryEntry, HistoryRing},
    indicator::{Indication, Indicator},
    report::{self, Report},
    sensors::Sampler,
    stats::{self, RunStats, Transition},
};

pub const SENSOR_UNAVAILABLE: &str = "sensor unavailable";

/// Result of one iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Iteration {
    pub now: DateTime<Local>,
    /// `None` when the sensor could not be read.
    pub temperature_c: Option<i32>,
    pub status: String,
    pub applied: Option<FrequencyBounds>,
    pub transition: Option<Transition>,
    pub indication: Indication,
    pub checkpoint: bool,
}

pub struct Monitor<F: FrequencyControl> {
    settings: Settings,
    sampler: Sampler,
    controller: Controller,
    freq: F,
    indicator: Indicator,
    log: EventLog,
    stats: RunStats,
    history: HistoryRing,
}

impl<F: FrequencyControl> Monitor<F> {
    pub fn new(settings: Settings, freq: F, indicator: Indicator, started_at: DateTime<Local>) -> Self {
        Monitor {
            sampler: Sampler::new(&settings.temp_path, &settings.governor_path),
            controller: Controller::new(
                settings.thresholds,
                settings.governor.clone(),
                settings.raise_bounds,
                settings.lower_bounds,
            ),
            log: EventLog::new(&settings.log_file, settings.log_max_lines),
            stats: RunStats::new(started_at),
            history: HistoryRing::new(settings.history_len),
            freq,
            indicator,
            settings,
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn history(&self) -> &HistoryRing {
        &self.history
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn frequency_control(&self) -> &F {
        &self.freq
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    fn log_event(&self, now: DateTime<Local>, message: &str) {
        if let Err(e) = self.log.append(now, message) {
            warn!("Failed to append to {}: {}", self.log.path().display(), e);
        }
    }

    fn write_snapshot(&self, now: DateTime<Local>) {
        let Some(path) = &self.settings.stats_file else {
            return;
        };
        match stats::save_snapshot(path, now, &self.stats, self.controller.state(), &self.history) {
            Ok(()) => debug!("Stats snapshot written to {}", path.display()),
            Err(e) => warn!("Failed to write stats snapshot {}: {}", path.display(), e),
        }
    }

    pub fn start(&mut self, now: DateTime<Local>) {
        self.log_event(now, "monitor started");
    }

    pub fn finish(&mut self, now: DateTime<Local>) {
        self.log_event(now, "monitor stopped");
        self.write_snapshot(now);
    }

    /// Runs one sample/decide/indicate cycle, plus the periodic checkpoint
    /// when it is due.
    pub fn tick(&mut self, now: DateTime<Local>) -> Iteration {
        let (temperature_c, status, applied, indication) = match self.sampler.sample(now) {
            Ok(sample) => {
                self.stats.record_temperature(sample.temperature_c);
                let decision = self.controller.evaluate(&sample, &mut self.freq);
                let band = self.controller.thresholds().band(sample.temperature_c);
                debug!(
                    "Sampled {}°C ({}), governor {}, state {}",
                    sample.temperature_c,
                    band,
                    sample.governor,
                    decision.state
                );
                (
                    Some(sample.temperature_c),
                    decision.status,
                    decision.applied,
                    Indication::Band(band),
                )
            }
            Err(e) => {
                warn!("Sensor unavailable: {}", e);
                (None, SENSOR_UNAVAILABLE.to_string(), None, Indication::SensorFault)
            }
        };

        let transition = self.stats.observe_state(self.controller.state());
        if let Some(t) = transition {
            info!("Throttle state {} -> {}", t.from, t.to);
            self.log_event(now, &format!("{} → {}", t.from, t.to));
        }

        self.history.push(HistoryEntry {
            timestamp: now,
            temperature_c,
            status: status.clone(),
        });

        self.indicator.set(indication);

        let checkpoint = self.stats.checkpoint_due(now, self.settings.stats_interval_secs);
        if checkpoint {
            self.run_checkpoint(now);
        }

        Iteration {
            now,
            temperature_c,
            status,
            applied,
            transition,
            indication,
            checkpoint,
        }
    }

    fn run_checkpoint(&mut self, now: DateTime<Local>) {
        let summary = self.stats.summary_line(now);
        info!("{}", summary);
        self.log_event(now, &summary);
        self.stats.mark_checkpoint(now);

        match self.log.compact() {
            Ok(0) => {}
            Ok(dropped) => debug!("Compacted {}: dropped {} lines", self.log.path().display(), dropped),
            Err(e) => warn!("Failed to compact {}: {}", self.log.path().display(), e),
        }

        self.write_snapshot(now);
    }

    pub fn render(&self, iteration: &Iteration) -> String {
        report::render(&Report {
            now: iteration.now,
            stats: &self.stats,
            current_temp: iteration.temperature_c,
            status: self.controller.state().steady_status(),
            history: &self.history,
            log_path: self.log.path(),
        })
    }

    /// Runs until `running` is cleared (or once, if configured).
    pub fn run(&mut self, running: &AtomicBool) {
        self.start(Local::now());

        while running.load(Ordering::SeqCst) {
            let iteration = self.tick(Local::now());
            let screen = self.render(&iteration);
            if let Err(e) = report::print_screen(&screen, !self.settings.once) {
                warn!("Failed to draw status screen: {}", e);
            }

            if self.settings.once {
                break;
            }

            // Sleep with periodic checks for exit signal
            let step = Duration::from_millis(200);
            let start = Instant::now();
            while start.elapsed() < self.settings.interval {
                if !running.load(Ordering::SeqCst) {
                    info!("Exit signal received, terminating loop...");
                    break;
                }
                thread::sleep(step.min(self.settings.interval.saturating_sub(start.elapsed())));
            }
        }

        self.finish(Local::now());
    }
}
