//! Tri-colour status LED driven through sysfs brightness files.
//!
//! The blink pattern runs on its own thread so the polling interval is not
//! tied to how long the LED takes to cycle. The monitor sends the current
//! indication over a channel; a change restarts the pattern, a repeat is
//! ignored. Dropping the [`Indicator`] switches the LED off and joins the
//! thread.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::mpsc::{self, RecvTimeoutError, Sender},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use tracing::{debug, warn};

use crate::{controller::Band, error::LedError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedPaths {
    pub red: PathBuf,
    pub green: PathBuf,
    pub blue: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    pub const OFF: Color = Color { red: 0, green: 0, blue: 0 };
    pub const GREEN: Color = Color { red: 0, green: 255, blue: 0 };
    pub const YELLOW: Color = Color { red: 255, green: 255, blue: 0 };
    pub const RED: Color = Color { red: 255, green: 0, blue: 0 };
    pub const BLUE: Color = Color { red: 0, green: 0, blue: 255 };
}

/// What the LED should be telling the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indication {
    Band(Band),
    /// The temperature could not be read.
    SensorFault,
}

impl Indication {
    pub fn color(self) -> Color {
        match self {
            Indication::Band(Band::Cool) => Color::GREEN,
            Indication::Band(Band::Moderate) => Color::YELLOW,
            Indication::Band(Band::Hot) => Color::RED,
            Indication::SensorFault => Color::BLUE,
        }
    }
}

impl From<Band> for Indication {
    fn from(band: Band) -> Self {
        Indication::Band(band)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkTiming {
    pub on: Duration,
    pub off: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkStep {
    pub color: Color,
    pub hold: Duration,
}

/// On, off, on, off.
pub fn blink_sequence(color: Color, timing: BlinkTiming) -> [BlinkStep; 4] {
    let on = BlinkStep { color, hold: timing.on };
    let off = BlinkStep {
        color: Color::OFF,
        hold: timing.off,
    };
    [on, off, on, off]
}

fn write_brightness(path: &Path, value: u8) -> Result<(), LedError> {
    fs::write(path, value.to_string()).map_err(|source| LedError {
        path: path.to_path_buf(),
        value,
        source,
    })
}

#[derive(Debug, Clone)]
pub struct LedBank {
    paths: LedPaths,
}

impl LedBank {
    pub fn new(paths: LedPaths) -> Self {
        LedBank { paths }
    }

    /// Writes all three channels. Each write is attempted even if an earlier
    /// one failed; returns `false` if any of them did.
    pub fn show(&self, color: Color) -> bool {
        let mut ok = true;
        for (path, value) in [
            (&self.paths.red, color.red),
            (&self.paths.blue, color.blue),
            (&self.paths.green, color.green),
        ] {
            if let Err(e) = write_brightness(path, value) {
                warn!("{}", e);
                ok = false;
            }
        }
        ok
    }
}

/// Handle to the LED thread.
pub struct Indicator {
    tx: Option<Sender<Indication>>,
    handle: Option<JoinHandle<()>>,
}

impl Indicator {
    pub fn spawn(bank: LedBank, timing: BlinkTiming) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Indication>();
        let handle = thread::Builder::new()
            .name("indicator".to_string())
            .spawn(move || {
                let Ok(mut current) = rx.recv() else {
                    bank.show(Color::OFF);
                    return;
                };

                'pattern: loop {
                    for step in blink_sequence(current.color(), timing) {
                        bank.show(step.color);
                        // Repeats of the current indication must not cut the hold short.
                        let deadline = Instant::now() + step.hold;
                        loop {
                            match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                                Ok(next) if next != current => {
                                    debug!("Indicator switching to {:?}", next);
                                    current = next;
                                    continue 'pattern;
                                }
                                Ok(_) => {}
                                Err(RecvTimeoutError::Timeout) => break,
                                Err(RecvTimeoutError::Disconnected) => break 'pattern,
                            }
                        }
                    }
                }

                bank.show(Color::OFF);
            })?;

        Ok(Indicator {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    /// An indicator that ignores every update.
    pub fn disabled() -> Self {
        Indicator {
            tx: None,
            handle: None,
        }
    }

    pub fn set(&self, indication: Indication) {
        if let Some(tx) = &self.tx {
            if tx.send(indication).is_err() {
                warn!("Indicator thread is gone; LED update dropped");
            }
        }
    }
}

impl Drop for Indicator {
    fn drop(&mut self) {
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Indicator thread panicked");
            }
        }
    }
}
