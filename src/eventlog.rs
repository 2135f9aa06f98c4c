//! Append-only, human-readable event log with a line cap.

use std::{
    collections::VecDeque,
    fs::{self, File, OpenOptions},
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};

/// ctime-style wall clock, e.g. `Fri Oct 16 09:15:02 2026`.
pub const TIMESTAMP_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

pub fn format_timestamp(ts: DateTime<Local>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Keeps the trailing `max_lines` of `lines`, returning them with the total
/// number of lines read.
pub fn tail_lines<I>(lines: I, max_lines: usize) -> (VecDeque<String>, usize)
where
    I: IntoIterator<Item = String>,
{
    let mut kept = VecDeque::with_capacity(max_lines + 1);
    let mut total = 0;
    for line in lines {
        total += 1;
        kept.push_back(line);
        if kept.len() > max_lines {
            kept.pop_front();
        }
    }
    (kept, total)
}

#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
    max_lines: usize,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>, max_lines: usize) -> Self {
        EventLog {
            path: path.into(),
            max_lines,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `[<timestamp>] <message>`.
    pub fn append(&self, now: DateTime<Local>, message: &str) -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "[{}] {}", format_timestamp(now), message)
    }

    /// Rewrites the log with only its trailing lines when it is over the cap.
    /// Returns the number of lines dropped.
    pub fn compact(&self) -> io::Result<usize> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let lines = BufReader::new(file).lines().collect::<io::Result<Vec<String>>>()?;
        let (kept, total) = tail_lines(lines, self.max_lines);

        if total <= self.max_lines {
            return Ok(0);
        }

        let temp_path = self.path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&temp_path)?);
            for line in &kept {
                writeln!(writer, "{}", line)?;
            }
            writer.flush()?;
        }
        fs::rename(&temp_path, &self.path)?;

        Ok(total - kept.len())
    }
}
