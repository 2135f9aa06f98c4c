use std::collections::VecDeque;

use chrono::{DateTime, Local};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Local>,
    /// `None` when the sensor could not be read.
    pub temperature_c: Option<i32>,
    pub status: String,
}

/// The most recent readings, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryRing {
    entries: VecDeque<HistoryEntry>,
    #[serde(skip)]
    capacity: usize,
}

impl HistoryRing {
    pub fn new(capacity: usize) -> Self {
        HistoryRing {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(temp: i32) -> HistoryEntry {
        HistoryEntry {
            timestamp: Local::now(),
            temperature_c: Some(temp),
            status: "raising".to_string(),
        }
    }

    #[test]
    fn keeps_last_five_oldest_first() {
        let mut ring = HistoryRing::new(5);
        for t in 1..=7 {
            ring.push(entry(t));
        }
        let temps: Vec<Option<i32>> = ring.iter().map(|e| e.temperature_c).collect();
        assert_eq!(temps, [3, 4, 5, 6, 7].map(Some));
    }

    #[test]
    fn short_history_is_kept_whole() {
        let mut ring = HistoryRing::new(5);
        assert!(ring.is_empty());
        ring.push(entry(40));
        ring.push(entry(41));
        assert_eq!(ring.len(), 2);
    }
}
