use std::collections::VecDeque;

use chrono::{DateTime, Local};

const DEFAULT_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Error,
}

#[derive(Debug, Clone)]
pub struct StatusEntry {
    pub at: DateTime<Local>,
    pub level: StatusLevel,
    pub text: String,
}

impl StatusEntry {
    pub fn display(&self) -> String {
        format!("[{}] {}", self.at.format("%H:%M:%S"), self.text)
    }
}

/// Timestamped reports of what the controllers did or failed to do
#[derive(Debug, Clone)]
pub struct StatusLog {
    entries: VecDeque<StatusEntry>,
    capacity: usize,
}

impl Default for StatusLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl StatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity: capacity.max(1),
        }
    }

    pub fn info(&mut self, text: impl Into<String>) {
        let text = text.into();
        tracing::info!("{text}");
        self.push(StatusLevel::Info, text);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        let text = text.into();
        tracing::warn!("{text}");
        self.push(StatusLevel::Error, text);
    }

    fn push(&mut self, level: StatusLevel, text: String) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(StatusEntry {
            at: Local::now(),
            level,
            text,
        });
    }

    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &StatusEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&StatusEntry> {
        self.entries.back()
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

    #[test]
    fn test_oldest_entries_fall_off() {
        let mut log = StatusLog::with_capacity(2);
        log.info("one");
        log.error("two");
        log.info("three");
        let texts: Vec<_> = log.entries().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["two", "three"]);
        assert_eq!(log.latest().unwrap().level, StatusLevel::Info);
    }
}
