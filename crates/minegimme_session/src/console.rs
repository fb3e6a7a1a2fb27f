//! Console buffer: the ordered log of server output for one session.
//!
//! Records are only ever appended, in arrival order. Filtering and exporting
//! produce views; they never modify the buffer.

use serde::{Deserialize, Serialize};

/// Default distance from the bottom, in display units, within which the view
/// still counts as following the tail.
pub const DEFAULT_AUTOSCROLL_TOLERANCE: f32 = 50.0;

/// A single line of console output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleRecord {
    /// Wall-clock time as formatted by the producer (e.g. `12:00:01`)
    #[serde(default)]
    pub timestamp: String,
    /// Classification such as `info`, `warning`, `error`, `system`
    #[serde(rename = "type", alias = "category", default = "default_category")]
    pub category: String,
    /// The line itself
    #[serde(default)]
    pub text: String,
}

fn default_category() -> String {
    "default".to_string()
}

impl ConsoleRecord {
    pub fn new(
        timestamp: impl Into<String>,
        category: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            category: category.into(),
            text: text.into(),
        }
    }

    /// Formats the record as one transcript line: `[{timestamp}] [{CATEGORY}] {text}`.
    pub fn transcript_line(&self) -> String {
        format!(
            "[{}] [{}] {}",
            self.timestamp,
            self.category.to_uppercase(),
            self.text
        )
    }

    /// Parses a transcript line produced by [`ConsoleRecord::transcript_line`].
    ///
    /// The transcript uppercases categories, so the original case is lost: the
    /// category comes back lowercased. The backend only emits lowercase
    /// categories, which therefore round-trip exactly.
    pub fn parse_transcript_line(line: &str) -> Option<Self> {
        let rest = line.strip_prefix('[')?;
        let (timestamp, rest) = rest.split_once("] [")?;
        let (category, text) = rest.split_once("] ")?;
        Some(Self::new(timestamp, category.to_lowercase(), text))
    }

    fn matches(&self, needle_lower: &str) -> bool {
        self.text.to_lowercase().contains(needle_lower)
            || self.category.to_lowercase().contains(needle_lower)
    }
}

/// Append-only, arrival-ordered console log.
#[derive(Debug, Default, Clone)]
pub struct ConsoleBuffer {
    records: Vec<ConsoleRecord>,
}

impl ConsoleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ConsoleRecord) {
        self.records.push(record);
    }

    /// Appends a record that originates on this side of the channel, stamped
    /// with the local wall clock in the same format the server uses.
    pub fn push_local(&mut self, category: &str, text: impl Into<String>) -> ConsoleRecord {
        let record = ConsoleRecord::new(
            chrono::Local::now().format("%H:%M:%S").to_string(),
            category,
            text,
        );
        self.records.push(record.clone());
        record
    }

    pub fn records(&self) -> &[ConsoleRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records whose text or category contains `query`, ignoring case.
    ///
    /// An empty query returns every record.
    pub fn filter(&self, query: &str) -> Vec<&ConsoleRecord> {
        if query.is_empty() {
            return self.records.iter().collect();
        }
        let needle = query.to_lowercase();
        self.records.iter().filter(|r| r.matches(&needle)).collect()
    }

    /// Produces a newline-separated transcript of every record.
    pub fn export(&self) -> String {
        self.records
            .iter()
            .map(ConsoleRecord::transcript_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Tail-follow policy for a scrolling console view.
///
/// Following stays on while the view is within `tolerance` of the bottom. Any
/// scroll further up turns it off, and only [`AutoScroll::jump_to_bottom`]
/// turns it back on.
#[derive(Debug, Clone)]
pub struct AutoScroll {
    tolerance: f32,
    enabled: bool,
}

impl Default for AutoScroll {
    fn default() -> Self {
        Self::new(DEFAULT_AUTOSCROLL_TOLERANCE)
    }
}

impl AutoScroll {
    pub fn new(tolerance: f32) -> Self {
        Self {
            tolerance,
            enabled: true,
        }
    }

    /// Reports the view's current distance from the bottom.
    pub fn on_scroll(&mut self, distance_from_bottom: f32) {
        if distance_from_bottom > self.tolerance {
            self.enabled = false;
        }
    }

    pub fn jump_to_bottom(&mut self) {
        self.enabled = true;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}
