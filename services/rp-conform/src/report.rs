//! Conformance report
//!
//! Every observation a tester makes becomes a [`ReportEntry`]. Entries are
//! mirrored to `tracing` as they are recorded so a run can be followed live.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Classification of a single observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    Issue,
    Info,
    Debug,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ok => write!(f, "OK"),
            Outcome::Issue => write!(f, "ISSUE"),
            Outcome::Info => write!(f, "INFO"),
            Outcome::Debug => write!(f, "DEBUG"),
        }
    }
}

/// One observation about one interface member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub outcome: Outcome,
    pub test: String,
    pub message: String,
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<28} {:<6} {}", self.test, self.outcome, self.message)
    }
}

/// Accumulated results of a conformance run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Report {
    pub device: String,
    pub entries: Vec<ReportEntry>,
    pub cancelled: bool,
}

impl Report {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            entries: Vec::new(),
            cancelled: false,
        }
    }

    pub fn record(&mut self, outcome: Outcome, test: &str, message: impl Into<String>) {
        let entry = ReportEntry {
            outcome,
            test: test.to_string(),
            message: message.into(),
        };
        match outcome {
            Outcome::Ok => tracing::info!("{}", entry),
            Outcome::Issue => tracing::warn!("{}", entry),
            Outcome::Info => tracing::info!("{}", entry),
            Outcome::Debug => tracing::debug!("{}", entry),
        }
        self.entries.push(entry);
    }

    pub fn ok(&mut self, test: &str, message: impl Into<String>) {
        self.record(Outcome::Ok, test, message);
    }

    pub fn issue(&mut self, test: &str, message: impl Into<String>) {
        self.record(Outcome::Issue, test, message);
    }

    pub fn info(&mut self, test: &str, message: impl Into<String>) {
        self.record(Outcome::Info, test, message);
    }

    pub fn debug(&mut self, test: &str, message: impl Into<String>) {
        self.record(Outcome::Debug, test, message);
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.entries.iter().filter(|e| e.outcome == outcome).count()
    }

    pub fn issues(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.outcome == Outcome::Issue)
    }

    /// Entries recorded against one interface member
    pub fn for_test<'a>(&'a self, test: &'a str) -> impl Iterator<Item = &'a ReportEntry> + 'a {
        self.entries.iter().filter(move |e| e.test == test)
    }

    pub fn summary(&self) -> String {
        let issues = self.count(Outcome::Issue);
        let verdict = if self.cancelled {
            "Run was cancelled before completion".to_string()
        } else if issues == 0 {
            format!("No issues found! {} is conformant", self.device)
        } else {
            format!("Found {} issue(s) with {}", issues, self.device)
        };
        format!(
            "{} (OK: {}, Info: {}, Issues: {})",
            verdict,
            self.count(Outcome::Ok),
            self.count(Outcome::Info),
            issues
        )
    }

    /// Write the report as pretty-printed JSON
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_outcome() {
        let mut report = Report::new("Test Scope");
        report.ok("Declination", "+10:00:00");
        report.ok("RightAscension", "01:00:00");
        report.issue("Altitude", "out of range");
        report.info("UTCDate", "clock differs");
        report.debug("UTCDate", "trace");

        assert_eq!(report.count(Outcome::Ok), 2);
        assert_eq!(report.count(Outcome::Issue), 1);
        assert_eq!(report.count(Outcome::Info), 1);
        assert_eq!(report.count(Outcome::Debug), 1);
        assert_eq!(report.for_test("UTCDate").count(), 2);
    }

    #[test]
    fn summary_reports_conformance() {
        let mut report = Report::new("Test Wheel");
        report.ok("Position", "fine");
        assert!(report.summary().starts_with("No issues found! Test Wheel"));

        report.issue("Names", "empty");
        assert!(report
            .summary()
            .starts_with("Found 1 issue(s) with Test Wheel"));

        report.cancelled = true;
        assert!(report.summary().starts_with("Run was cancelled"));
    }

    #[test]
    fn save_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let mut report = Report::new("Test");
        report.issue("Park", "did not park");
        report.save(&path).unwrap();

        let loaded: Report =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(loaded.entries[0].outcome, Outcome::Issue);
        assert_eq!(loaded.entries[0].test, "Park");
    }
}
