//! Session report and export functionality

use crate::debounce::PolicySnapshot;
use crate::session::Session;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// Complete session report
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    /// Report metadata
    pub metadata: ReportMetadata,
    /// Summary statistics
    pub summary: SessionSummary,
    /// Policy the session ran with
    pub policy: PolicySnapshot,
    /// Per-key counters, ordered by key code
    pub keys: Vec<KeyReport>,
}

/// Report metadata
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Report generation timestamp
    pub generated_at: String,
    /// Application version
    pub version: String,
    /// Session duration in seconds
    pub duration_secs: f64,
}

/// Session summary statistics
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    /// Total keyboard events processed
    pub total_events: u64,
    /// Presses suppressed as bounces
    pub presses_dropped: u64,
    /// Keys seen at least once
    pub keys_seen: usize,
}

/// One key's line in the report
#[derive(Debug, Clone, Serialize)]
pub struct KeyReport {
    pub key: String,
    pub code: u16,
    pub presses: u64,
    pub releases: u64,
    pub dropped: u64,
    pub min_drop_gap_ms: Option<f64>,
    pub max_drop_gap_ms: Option<f64>,
}

fn as_ms(d: Duration) -> f64 {
    d.as_micros() as f64 / 1000.0
}

impl SessionReport {
    /// Create a report from a session
    pub fn new(session: &Session) -> Self {
        let now: DateTime<Utc> = Utc::now();

        let keys: Vec<KeyReport> = session
            .all_stats()
            .map(|(key, stats)| KeyReport {
                key: key.to_string(),
                code: key.as_u16(),
                presses: stats.presses,
                releases: stats.releases,
                dropped: stats.dropped,
                min_drop_gap_ms: stats.min_drop_gap.map(as_ms),
                max_drop_gap_ms: stats.max_drop_gap.map(as_ms),
            })
            .collect();

        Self {
            metadata: ReportMetadata {
                generated_at: now.to_rfc3339(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                duration_secs: session.start_time().elapsed().as_secs_f64(),
            },
            summary: SessionSummary {
                total_events: session.total_events(),
                presses_dropped: session.total_dropped(),
                keys_seen: keys.len(),
            },
            policy: session.policy().snapshot(),
            keys,
        }
    }

    /// Export report to JSON file
    pub fn export_json(&self, path: &Path) -> std::io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Export report to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
