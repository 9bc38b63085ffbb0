//! Sweep outcome types and their text rendering.

use crate::error::WalkError;
use crate::store::HiveRoot;
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;

/// Terminal state of one hive walk.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum HiveStatus {
    /// Every reachable node was visited.
    Completed,
    /// The walk hit a fatal error and the rest of the hive was skipped.
    /// Rewrites applied before the failure stay in place.
    Abandoned { reason: String },
}

/// Outcome of one hive walk.
#[derive(Debug, Clone, Serialize)]
pub struct HiveOutcome {
    pub hive: HiveRoot,
    /// Values rewritten in this hive, including one counted for a rewrite
    /// whose write was then refused.
    pub matches: u64,
    #[serde(flatten)]
    pub status: HiveStatus,
}

impl HiveOutcome {
    pub fn completed(hive: HiveRoot, matches: u64) -> Self {
        Self {
            hive,
            matches,
            status: HiveStatus::Completed,
        }
    }

    pub fn abandoned(hive: HiveRoot, matches: u64, err: &WalkError) -> Self {
        Self {
            hive,
            matches,
            status: HiveStatus::Abandoned {
                reason: err.to_string(),
            },
        }
    }
}

/// Aggregate outcome of a full sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    /// Values rewritten across every hive.
    pub matches: u64,
    /// Per-hive rows in sweep order.
    pub hives: Vec<HiveOutcome>,
}

impl SweepReport {
    /// Whether every hive completed without being abandoned.
    pub fn fully_completed(&self) -> bool {
        self.hives
            .iter()
            .all(|h| matches!(h.status, HiveStatus::Completed))
    }
}

/// Format a section heading with bold/underline. Respects NO_COLOR and TTY.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

/// Format a sweep report as human-readable text.
pub fn format_sweep_text(report: &SweepReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Rewrite Sweep")));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Hive", "Matches", "Status"]);
    for row in &report.hives {
        let status = match &row.status {
            HiveStatus::Completed => "completed".to_string(),
            HiveStatus::Abandoned { reason } => format!("abandoned: {}", reason),
        };
        table.add_row(vec![
            row.hive.label().to_string(),
            row.matches.to_string(),
            status,
        ]);
    }
    out.push_str(&format!("{}\n\n", table));
    out.push_str(&format!("Number of results: {}\n", report.matches));
    out
}
