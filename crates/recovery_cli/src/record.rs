use chrono::Utc;
use recovery_core::scenario::TraceEvent;
use recovery_core::SimulationReport;
use serde::{Deserialize, Serialize};

/// A simulation run as written to disk by `recovery simulate --report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    pub timestamp: String,
    pub report: SimulationReport,
}

impl RunRecord {
    pub fn new(id: impl Into<String>, report: SimulationReport) -> Self {
        Self {
            id: id.into(),
            timestamp: Utc::now().to_rfc3339(),
            report,
        }
    }

    pub fn summary(&self) -> String {
        let report = &self.report;
        let dropped = report
            .trace
            .iter()
            .filter(|e| e.event == TraceEvent::Dropped)
            .count();
        let mode = report
            .mode
            .map(|m| format!("{m:?}").to_lowercase())
            .unwrap_or_else(|| "disabled".to_string());
        format!(
            "Run {} ({}) -> {} heals, {} recoveries, {} dropped over {} ticks [{}]",
            self.id,
            report.name.as_deref().unwrap_or("unnamed"),
            report.heals(),
            report.recoveries(),
            dropped,
            report.ticks,
            mode,
        )
    }
}

pub fn default_run_id() -> String {
    format!("run-{}", Utc::now().format("%Y%m%dT%H%M%S"))
}
