//! Compliance report types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{AuditEntry, Severity};

/// Area a violation falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationKind {
    Security,
    Data,
    Admin,
    System,
}

impl ViolationKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Data => "data",
            Self::Admin => "admin",
            Self::System => "system",
        }
    }
}

/// One rule finding over a report window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    pub severity: Severity,
    pub description: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Aggregate counts over a report window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_actions: usize,
    pub failed_actions: usize,
    pub security_event_count: usize,
    pub data_change_count: usize,
    /// Actions per actor email.
    pub per_actor_action_count: BTreeMap<String, usize>,
    /// Between 0 and 100 inclusive.
    pub risk_score: u32,
}

/// Risk assessment of a time window. Generated on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub period: ReportPeriod,
    pub included_entries: Vec<AuditEntry>,
    pub summary: ReportSummary,
    pub violations: Vec<Violation>,
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl ComplianceReport {
    /// Whether any rule fired.
    #[must_use]
    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }
}

/// Name with an occurrence count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedCount {
    pub name: String,
    pub count: usize,
}

/// Counts over the whole audit log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStats {
    pub total_logs: usize,
    /// Entries stamped on the current UTC day.
    pub today_logs: usize,
    pub failed_actions: usize,
    pub critical_events: usize,
    pub top_actors: Vec<RankedCount>,
    pub top_actions: Vec<RankedCount>,
}
