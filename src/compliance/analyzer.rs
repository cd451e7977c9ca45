//! Windowed aggregation and risk scoring over the audit log.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::report::{
    AuditStats, ComplianceReport, RankedCount, ReportPeriod, ReportSummary, Violation,
    ViolationKind,
};
use super::rules::{default_rules, ComplianceRule};
use crate::audit::{AuditEntry, AuditError, AuditFilter, AuditRecorder, Category, Severity};
use crate::config::ComplianceConfig;

/// Extra weight added to the risk sum for each failed entry.
const FAILED_ACTION_WEIGHT: u64 = 3;

/// How many actors and actions the stats keep.
const TOP_N: usize = 5;

pub const RECOMMEND_TWO_FACTOR: &str =
    "Enable two-factor authentication and review account lockout policies";
pub const RECOMMEND_INCIDENT_REVIEW: &str =
    "Investigate critical events and document the incident response";
pub const RECOMMEND_ADMIN_REVIEW: &str =
    "Review administrator permissions and restrict privileged operations";
pub const RECOMMEND_DATA_REVIEW: &str =
    "Confirm bulk data modifications were authorized and backed up";
pub const RECOMMEND_SYSTEM_REVIEW: &str = "Review system health and backup integrity";
pub const RECOMMEND_CONTINUE: &str = "Continue regular monitoring of audit activity";

/// Risk score for a window: severity weights plus a penalty per failure,
/// averaged, scaled by 10 and capped at 100. An empty window scores 0.
#[must_use]
pub fn risk_score(entries: &[AuditEntry]) -> u32 {
    let total = entries.len() as u64;
    if total == 0 {
        return 0;
    }
    let sum: u64 = entries
        .iter()
        .map(|e| {
            let failed = if e.success { 0 } else { FAILED_ACTION_WEIGHT };
            u64::from(e.severity.risk_weight()) + failed
        })
        .sum();
    // round(10 * sum / total), halves away from zero
    let scaled = (20 * sum + total) / (2 * total);
    u32::try_from(scaled.min(100)).unwrap_or(100)
}

/// Aggregate counts over `entries`.
#[must_use]
pub fn summarize(entries: &[AuditEntry]) -> ReportSummary {
    let mut per_actor: BTreeMap<String, usize> = BTreeMap::new();
    for entry in entries {
        *per_actor.entry(entry.actor_email.clone()).or_default() += 1;
    }

    ReportSummary {
        total_actions: entries.len(),
        failed_actions: entries.iter().filter(|e| !e.success).count(),
        security_event_count: entries
            .iter()
            .filter(|e| e.category == Category::Security)
            .count(),
        data_change_count: entries.iter().filter(|e| e.changes.is_some()).count(),
        per_actor_action_count: per_actor,
        risk_score: risk_score(entries),
    }
}

/// Advisories for a set of violations, in a fixed order without duplicates.
#[must_use]
pub fn recommendations(violations: &[Violation], has_critical: bool) -> Vec<String> {
    let has = |kind: ViolationKind| violations.iter().any(|v| v.kind == kind);

    let mut out = Vec::new();
    if has(ViolationKind::Security) {
        out.push(RECOMMEND_TWO_FACTOR);
    }
    if has_critical {
        out.push(RECOMMEND_INCIDENT_REVIEW);
    }
    if has(ViolationKind::Admin) {
        out.push(RECOMMEND_ADMIN_REVIEW);
    }
    if has(ViolationKind::Data) {
        out.push(RECOMMEND_DATA_REVIEW);
    }
    if has(ViolationKind::System) {
        out.push(RECOMMEND_SYSTEM_REVIEW);
    }
    if out.is_empty() {
        out.push(RECOMMEND_CONTINUE);
    }
    out.into_iter().map(String::from).collect()
}

/// Names ranked by count, ties kept in first-seen order.
fn top_counts<'a>(names: impl Iterator<Item = &'a str>) -> Vec<RankedCount> {
    let mut ranked: Vec<RankedCount> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for name in names {
        if let Some(&pos) = positions.get(name) {
            ranked[pos].count += 1;
        } else {
            positions.insert(name, ranked.len());
            ranked.push(RankedCount {
                name: name.to_string(),
                count: 1,
            });
        }
    }
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(TOP_N);
    ranked
}

/// Produces compliance reports and log statistics.
pub struct ComplianceAnalyzer {
    recorder: Arc<AuditRecorder>,
    rules: Vec<Box<dyn ComplianceRule>>,
}

impl ComplianceAnalyzer {
    /// Analyzer with the built-in rules.
    #[must_use]
    pub fn new(recorder: Arc<AuditRecorder>, config: &ComplianceConfig) -> Self {
        Self {
            recorder,
            rules: default_rules(config),
        }
    }

    /// Append a rule evaluated after the existing ones.
    #[must_use]
    pub fn with_rule(mut self, rule: impl ComplianceRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Names of the rules in evaluation order.
    #[must_use]
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Assess the entries recorded between `from` and `to`, both inclusive.
    ///
    /// # Errors
    ///
    /// Returns an error if the audit log cannot be read.
    pub async fn generate_report(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<ComplianceReport, AuditError> {
        let entries = self.recorder.query(&AuditFilter::between(from, to)).await?;
        let generated_at = self.recorder.clock().now();
        Ok(self.assess(ReportPeriod { from, to }, entries, generated_at))
    }

    /// Build a report from an already selected window.
    #[must_use]
    pub fn assess(
        &self,
        period: ReportPeriod,
        entries: Vec<AuditEntry>,
        generated_at: DateTime<Utc>,
    ) -> ComplianceReport {
        let summary = summarize(&entries);

        let violations: Vec<Violation> = self
            .rules
            .iter()
            .filter_map(|rule| {
                let violation = rule.evaluate(&entries)?;
                tracing::debug!(
                    rule = rule.name(),
                    count = violation.count,
                    "Compliance rule triggered"
                );
                Some(violation)
            })
            .collect();

        let has_critical = entries.iter().any(|e| e.severity == Severity::Critical);
        let recommendations = recommendations(&violations, has_critical);

        tracing::info!(
            entries = summary.total_actions,
            violations = violations.len(),
            risk_score = summary.risk_score,
            "Compliance report generated"
        );

        ComplianceReport {
            period,
            included_entries: entries,
            summary,
            violations,
            recommendations,
            generated_at,
        }
    }

    /// Counts over the full log. "Today" is the clock's current UTC day.
    ///
    /// # Errors
    ///
    /// Returns an error if the audit log cannot be read.
    pub async fn audit_stats(&self) -> Result<AuditStats, AuditError> {
        let log = self.recorder.all().await?;
        let today = self.recorder.clock().now().date_naive();

        Ok(AuditStats {
            total_logs: log.len(),
            today_logs: log
                .iter()
                .filter(|e| e.timestamp.date_naive() == today)
                .count(),
            failed_actions: log.iter().filter(|e| !e.success).count(),
            critical_events: log
                .iter()
                .filter(|e| e.severity == Severity::Critical)
                .count(),
            top_actors: top_counts(log.iter().map(|e| e.actor_email.as_str())),
            top_actions: top_counts(log.iter().map(|e| e.action.as_str())),
        })
    }
}

impl std::fmt::Debug for ComplianceAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComplianceAnalyzer")
            .field("rules", &self.rule_names())
            .finish_non_exhaustive()
    }
}
