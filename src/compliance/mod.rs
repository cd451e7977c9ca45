//! Compliance reports and audit statistics.

mod analyzer;
mod report;
mod rules;

pub use analyzer::{
    recommendations, risk_score, summarize, ComplianceAnalyzer, RECOMMEND_ADMIN_REVIEW,
    RECOMMEND_CONTINUE, RECOMMEND_DATA_REVIEW, RECOMMEND_INCIDENT_REVIEW, RECOMMEND_SYSTEM_REVIEW,
    RECOMMEND_TWO_FACTOR,
};
pub use report::{
    AuditStats, ComplianceReport, RankedCount, ReportPeriod, ReportSummary, Violation,
    ViolationKind,
};
pub use rules::{
    default_rules, BulkDataChanges, ComplianceRule, CriticalEvents, ExcessiveFailedLogins,
    FailedAdminActions,
};
