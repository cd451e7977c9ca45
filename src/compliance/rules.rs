//! Built-in compliance rules.

use crate::audit::{AuditEntry, Category, Severity};
use crate::config::ComplianceConfig;

use super::report::{Violation, ViolationKind};

/// A predicate over a report window that yields at most one violation.
pub trait ComplianceRule: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Evaluate the window, most recent entry first.
    fn evaluate(&self, entries: &[AuditEntry]) -> Option<Violation>;
}

/// Failed authentication attempts whose action mentions "login".
#[derive(Debug, Clone, Copy)]
pub struct ExcessiveFailedLogins {
    /// Violation when the count exceeds this.
    pub threshold: usize,
}

impl ComplianceRule for ExcessiveFailedLogins {
    fn name(&self) -> &str {
        "excessive_failed_logins"
    }

    fn evaluate(&self, entries: &[AuditEntry]) -> Option<Violation> {
        let count = entries
            .iter()
            .filter(|e| {
                !e.success && e.category == Category::Authentication && e.action.contains("login")
            })
            .count();
        (count > self.threshold).then(|| Violation {
            kind: ViolationKind::Security,
            severity: Severity::High,
            description: format!("{count} failed login attempts detected"),
            count,
        })
    }
}

/// Any critical entry in the window.
#[derive(Debug, Clone, Copy, Default)]
pub struct CriticalEvents;

impl ComplianceRule for CriticalEvents {
    fn name(&self) -> &str {
        "critical_events"
    }

    fn evaluate(&self, entries: &[AuditEntry]) -> Option<Violation> {
        let count = entries
            .iter()
            .filter(|e| e.severity == Severity::Critical)
            .count();
        (count > 0).then(|| Violation {
            kind: ViolationKind::Security,
            severity: Severity::Critical,
            description: format!("{count} critical security events recorded"),
            count,
        })
    }
}

/// Failed actions in the admin category.
#[derive(Debug, Clone, Copy)]
pub struct FailedAdminActions {
    /// Violation when the count reaches this.
    pub threshold: usize,
}

impl ComplianceRule for FailedAdminActions {
    fn name(&self) -> &str {
        "failed_admin_actions"
    }

    fn evaluate(&self, entries: &[AuditEntry]) -> Option<Violation> {
        let count = entries
            .iter()
            .filter(|e| !e.success && e.category == Category::Admin)
            .count();
        (count > 0 && count >= self.threshold).then(|| Violation {
            kind: ViolationKind::Admin,
            severity: Severity::High,
            description: format!("{count} failed administrative actions"),
            count,
        })
    }
}

/// Entries carrying before/after changes.
#[derive(Debug, Clone, Copy)]
pub struct BulkDataChanges {
    /// Violation when the count exceeds this.
    pub threshold: usize,
}

impl ComplianceRule for BulkDataChanges {
    fn name(&self) -> &str {
        "bulk_data_changes"
    }

    fn evaluate(&self, entries: &[AuditEntry]) -> Option<Violation> {
        let count = entries.iter().filter(|e| e.changes.is_some()).count();
        (count > self.threshold).then(|| Violation {
            kind: ViolationKind::Data,
            severity: Severity::Medium,
            description: format!("{count} data modifications in period"),
            count,
        })
    }
}

/// The built-in rules in evaluation order.
#[must_use]
pub fn default_rules(config: &ComplianceConfig) -> Vec<Box<dyn ComplianceRule>> {
    vec![
        Box::new(ExcessiveFailedLogins {
            threshold: config.failed_login_threshold,
        }),
        Box::new(CriticalEvents),
        Box::new(FailedAdminActions {
            threshold: config.failed_admin_threshold,
        }),
        Box::new(BulkDataChanges {
            threshold: config.bulk_change_threshold,
        }),
    ]
}
