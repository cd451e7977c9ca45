//! Audit entry types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Actor id used for entries emitted by the subsystem itself.
pub const SYSTEM_ACTOR_ID: &str = "system";

/// Actor email used for entries emitted by the subsystem itself.
pub const SYSTEM_ACTOR_EMAIL: &str = "system@localhost";

/// Ordinal importance of an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Returns the string representation used in storage and exports.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Weight of one entry of this severity in the risk score.
    #[must_use]
    pub fn risk_weight(&self) -> u32 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 5,
            Self::Critical => 10,
        }
    }

    /// High and critical entries are mirrored into the critical side list.
    #[must_use]
    pub fn is_elevated(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

/// Functional area an audit entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Authentication,
    Data,
    System,
    Security,
    Admin,
}

impl Category {
    /// Returns the string representation used in storage and exports.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Data => "data",
            Self::System => "system",
            Self::Security => "security",
            Self::Admin => "admin",
        }
    }
}

/// State of a resource before and after the audited action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Changes {
    pub before: serde_json::Value,
    pub after: serde_json::Value,
}

/// Request context attached to an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// An immutable record of one action taken in the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Unique entry ID.
    pub id: Uuid,
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
    pub actor_id: String,
    pub actor_email: String,
    /// Verb describing the action, e.g. `login_failed`.
    pub action: String,
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<Changes>,
    #[serde(default)]
    pub metadata: EntryMetadata,
    pub severity: Severity,
    pub category: Category,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Everything a caller supplies to record an entry.
///
/// The recorder assigns id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditInput {
    pub actor_id: String,
    pub actor_email: String,
    pub action: String,
    pub resource: String,
    pub resource_id: Option<String>,
    pub changes: Option<Changes>,
    pub metadata: EntryMetadata,
    pub severity: Severity,
    pub category: Category,
    pub success: bool,
    pub error_message: Option<String>,
}

impl AuditInput {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn builder(
        actor_id: impl Into<String>,
        actor_email: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
    ) -> AuditInputBuilder {
        AuditInputBuilder::new(actor_id, actor_email, action, resource)
    }

    /// Builder for an entry emitted by the subsystem itself.
    #[must_use]
    pub fn system(action: impl Into<String>, resource: impl Into<String>) -> AuditInputBuilder {
        AuditInputBuilder::new(SYSTEM_ACTOR_ID, SYSTEM_ACTOR_EMAIL, action, resource)
            .category(Category::System)
    }

    pub(crate) fn into_entry(self, id: Uuid, timestamp: DateTime<Utc>) -> AuditEntry {
        AuditEntry {
            id,
            timestamp,
            actor_id: self.actor_id,
            actor_email: self.actor_email,
            action: self.action,
            resource: self.resource,
            resource_id: self.resource_id,
            changes: self.changes,
            metadata: self.metadata,
            severity: self.severity,
            category: self.category,
            success: self.success,
            error_message: self.error_message,
        }
    }
}

/// Builder for [`AuditInput`].
#[derive(Debug, Clone)]
pub struct AuditInputBuilder {
    input: AuditInput,
}

impl AuditInputBuilder {
    /// Create a new builder with required fields.
    ///
    /// Defaults to a successful low-severity system entry.
    pub fn new(
        actor_id: impl Into<String>,
        actor_email: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            input: AuditInput {
                actor_id: actor_id.into(),
                actor_email: actor_email.into(),
                action: action.into(),
                resource: resource.into(),
                resource_id: None,
                changes: None,
                metadata: EntryMetadata::default(),
                severity: Severity::Low,
                category: Category::System,
                success: true,
                error_message: None,
            },
        }
    }

    /// Set the affected resource id.
    #[must_use]
    pub fn resource_id(mut self, id: impl Into<String>) -> Self {
        self.input.resource_id = Some(id.into());
        self
    }

    /// Attach before and after state.
    #[must_use]
    pub fn changes(mut self, before: serde_json::Value, after: serde_json::Value) -> Self {
        self.input.changes = Some(Changes { before, after });
        self
    }

    /// Replace the request context.
    #[must_use]
    pub fn metadata(mut self, metadata: EntryMetadata) -> Self {
        self.input.metadata = metadata;
        self
    }

    #[must_use]
    pub fn ip(mut self, ip: impl Into<String>) -> Self {
        self.input.metadata.ip = Some(ip.into());
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.input.metadata.user_agent = Some(user_agent.into());
        self
    }

    #[must_use]
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.input.metadata.session_id = Some(session_id.into());
        self
    }

    /// Set the severity.
    #[must_use]
    pub fn severity(mut self, severity: Severity) -> Self {
        self.input.severity = severity;
        self
    }

    /// Set the category.
    #[must_use]
    pub fn category(mut self, category: Category) -> Self {
        self.input.category = category;
        self
    }

    /// Mark the action as failed with the given reason.
    #[must_use]
    pub fn failed(mut self, error_message: impl Into<String>) -> Self {
        self.input.success = false;
        self.input.error_message = Some(error_message.into());
        self
    }

    /// Build the input.
    #[must_use]
    pub fn build(self) -> AuditInput {
        self.input
    }
}

/// Criteria for selecting audit entries.
///
/// Every supplied criterion must match. The time range is inclusive on both ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub actor_id: Option<String>,
    pub category: Option<Category>,
    pub severity: Option<Severity>,
    /// Substring of the action.
    pub action: Option<String>,
}

impl AuditFilter {
    /// Filter matching everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on an inclusive time window.
    #[must_use]
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Whether no criterion is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Check one entry against every criterion.
    #[must_use]
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        self.from.map_or(true, |from| entry.timestamp >= from)
            && self.to.map_or(true, |to| entry.timestamp <= to)
            && self
                .actor_id
                .as_ref()
                .map_or(true, |actor| &entry.actor_id == actor)
            && self.category.map_or(true, |c| entry.category == c)
            && self.severity.map_or(true, |s| entry.severity == s)
            && self
                .action
                .as_ref()
                .map_or(true, |action| entry.action.contains(action.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn entry_at(timestamp: DateTime<Utc>) -> AuditEntry {
        AuditInput::builder("u1", "u1@example.com", "login_failed", "session")
            .category(Category::Authentication)
            .severity(Severity::Medium)
            .failed("bad password")
            .build()
            .into_entry(Uuid::new_v4(), timestamp)
    }

    #[test]
    fn test_severity_as_str_and_weight() {
        assert_eq!(Severity::Low.as_str(), "low");
        assert_eq!(Severity::Critical.as_str(), "critical");
        assert_eq!(Severity::Low.risk_weight(), 1);
        assert_eq!(Severity::Medium.risk_weight(), 2);
        assert_eq!(Severity::High.risk_weight(), 5);
        assert_eq!(Severity::Critical.risk_weight(), 10);
        assert!(Severity::High.is_elevated());
        assert!(!Severity::Medium.is_elevated());
        assert!(Severity::Low < Severity::Critical);
    }

    #[test]
    fn test_category_serialize() {
        let json = serde_json::to_string(&Category::Authentication).unwrap();
        assert_eq!(json, "\"authentication\"");
        assert_eq!(Category::Admin.as_str(), "admin");
    }

    #[test]
    fn test_builder_defaults() {
        let input = AuditInput::builder("u1", "u1@example.com", "view", "report").build();
        assert_eq!(input.severity, Severity::Low);
        assert_eq!(input.category, Category::System);
        assert!(input.success);
        assert!(input.error_message.is_none());
        assert!(input.changes.is_none());
    }

    #[test]
    fn test_builder_failed_sets_message() {
        let input = AuditInput::system("backup_restore_failed", "backup")
            .severity(Severity::Critical)
            .failed("checksum mismatch")
            .build();
        assert_eq!(input.actor_id, SYSTEM_ACTOR_ID);
        assert!(!input.success);
        assert_eq!(input.error_message.as_deref(), Some("checksum mismatch"));
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let entry = AuditInput::builder("u1", "u1@example.com", "update", "user")
            .resource_id("42")
            .changes(serde_json::json!({"a": 1}), serde_json::json!({"a": 2}))
            .ip("10.0.0.1")
            .user_agent("curl")
            .build()
            .into_entry(Uuid::new_v4(), Utc::now());

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"actorId\":\"u1\""));
        assert!(json.contains("\"actorEmail\""));
        assert!(json.contains("\"resourceId\":\"42\""));
        assert!(json.contains("\"userAgent\":\"curl\""));
        assert!(!json.contains("errorMessage"));

        let parsed: AuditEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_filter_time_range_is_inclusive() {
        let at = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
        let entry = entry_at(at);

        assert!(AuditFilter::between(at, at).matches(&entry));
        assert!(!AuditFilter::between(at + Duration::seconds(1), at + Duration::hours(1))
            .matches(&entry));
        assert!(!AuditFilter::between(at - Duration::hours(1), at - Duration::seconds(1))
            .matches(&entry));
    }

    #[test]
    fn test_filter_fields() {
        let entry = entry_at(Utc::now());

        assert!(AuditFilter::new().is_empty());
        assert!(AuditFilter::new().matches(&entry));
        assert!(AuditFilter::new().with_action("login").matches(&entry));
        assert!(!AuditFilter::new().with_action("logout").matches(&entry));
        assert!(AuditFilter::new().with_actor("u1").matches(&entry));
        assert!(!AuditFilter::new().with_actor("u2").matches(&entry));
        assert!(AuditFilter::new()
            .with_category(Category::Authentication)
            .with_severity(Severity::Medium)
            .matches(&entry));
        assert!(!AuditFilter::new().with_severity(Severity::High).matches(&entry));
    }
}
