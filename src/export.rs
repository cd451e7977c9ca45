//! CSV and JSON export of filtered audit entries.

use std::fmt;
use std::sync::Arc;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::{AuditEntry, AuditError, AuditFilter, AuditRecorder};
use crate::clock::Clock;

/// Column order of the CSV export.
pub const CSV_HEADERS: [&str; 11] = [
    "ID",
    "Timestamp",
    "User ID",
    "User Email",
    "Action",
    "Resource",
    "Resource ID",
    "Severity",
    "Category",
    "Success",
    "Error Message",
];

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to read audit log: {0}")]
    Audit(#[from] AuditError),

    #[error("Failed to serialize export: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Export file format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    #[must_use]
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv",
            Self::Json => "application/json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Rendered export, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    /// `audit-logs-YYYY-MM-DD.<ext>`
    pub filename: String,
    pub content: String,
    pub content_type: &'static str,
    pub entry_count: usize,
}

/// Quote a CSV field, doubling embedded quotes.
fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn csv_row(entry: &AuditEntry) -> String {
    let timestamp = entry.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
    let id = entry.id.to_string();
    let fields: [&str; 11] = [
        &id,
        &timestamp,
        &entry.actor_id,
        &entry.actor_email,
        &entry.action,
        &entry.resource,
        entry.resource_id.as_deref().unwrap_or(""),
        entry.severity.as_str(),
        entry.category.as_str(),
        if entry.success { "true" } else { "false" },
        entry.error_message.as_deref().unwrap_or(""),
    ];
    fields.iter().map(|f| quote(f)).collect::<Vec<_>>().join(",")
}

/// Render entries as CSV: a header row, then one quoted row per entry, joined by `\n`.
#[must_use]
pub fn render_csv(entries: &[AuditEntry]) -> String {
    let header = CSV_HEADERS.iter().map(|h| quote(h)).collect::<Vec<_>>().join(",");
    std::iter::once(header)
        .chain(entries.iter().map(csv_row))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render entries as a pretty-printed JSON array.
///
/// # Errors
///
/// Returns an error if an entry cannot be serialized.
pub fn render_json(entries: &[AuditEntry]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(entries)
}

/// Serializes filtered audit entries. Delivery is left to the caller.
pub struct ExportWriter {
    recorder: Arc<AuditRecorder>,
    clock: Arc<dyn Clock>,
}

impl ExportWriter {
    #[must_use]
    pub fn new(recorder: Arc<AuditRecorder>, clock: Arc<dyn Clock>) -> Self {
        Self { recorder, clock }
    }

    /// Export the entries matching `filter`, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the audit log cannot be read or serialized.
    pub async fn export_audit_logs(
        &self,
        format: ExportFormat,
        filter: &AuditFilter,
    ) -> Result<ExportedFile, ExportError> {
        let entries = self.recorder.query(filter).await?;
        let content = match format {
            ExportFormat::Csv => render_csv(&entries),
            ExportFormat::Json => render_json(&entries)?,
        };
        let filename = format!(
            "audit-logs-{}.{}",
            self.clock.now().format("%Y-%m-%d"),
            format.extension()
        );

        tracing::info!(
            format = %format,
            entries = entries.len(),
            filename = %filename,
            "Audit log exported"
        );

        Ok(ExportedFile {
            filename,
            content,
            content_type: format.content_type(),
            entry_count: entries.len(),
        })
    }
}

impl fmt::Debug for ExportWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportWriter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditInput, Severity};
    use crate::clock::ManualClock;
    use crate::config::AuditConfig;
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn writer() -> (ExportWriter, Arc<AuditRecorder>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 9, 14, 30, 5).unwrap(),
        ));
        let recorder = Arc::new(AuditRecorder::new(
            Arc::new(MemoryStore::new()),
            clock.clone(),
            &AuditConfig::default(),
        ));
        (ExportWriter::new(Arc::clone(&recorder), clock), recorder)
    }

    #[test]
    fn test_csv_quotes_and_escapes() {
        let entry = AuditInput::builder("u1", "u1@example.com", "rename", "file")
            .resource_id("f-9")
            .failed("name \"draft\" taken")
            .build()
            .into_entry(
                Uuid::nil(),
                Utc.with_ymd_and_hms(2026, 3, 9, 14, 30, 5).unwrap(),
            );

        let csv = render_csv(&[entry]);
        let lines: Vec<_> = csv.split('\n').collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "\"ID\",\"Timestamp\",\"User ID\",\"User Email\",\"Action\",\"Resource\",\
             \"Resource ID\",\"Severity\",\"Category\",\"Success\",\"Error Message\""
        );
        assert_eq!(
            lines[1],
            "\"00000000-0000-0000-0000-000000000000\",\"2026-03-09T14:30:05.000Z\",\
             \"u1\",\"u1@example.com\",\"rename\",\"file\",\"f-9\",\"low\",\"system\",\
             \"false\",\"name \"\"draft\"\" taken\""
        );
    }

    #[test]
    fn test_csv_empty_is_header_only() {
        let csv = render_csv(&[]);
        assert_eq!(csv.lines().count(), 1);
        assert!(!csv.ends_with('\n'));
    }

    #[tokio::test]
    async fn test_export_filters_by_severity() {
        let (writer, recorder) = writer();
        for i in 0..10 {
            let severity = if i % 3 == 0 && i > 0 {
                Severity::Critical
            } else {
                Severity::Low
            };
            recorder
                .record(
                    AuditInput::builder("u1", "u1@example.com", format!("a{i}"), "thing")
                        .severity(severity)
                        .build(),
                )
                .await
                .unwrap();
        }

        let file = writer
            .export_audit_logs(
                ExportFormat::Csv,
                &AuditFilter::new().with_severity(Severity::Critical),
            )
            .await
            .unwrap();

        assert_eq!(file.filename, "audit-logs-2026-03-09.csv");
        assert_eq!(file.entry_count, 3);
        assert_eq!(file.content.lines().count(), 4);
        assert_eq!(file.content_type, "text/csv");
    }

    #[tokio::test]
    async fn test_json_export_is_pretty_array() {
        let (writer, recorder) = writer();
        recorder
            .record(AuditInput::builder("u1", "u1@example.com", "login", "session").build())
            .await
            .unwrap();

        let file = writer
            .export_audit_logs(ExportFormat::Json, &AuditFilter::new())
            .await
            .unwrap();

        assert_eq!(file.filename, "audit-logs-2026-03-09.json");
        assert!(file.content.starts_with("[\n  {\n    \""));
        let parsed: Vec<AuditEntry> = serde_json::from_str(&file.content).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].action, "login");
    }
}
