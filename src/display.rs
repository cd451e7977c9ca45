//! Colored terminal output for the `audit-vault` binary.

use std::io::{self, Write};

use owo_colors::OwoColorize;

use crate::audit::{AuditEntry, Severity};
use crate::backup::{BackupSnapshot, RestoreReport};
use crate::compliance::{AuditStats, ComplianceReport, RankedCount};
use crate::scheduler::ScheduleStatus;

/// Maximum length for truncated display strings.
const DEFAULT_MAX_LEN: usize = 80;

/// Truncate a string to a maximum number of characters, adding ellipsis if truncated.
#[must_use]
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}

/// Human-readable byte count.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn severity_label(severity: Severity) -> String {
    let label = format!("[{}]", severity.as_str().to_uppercase());
    match severity {
        Severity::Low => label.dimmed().to_string(),
        Severity::Medium => label.blue().to_string(),
        Severity::High => label.yellow().bold().to_string(),
        Severity::Critical => label.red().bold().to_string(),
    }
}

fn flush() {
    let _ = io::stdout().flush();
}

/// Print one snapshot line.
pub fn print_backup(snapshot: &BackupSnapshot) {
    println!(
        "{} {} {} {} keys={} size={} stored={} retain-until={}",
        "[BACKUP]".cyan().bold(),
        snapshot.id.bold(),
        snapshot.timestamp.format("%Y-%m-%d %H:%M:%S").dimmed(),
        snapshot.backup_type.as_str().cyan(),
        snapshot.metadata.record_count,
        format_bytes(snapshot.size_bytes),
        format_bytes(snapshot.compressed_size),
        snapshot.retention_until.format("%Y-%m-%d").dimmed()
    );
    if !snapshot.metadata.skipped_keys.is_empty() {
        println!(
            "  {} skipped: {}",
            "[WARN]".yellow().bold(),
            snapshot.metadata.skipped_keys.join(", ")
        );
    }
    flush();
}

/// Print the snapshot list, newest first.
pub fn print_backup_list(snapshots: &[BackupSnapshot]) {
    if snapshots.is_empty() {
        println!("{}", "No backups".dimmed());
    }
    for snapshot in snapshots {
        print_backup(snapshot);
    }
    flush();
}

pub fn print_restore(report: &RestoreReport) {
    println!(
        "{} {} restored {} keys",
        "[RESTORE]".green().bold(),
        report.backup_id.bold(),
        report.restored_keys.len()
    );
    for key in &report.restored_keys {
        println!("  {}", key.dimmed());
    }
    flush();
}

pub fn print_verify(id: &str, valid: bool) {
    if valid {
        println!("{} {} checksum ok", "[VERIFY]".green().bold(), id);
    } else {
        println!("{} {} checksum mismatch", "[VERIFY]".red().bold(), id);
    }
    flush();
}

/// Print a single audit entry.
pub fn print_entry(entry: &AuditEntry) {
    let status = if entry.success {
        "ok".green().to_string()
    } else {
        "failed".red().to_string()
    };
    println!(
        "{} {} {} {} {}/{} {}",
        entry.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ").dimmed(),
        severity_label(entry.severity),
        entry.actor_email,
        entry.action.bold(),
        entry.resource,
        entry.resource_id.as_deref().unwrap_or("-"),
        status
    );
    if let Some(msg) = &entry.error_message {
        println!("  {}", truncate(msg, DEFAULT_MAX_LEN).red());
    }
    flush();
}

fn print_ranked(title: &str, ranked: &[RankedCount]) {
    println!("{}", title.bold());
    for item in ranked {
        println!("  {:>6}  {}", item.count, truncate(&item.name, DEFAULT_MAX_LEN));
    }
}

pub fn print_stats(stats: &AuditStats) {
    println!("{}", "[STATS]".blue().bold());
    println!("  total:    {}", stats.total_logs);
    println!("  today:    {}", stats.today_logs);
    println!("  failed:   {}", stats.failed_actions);
    println!("  critical: {}", stats.critical_events.to_string().red());
    print_ranked("Top actors", &stats.top_actors);
    print_ranked("Top actions", &stats.top_actions);
    flush();
}

/// Print a compliance report without the included entries.
pub fn print_report(report: &ComplianceReport) {
    let summary = &report.summary;
    println!(
        "{} {} .. {}",
        "[REPORT]".magenta().bold(),
        report.period.from.format("%Y-%m-%d %H:%M"),
        report.period.to.format("%Y-%m-%d %H:%M")
    );
    let score = summary.risk_score.to_string();
    let score = match summary.risk_score {
        0..=29 => score.green().to_string(),
        30..=59 => score.yellow().to_string(),
        _ => score.red().bold().to_string(),
    };
    println!(
        "  generated:    {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S").dimmed()
    );
    println!("  risk score:   {score}/100");
    println!("  actions:      {}", summary.total_actions);
    println!("  failed:       {}", summary.failed_actions);
    println!("  security:     {}", summary.security_event_count);
    println!("  data changes: {}", summary.data_change_count);
    for (actor, count) in &summary.per_actor_action_count {
        println!("    {count:>6}  {actor}");
    }
    for violation in &report.violations {
        println!(
            "{} {} {} (count {})",
            severity_label(violation.severity),
            violation.kind.as_str().bold(),
            violation.description,
            violation.count
        );
    }
    for recommendation in &report.recommendations {
        println!("{} {}", "[ADVICE]".cyan().bold(), recommendation);
    }
    flush();
}

pub fn print_schedule(status: &ScheduleStatus) {
    let next = status
        .next_fire()
        .map_or_else(|| "-".to_string(), |at| at.to_rfc3339());
    println!(
        "{} state={:?} next={} runs={} failures={}",
        "[SCHEDULE]".blue().bold(),
        status.state(),
        next.cyan(),
        status.runs(),
        status.failures()
    );
    flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer message", 8), "a lon...");
        assert_eq!(truncate("abcdef", 2), "...");
        assert_eq!(truncate("ééééé", 4), "é...");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MiB");
    }
}
