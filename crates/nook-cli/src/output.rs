//! Formatted output helpers for CLI commands.

use std::fmt::Write;

use nook_runtime::state::ContainerRecord;

/// Renders records as the `ps` table, header included.
#[must_use]
pub fn container_table(records: &[ContainerRecord]) -> String {
    let mut table = format!(
        "{:<12} {:<15} {:<8} {:<8} {:<30} {:<20}\n",
        "ID", "NAME", "PID", "STATUS", "COMMAND", "CREATED"
    );
    for r in records {
        let _ = writeln!(
            table,
            "{:<12} {:<15} {:<8} {:<8} {:<30} {:<20}",
            r.id.as_str(),
            r.name,
            r.pid,
            r.status.to_string(),
            truncate(&r.command, 30),
            r.created_time
        );
    }
    table
}

/// Shortens `s` to at most `width` characters, marking the cut with `…`.
fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use nook_common::types::{ContainerId, ContainerStatus};

    use super::*;

    #[test]
    fn table_has_header_and_one_row_per_record() {
        let mut record = ContainerRecord::running(
            ContainerId::new("a1b2c3d4e5"),
            "web",
            4242,
            &["/bin/sleep".into(), "100".into()],
            None,
        );
        record.status = ContainerStatus::Stopped;

        let table = container_table(&[record]);
        let lines: Vec<_> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ID"));
        assert!(lines[1].starts_with("a1b2c3d4e5"));
        assert!(lines[1].contains("web") && lines[1].contains("4242") && lines[1].contains("stopped"));
    }

    #[test]
    fn empty_registry_prints_only_header() {
        assert_eq!(container_table(&[]).lines().count(), 1);
    }

    #[test]
    fn long_commands_are_truncated() {
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
