//! Output formatters for command reports.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use roster_core::backup::{ExportReport, RestoreReport};
use roster_core::MigrationReport;
use serde_json::json;

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Trait for formatting command reports.
pub trait Formatter {
    /// Format the result of an export.
    fn format_export(&self, report: &ExportReport) -> String;

    /// Format the result of a restore.
    fn format_restore(&self, report: &RestoreReport) -> String;

    /// Format the result of a migration.
    fn format_migration(&self, report: &MigrationReport) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_export(&self, report: &ExportReport) -> String {
        let mut table = Table::new();
        table.set_header(vec!["Collection", "Documents", "Archive"]);
        for c in &report.collections {
            let file = match &c.file {
                Some(path) => path.display().to_string(),
                None => "(empty, skipped)".to_string(),
            };
            table.add_row(vec![
                Cell::new(&c.collection),
                Cell::new(c.documents),
                Cell::new(file),
            ]);
        }
        format!(
            "{}\n\nBackup completed: {} ({} document(s))",
            table,
            report.run_dir.display(),
            report.total_documents()
        )
    }

    fn format_restore(&self, report: &RestoreReport) -> String {
        let mut table = Table::new();
        table.set_header(vec!["Collection", "Documents", "Outcome"]);
        for c in &report.collections {
            table.add_row(vec![
                Cell::new(&c.collection),
                Cell::new(c.documents),
                Cell::new(c.outcome.to_string()),
            ]);
        }
        let footer = if report.dry_run {
            "Dry run: nothing was written. Re-run with --live to apply.".to_string()
        } else {
            format!(
                "Restore completed: {} operation(s) in {} commit(s)",
                report.writes.operations, report.writes.commits
            )
        };
        format!("{}\n\n{}", table, footer)
    }

    fn format_migration(&self, report: &MigrationReport) -> String {
        let mut table = Table::new();
        table.set_header(vec!["Pass", "Scanned", "Updated", "Notes"]);
        table.add_row(vec![
            Cell::new("admins"),
            Cell::new(report.admins_scanned),
            Cell::new(report.admins_updated),
            Cell::new(format!(
                "{} ambiguous domain(s)",
                report.ambiguous_domains.len()
            )),
        ]);
        table.add_row(vec![
            Cell::new("teachers/students"),
            Cell::new(report.members_scanned),
            Cell::new(report.members_updated),
            Cell::new(format!(
                "{} orphaned, {} reclassified",
                report.orphaned_members, report.students_reclassified
            )),
        ]);
        table.add_row(vec![
            Cell::new("quizzes"),
            Cell::new(report.quizzes_scanned),
            Cell::new(report.quizzes_updated),
            Cell::new(format!(
                "{} unknown creator(s), {} reclassified",
                report.unknown_creators, report.quizzes_reclassified
            )),
        ]);

        let mut output = format!("Super admin: {}\n{}", report.super_admin_id, table);
        for conflict in &report.ambiguous_domains {
            output.push_str(&format!(
                "\nWARN: domain @{} claimed by {} and {}; {} wins",
                conflict.domain, conflict.previous, conflict.winner, conflict.winner
            ));
        }
        if report.dry_run {
            output.push_str(&format!(
                "\n\nDry run: {} update(s) planned, nothing was written.",
                report.planned_updates()
            ));
        } else {
            output.push_str(&format!(
                "\n\nMigration complete: {} operation(s) in {} commit(s)",
                report.writes.operations, report.writes.commits
            ));
        }
        output
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_export(&self, report: &ExportReport) -> String {
        let collections: Vec<_> = report
            .collections
            .iter()
            .map(|c| {
                json!({
                    "collection": c.collection,
                    "documents": c.documents,
                    "file": c.file.as_ref().map(|p| p.display().to_string()),
                })
            })
            .collect();
        pretty(json!({
            "run_dir": report.run_dir.display().to_string(),
            "collections": collections,
        }))
    }

    fn format_restore(&self, report: &RestoreReport) -> String {
        let collections: Vec<_> = report
            .collections
            .iter()
            .map(|c| {
                json!({
                    "collection": c.collection,
                    "documents": c.documents,
                    "outcome": c.outcome.to_string(),
                })
            })
            .collect();
        pretty(json!({
            "dry_run": report.dry_run,
            "collections": collections,
            "commits": report.writes.commits,
            "operations": report.writes.operations,
        }))
    }

    fn format_migration(&self, report: &MigrationReport) -> String {
        let mut value = serde_json::to_value(report).unwrap_or_else(|_| json!({}));
        if let Some(object) = value.as_object_mut() {
            object.insert("commits".to_string(), json!(report.writes.commits));
            object.insert("operations".to_string(), json!(report.writes.operations));
        }
        pretty(value)
    }
}

fn pretty(value: serde_json::Value) -> String {
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::backup::{CollectionRestore, RestoreOutcome};
    use roster_core::WriteStats;

    fn restore_report() -> RestoreReport {
        RestoreReport {
            dry_run: false,
            collections: vec![
                CollectionRestore {
                    collection: "users".to_string(),
                    documents: 3,
                    outcome: RestoreOutcome::Restored,
                },
                CollectionRestore {
                    collection: "results".to_string(),
                    documents: 0,
                    outcome: RestoreOutcome::Missing,
                },
            ],
            writes: WriteStats {
                commits: 1,
                operations: 3,
            },
        }
    }

    #[test]
    fn test_table_restore() {
        let output = TableFormatter.format_restore(&restore_report());
        assert!(output.contains("users"));
        assert!(output.contains("missing"));
        assert!(output.contains("3 operation(s) in 1 commit(s)"));
    }

    #[test]
    fn test_json_migration_includes_writes() {
        let report = MigrationReport {
            super_admin_id: "root".to_string(),
            writes: WriteStats {
                commits: 2,
                operations: 7,
            },
            ..MigrationReport::default()
        };
        let output = JsonFormatter.format_migration(&report);
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["super_admin_id"], "root");
        assert_eq!(json["operations"], 7);
    }

    #[test]
    fn test_table_migration_dry_run() {
        let report = MigrationReport {
            dry_run: true,
            members_updated: 4,
            ..MigrationReport::default()
        };
        let output = TableFormatter.format_migration(&report);
        assert!(output.contains("4 update(s) planned"));
    }
}
