//! Subcommand handlers.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args as ClapArgs;
use roster_core::backup::{
    ArchiveRestorer, ExportConfig, RestoreConfig, SnapshotExporter, DEFAULT_COLLECTIONS,
};
use roster_core::migration::{HierarchyMigrator, MigrationConfig};
use roster_core::store::{DocumentStore, SledDocumentStore, StoreConfig};
use roster_core::DEFAULT_BATCH_SIZE;

use crate::formatter::{create_formatter, Formatter};
use crate::{Args, Command};

/// Errors surfaced to the user by the CLI.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] roster_core::Error),

    #[error("restore aborted by user")]
    Aborted,

    #[error("failed to read confirmation: {0}")]
    Prompt(#[from] std::io::Error),
}

/// Arguments of `roster export`.
#[derive(ClapArgs, Debug)]
pub struct ExportArgs {
    /// Directory under which the run directory is created.
    #[arg(short, long, default_value = "backups")]
    pub out: PathBuf,

    /// Collections to export.
    #[arg(long, value_delimiter = ',')]
    pub collections: Vec<String>,
}

/// Arguments of `roster restore`.
#[derive(ClapArgs, Debug)]
pub struct RestoreArgs {
    /// Run directory produced by `roster export`.
    pub run_dir: PathBuf,

    /// Collections to restore.
    #[arg(long, value_delimiter = ',')]
    pub collections: Vec<String>,

    /// Write to the store instead of only counting.
    #[arg(long)]
    pub live: bool,

    /// Skip the confirmation prompt of a live restore.
    #[arg(short, long)]
    pub yes: bool,

    /// Writes per batch commit.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
}

/// Arguments of `roster migrate`.
#[derive(ClapArgs, Debug)]
pub struct MigrateArgs {
    /// JSON rules file; flags below override its values.
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Email of the SuperAdmin account.
    #[arg(long)]
    pub super_admin_email: Option<String>,

    /// Domain whose students are reclassified. Empty disables the rule.
    #[arg(long)]
    pub target_domain: Option<String>,

    /// Class assigned to students of the target domain.
    #[arg(long)]
    pub target_class: Option<String>,

    /// Quiz title keyword, repeatable. Replaces the configured list.
    #[arg(long = "quiz-keyword")]
    pub quiz_keywords: Vec<String>,

    /// Class assigned to quizzes matching a keyword.
    #[arg(long)]
    pub quiz_class: Option<String>,

    /// Writes per batch commit.
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Plan and report without writing.
    #[arg(long)]
    pub dry_run: bool,
}

impl MigrateArgs {
    /// Merge the rules file and flag overrides into a migration config.
    pub fn into_config(self) -> Result<MigrationConfig, CliError> {
        let mut config = match &self.rules {
            Some(path) => MigrationConfig::from_json_file(path)?,
            None => MigrationConfig::default(),
        };
        if let Some(email) = self.super_admin_email {
            config.super_admin_email = email;
        }
        if let Some(domain) = self.target_domain {
            config.target_domain = domain;
        }
        if let Some(class) = self.target_class {
            config.target_class = class;
        }
        if !self.quiz_keywords.is_empty() {
            config.quiz_keywords = self.quiz_keywords;
        }
        if let Some(class) = self.quiz_class {
            config.quiz_target_class = class;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if self.dry_run {
            config.dry_run = true;
        }
        Ok(config)
    }
}

/// Dispatch a parsed command line.
pub fn run(args: Args) -> Result<String, CliError> {
    let formatter = create_formatter(args.format);
    let deadline = (args.timeout_secs > 0)
        .then(|| Instant::now() + Duration::from_secs(args.timeout_secs));
    let data_path = args.data_path.as_deref();

    match args.command {
        Command::Export(export) => run_export(data_path, export, &*formatter),
        Command::Restore(restore) => {
            let stdin = std::io::stdin();
            run_restore(data_path, restore, deadline, &mut stdin.lock(), &*formatter)
        }
        Command::Migrate(migrate) => run_migrate(data_path, migrate, deadline, &*formatter),
    }
}

fn store_config(data_path: Option<&Path>) -> Result<StoreConfig, CliError> {
    data_path
        .map(StoreConfig::new)
        .ok_or_else(|| roster_core::Error::missing("data path (--data-path)").into())
}

fn collections_or_default(collections: Vec<String>) -> Vec<String> {
    if collections.is_empty() {
        DEFAULT_COLLECTIONS.iter().map(|c| c.to_string()).collect()
    } else {
        collections
    }
}

fn run_export(
    data_path: Option<&Path>,
    args: ExportArgs,
    formatter: &dyn Formatter,
) -> Result<String, CliError> {
    let store = SledDocumentStore::open(store_config(data_path)?)?;
    let config =
        ExportConfig::new(args.out).with_collections(collections_or_default(args.collections));
    let report = SnapshotExporter::new(&store).export_all(&config)?;
    Ok(formatter.format_export(&report))
}

fn run_restore(
    data_path: Option<&Path>,
    args: RestoreArgs,
    deadline: Option<Instant>,
    input: &mut dyn BufRead,
    formatter: &dyn Formatter,
) -> Result<String, CliError> {
    let store = SledDocumentStore::open(store_config(data_path)?.with_create_if_missing(true))?;
    let config = RestoreConfig::default()
        .with_collections(collections_or_default(args.collections))
        .with_dry_run(!args.live)
        .with_batch_size(args.batch_size)
        .with_deadline(deadline);

    if args.live && !args.yes && !confirm_overwrite(&store, &config.collections, input)? {
        return Err(CliError::Aborted);
    }

    let report = ArchiveRestorer::new(&store).restore(&args.run_dir, &config)?;
    Ok(formatter.format_restore(&report))
}

/// Show the current size of each target collection and ask for a `y`.
fn confirm_overwrite(
    store: &dyn DocumentStore,
    collections: &[String],
    input: &mut dyn BufRead,
) -> Result<bool, CliError> {
    let mut stderr = std::io::stderr();
    writeln!(stderr, "Live restore will overwrite documents in:")?;
    for collection in collections {
        let existing = store.count_documents(collection)?;
        writeln!(stderr, "  {}: {} existing document(s)", collection, existing)?;
    }
    write!(stderr, "Proceed? [y/N] ")?;
    stderr.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

fn run_migrate(
    data_path: Option<&Path>,
    args: MigrateArgs,
    deadline: Option<Instant>,
    formatter: &dyn Formatter,
) -> Result<String, CliError> {
    let config = args.into_config()?;
    config.validate()?;
    let store = SledDocumentStore::open(store_config(data_path)?)?;
    let report = HierarchyMigrator::new(&store, config)
        .with_deadline(deadline)
        .run()?;
    Ok(formatter.format_migration(&report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::OutputFormat;
    use roster_core::store::{DocRef, PendingWrite};
    use roster_core::Document;

    fn migrate_args() -> MigrateArgs {
        MigrateArgs {
            rules: None,
            super_admin_email: None,
            target_domain: None,
            target_class: None,
            quiz_keywords: Vec::new(),
            quiz_class: None,
            batch_size: None,
            dry_run: false,
        }
    }

    fn restore_args(run_dir: PathBuf, live: bool, yes: bool) -> RestoreArgs {
        RestoreArgs {
            run_dir,
            collections: vec!["users".to_string()],
            live,
            yes,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    fn seeded_store(path: &Path) {
        let store =
            SledDocumentStore::open(StoreConfig::new(path).with_create_if_missing(true)).unwrap();
        store
            .batch_commit(&[PendingWrite::set(
                DocRef::new("users", "u1"),
                Document::new().with("email", "u1@foo.com"),
            )])
            .unwrap();
    }

    #[test]
    fn test_flags_override_rules_file() {
        let dir = tempfile::tempdir().unwrap();
        let rules = dir.path().join("rules.json");
        std::fs::write(&rules, r#"{"super_admin_email": "root@a.org", "batch_size": 50}"#)
            .unwrap();

        let mut args = migrate_args();
        args.rules = Some(rules);
        args.batch_size = Some(100);
        args.quiz_keywords = vec!["Dart".to_string()];

        let config = args.into_config().unwrap();
        assert_eq!(config.super_admin_email, "root@a.org");
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.quiz_keywords, vec!["Dart".to_string()]);
    }

    #[test]
    fn test_missing_data_path() {
        let formatter = create_formatter(OutputFormat::Table);
        let err = run_migrate(None, migrate_args(), None, &*formatter).unwrap_err();
        assert!(matches!(
            err,
            CliError::Core(roster_core::Error::ConfigurationMissing { .. })
        ));
    }

    #[test]
    fn test_live_restore_declined() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("db");
        seeded_store(&db);

        let formatter = create_formatter(OutputFormat::Table);
        let mut input = "n\n".as_bytes();
        let err = run_restore(
            Some(&db),
            restore_args(dir.path().to_path_buf(), true, false),
            None,
            &mut input,
            &*formatter,
        )
        .unwrap_err();
        assert!(matches!(err, CliError::Aborted));
    }

    #[test]
    fn test_export_then_dry_run_restore() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("db");
        seeded_store(&db);
        let formatter = create_formatter(OutputFormat::Json);

        let export = ExportArgs {
            out: dir.path().join("backups"),
            collections: vec!["users".to_string()],
        };
        let output = run_export(Some(&db), export, &*formatter).unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        let run_dir = PathBuf::from(json["run_dir"].as_str().unwrap());

        let mut input = "".as_bytes();
        let output = run_restore(
            Some(&db),
            restore_args(run_dir, false, false),
            None,
            &mut input,
            &*formatter,
        )
        .unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["dry_run"], true);
        assert_eq!(json["collections"][0]["documents"], 1);
    }
}
