//! Local/remote table reconciliation for `supatool sync`.
//!
//! A run snapshots the local schema directory, introspects the remote tables,
//! sweeps orphaned files into `backup/` and then acts on each table's verdict.
//! Local-only tables are reported against the snapshot taken before the sweep.

use crate::batch::ConcurrencyLimit;
use crate::client::IntrospectClient;
use crate::diff::{DiffLine, table_diff};
use crate::error::SchemaResult;
use crate::introspect::{RemoteTables, fetch_sync_tables};
use crate::local::{LocalSchemaFile, read_local_schemas};
use crate::migration::generate_migration_file;
use crate::normalize::{TablePattern, comparison_key};
use crate::object::SchemaObject;
use crate::reconcile::{Verdict, decide, table_names};
use crate::writer::{Confirmer, SchemaFile, SyncSession, backup_orphaned_files, write_schema_file};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Local schema directory.
    pub dir: PathBuf,
    pub pattern: TablePattern,
    /// Skip overwrite prompts for new files and the orphan sweep.
    ///
    /// Ambiguous tables are still confirmed.
    pub force: bool,
    pub migrations_dir: PathBuf,
}

impl SyncOptions {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            pattern: TablePattern::any(),
            force: false,
            migrations_dir: PathBuf::from("supabase/migrations"),
        }
    }
}

/// What happened to one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableOutcome {
    /// A new local file was written.
    Created,
    /// The local file was replaced (the old one is in `backup/`).
    Updated,
    /// The operator declined the overwrite.
    Skipped,
    MigrationGenerated(PathBuf),
    /// Only a local file exists.
    LocalOnly,
    Unchanged,
}

/// Live progress, emitted while the run is in flight.
#[derive(Debug)]
pub enum SyncEvent<'a> {
    LocalOnly { table: &'a str },
    /// Emitted before any prompt for the table.
    Conflict {
        table: &'a str,
        verdict: Verdict,
        diff: &'a [DiffLine],
    },
    Outcome {
        table: &'a str,
        outcome: &'a TableOutcome,
    },
    /// The table exists remotely but its introspection failed.
    Unavailable { table: &'a str },
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub outcomes: BTreeMap<String, TableOutcome>,
    /// Backup paths of orphaned files moved during the sweep.
    pub orphans: Vec<PathBuf>,
    pub unavailable: Vec<String>,
}

impl SyncReport {
    pub fn count(&self, pred: impl Fn(&TableOutcome) -> bool) -> usize {
        self.outcomes.values().filter(|o| pred(o)).count()
    }
}

/// Drives one sync run.
pub struct SyncEngine<'e> {
    options: &'e SyncOptions,
    on_event: &'e mut dyn FnMut(SyncEvent<'_>),
}

impl<'e> SyncEngine<'e> {
    pub fn new(options: &'e SyncOptions, on_event: &'e mut dyn FnMut(SyncEvent<'_>)) -> Self {
        Self { options, on_event }
    }

    /// Introspect `schemas` and reconcile against the local directory.
    pub async fn run<C: IntrospectClient + ?Sized>(
        &mut self,
        client: &C,
        schemas: &[String],
        limit: ConcurrencyLimit,
        confirmer: &mut dyn Confirmer,
    ) -> SchemaResult<SyncReport> {
        let remote = fetch_sync_tables(client, schemas, limit).await?;
        tracing::debug!(
            tables = remote.tables.len(),
            unavailable = remote.unavailable.len(),
            "remote tables loaded"
        );
        self.apply(&remote, confirmer)
    }

    /// Reconcile already-introspected remote tables against the local directory.
    pub fn apply(
        &mut self,
        remote: &RemoteTables,
        confirmer: &mut dyn Confirmer,
    ) -> SchemaResult<SyncReport> {
        let options = self.options;
        let mut session = SyncSession::new(confirmer);
        let mut report = SyncReport::default();

        let local = read_local_schemas(&options.dir)?;
        report.orphans =
            backup_orphaned_files(&mut session, &options.dir, &remote.known_names(), options.force)?;

        for name in table_names(&local, &remote.tables, &options.pattern) {
            if remote.unavailable.contains(&name) {
                tracing::warn!(table = %name, "remote definition unavailable, leaving local file untouched");
                (self.on_event)(SyncEvent::Unavailable { table: &name });
                report.unavailable.push(name);
                continue;
            }

            let Some(outcome) =
                self.sync_table(&mut session, &name, local.get(&name), remote.tables.get(&name))?
            else {
                continue;
            };
            if outcome != TableOutcome::Unchanged && outcome != TableOutcome::LocalOnly {
                (self.on_event)(SyncEvent::Outcome {
                    table: &name,
                    outcome: &outcome,
                });
            }
            report.outcomes.insert(name, outcome);
        }

        Ok(report)
    }

    fn sync_table(
        &mut self,
        session: &mut SyncSession<'_>,
        name: &str,
        local: Option<&LocalSchemaFile>,
        remote: Option<&SchemaObject>,
    ) -> SchemaResult<Option<TableOutcome>> {
        let Some(verdict) = decide(local, remote) else {
            return Ok(None);
        };

        let outcome = match (verdict, local, remote) {
            (Verdict::Identical, _, _) => TableOutcome::Unchanged,
            (Verdict::LocalOnly, _, _) => {
                (self.on_event)(SyncEvent::LocalOnly { table: name });
                TableOutcome::LocalOnly
            }
            (Verdict::RemoteOnly, _, Some(remote)) => {
                if self.write(session, name, remote, self.options.force)? {
                    TableOutcome::Created
                } else {
                    TableOutcome::Skipped
                }
            }
            (verdict, Some(local), Some(remote)) => {
                let remote_key = comparison_key(&remote.ddl);
                let diff = table_diff(verdict, &local.normalized_ddl, &remote_key);
                (self.on_event)(SyncEvent::Conflict {
                    table: name,
                    verdict,
                    diff: &diff,
                });

                match verdict {
                    Verdict::LocalNewer => TableOutcome::MigrationGenerated(generate_migration_file(
                        &self.options.migrations_dir,
                        name,
                        &remote_key,
                        &local.normalized_ddl,
                    )?),
                    Verdict::RemoteNewer => {
                        self.write(session, name, remote, true)?;
                        TableOutcome::Updated
                    }
                    _ => {
                        if self.write(session, name, remote, false)? {
                            TableOutcome::Updated
                        } else {
                            TableOutcome::Skipped
                        }
                    }
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(outcome))
    }

    fn write(
        &self,
        session: &mut SyncSession<'_>,
        name: &str,
        remote: &SchemaObject,
        force: bool,
    ) -> SchemaResult<bool> {
        let file_name = format!("{name}.sql");
        let file = SchemaFile {
            table: name,
            file_name: &file_name,
            ddl: &remote.ddl,
            remote_timestamp: remote.timestamp,
        };
        write_schema_file(session, &self.options.dir, &file, force)
    }
}
