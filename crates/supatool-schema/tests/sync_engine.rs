use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use supatool_schema::introspect::RemoteTables;
use supatool_schema::normalize::TablePattern;
use supatool_schema::object::{FALLBACK_TIMESTAMP, ObjectKind, SchemaObject};
use supatool_schema::sync::{SyncEngine, SyncEvent, SyncOptions, SyncReport, TableOutcome};
use supatool_schema::writer::{BACKUP_DIR, Confirmation, Confirmer, Prompt, ScriptedConfirmer};
use supatool_schema::{SchemaError, SchemaResult};

fn make_temp_dir() -> PathBuf {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("supatool-sync-test-{nonce}"));
    std::fs::create_dir_all(dir.join("schemas")).expect("mkdir");
    dir
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time")
        .as_secs() as i64
}

fn options(root: &Path) -> SyncOptions {
    SyncOptions {
        dir: root.join("schemas"),
        pattern: TablePattern::any(),
        force: false,
        migrations_dir: root.join("migrations"),
    }
}

fn table(name: &str, ddl: &str, timestamp: i64) -> SchemaObject {
    SchemaObject {
        name: name.to_string(),
        kind: ObjectKind::Table,
        ddl: ddl.to_string(),
        timestamp,
        comment: None,
        category: None,
    }
}

fn remote(tables: Vec<SchemaObject>) -> RemoteTables {
    let mut out = RemoteTables::default();
    for t in tables {
        out.tables.insert(t.name.clone(), t);
    }
    out
}

fn describe(event: &SyncEvent<'_>) -> String {
    match event {
        SyncEvent::LocalOnly { table } => format!("local-only {table}"),
        SyncEvent::Conflict { table, verdict, .. } => format!("conflict {table} ({verdict})"),
        SyncEvent::Outcome { table, outcome } => format!("{table}: {outcome:?}"),
        SyncEvent::Unavailable { table } => format!("unavailable {table}"),
    }
}

fn run_sync(
    options: &SyncOptions,
    remote: &RemoteTables,
    confirmer: &mut dyn Confirmer,
) -> (SchemaResult<SyncReport>, Vec<String>) {
    let mut events = Vec::new();
    let result = SyncEngine::new(options, &mut |event| events.push(describe(&event)))
        .apply(remote, confirmer);
    (result, events)
}

fn backups(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir.join(BACKUP_DIR)) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

const USERS: &str = "-- Table: users\nCREATE TABLE IF NOT EXISTS users (\n  id uuid NOT NULL\n);\n";

#[test]
fn remote_only_tables_are_written_with_provenance() {
    let root = make_temp_dir();
    let opts = options(&root);
    let mut confirmer = ScriptedConfirmer::default();

    let (report, events) = run_sync(&opts, &remote(vec![table("users", USERS, FALLBACK_TIMESTAMP)]), &mut confirmer);
    let report = report.expect("sync");

    assert_eq!(report.outcomes["users"], TableOutcome::Created);
    assert!(confirmer.prompts().is_empty());
    assert_eq!(events, vec!["users: Created".to_string()]);

    let content = std::fs::read_to_string(opts.dir.join("users.sql")).expect("read");
    let mut lines = content.lines();
    assert_eq!(lines.next(), Some("-- Remote last updated: 2020-01-01T00:00:00.000Z"));
    assert!(lines.next().is_some_and(|l| l.starts_with("-- Synced by supatool at: ")));
    assert!(lines.next().is_some_and(|l| l.contains("generated by supatool")));
    assert_eq!(lines.next(), Some("-- Table: users"));
    assert_eq!(lines.next(), Some(""));
    assert!(content.ends_with(USERS));

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn identical_tables_are_silent() {
    let root = make_temp_dir();
    let opts = options(&root);
    let local = "CREATE TABLE IF NOT EXISTS users (\n    id   uuid NOT NULL\n);\n";
    std::fs::write(opts.dir.join("users.sql"), local).expect("write");
    let mut confirmer = ScriptedConfirmer::default();

    let (report, events) = run_sync(&opts, &remote(vec![table("users", USERS, now() + 3600)]), &mut confirmer);
    let report = report.expect("sync");

    assert_eq!(report.outcomes["users"], TableOutcome::Unchanged);
    assert!(events.is_empty());
    assert!(confirmer.prompts().is_empty());
    assert_eq!(std::fs::read_to_string(opts.dir.join("users.sql")).expect("read"), local);
    assert!(backups(&opts.dir).is_empty());

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn remote_newer_overwrites_without_prompt_and_backs_up() {
    let root = make_temp_dir();
    let opts = options(&root);
    std::fs::write(opts.dir.join("users.sql"), "CREATE TABLE users (id int);\n").expect("write");
    let mut confirmer = ScriptedConfirmer::default();

    let (report, events) = run_sync(&opts, &remote(vec![table("users", USERS, now() + 3600)]), &mut confirmer);
    let report = report.expect("sync");

    assert_eq!(report.outcomes["users"], TableOutcome::Updated);
    assert!(confirmer.prompts().is_empty());
    assert_eq!(events[0], "conflict users (remote newer)");

    let kept = backups(&opts.dir);
    assert_eq!(kept.len(), 1);
    assert!(kept[0].ends_with("_users.sql"));
    let backed_up = std::fs::read_to_string(opts.dir.join(BACKUP_DIR).join(&kept[0])).expect("read");
    assert_eq!(backed_up, "CREATE TABLE users (id int);\n");

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn ambiguous_tables_prompt_even_when_forced() {
    let root = make_temp_dir();
    let mut opts = options(&root);
    opts.force = true;
    let local = "-- Remote last updated: 2100-01-01T00:00:00.000Z\nCREATE TABLE users (id int);\n";
    std::fs::write(opts.dir.join("users.sql"), local).expect("write");
    let mut confirmer = ScriptedConfirmer::new([Confirmation::No]);

    let (report, events) = run_sync(&opts, &remote(vec![table("users", USERS, now() + 3600)]), &mut confirmer);
    let report = report.expect("sync");

    assert_eq!(report.outcomes["users"], TableOutcome::Skipped);
    assert_eq!(confirmer.prompts().len(), 1);
    assert!(confirmer.prompts()[0].message.contains("users.sql"));
    assert_eq!(
        events,
        vec!["conflict users (ambiguous)".to_string(), "users: Skipped".to_string()]
    );
    assert_eq!(std::fs::read_to_string(opts.dir.join("users.sql")).expect("read"), local);

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn approve_all_covers_the_rest_of_the_run() {
    let root = make_temp_dir();
    let opts = options(&root);
    let header = "-- Remote last updated: 2100-01-01T00:00:00.000Z\n";
    for name in ["a", "b", "c"] {
        std::fs::write(
            opts.dir.join(format!("{name}.sql")),
            format!("{header}CREATE TABLE {name} (id int);\n"),
        )
        .expect("write");
    }
    let tables = ["a", "b", "c"]
        .into_iter()
        .map(|n| table(n, &format!("CREATE TABLE {n} (id uuid);"), now() + 3600))
        .collect();
    let mut confirmer = ScriptedConfirmer::new([Confirmation::All]);

    let (report, _) = run_sync(&opts, &remote(tables), &mut confirmer);
    let report = report.expect("sync");

    assert_eq!(confirmer.prompts().len(), 1);
    assert_eq!(report.count(|o| *o == TableOutcome::Updated), 3);

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn declined_remote_only_write_is_reported_as_skipped() {
    let root = make_temp_dir();
    let opts = options(&root);
    // Not a regular file, so it is not read as a local schema but still blocks the write.
    std::fs::create_dir_all(opts.dir.join("users.sql")).expect("mkdir");
    let mut confirmer = ScriptedConfirmer::new([Confirmation::No]);

    let (report, events) = run_sync(&opts, &remote(vec![table("users", USERS, FALLBACK_TIMESTAMP)]), &mut confirmer);
    let report = report.expect("sync");

    assert_eq!(report.outcomes["users"], TableOutcome::Skipped);
    assert_eq!(confirmer.prompts().len(), 1);
    assert_eq!(events, vec!["users: Skipped".to_string()]);
    assert!(opts.dir.join("users.sql").is_dir());
    assert!(backups(&opts.dir).is_empty());

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn local_edits_become_migrations() {
    let root = make_temp_dir();
    let opts = options(&root);
    let local = "CREATE TABLE IF NOT EXISTS users (\n  id uuid NOT NULL,\n  email text\n);\n";
    std::fs::write(opts.dir.join("users.sql"), local).expect("write");
    let mut confirmer = ScriptedConfirmer::default();

    let (report, events) = run_sync(&opts, &remote(vec![table("users", USERS, FALLBACK_TIMESTAMP)]), &mut confirmer);
    let report = report.expect("sync");

    let TableOutcome::MigrationGenerated(path) = &report.outcomes["users"] else {
        panic!("expected a migration, got {:?}", report.outcomes["users"]);
    };
    assert!(path.starts_with(&opts.migrations_dir));
    assert!(path.to_string_lossy().ends_with("_update_users.sql"));
    let migration = std::fs::read_to_string(path).expect("read");
    assert!(migration.contains("ALTER TABLE users ADD COLUMN email text;"));

    assert_eq!(events[0], "conflict users (local newer)");
    assert!(confirmer.prompts().is_empty());
    assert_eq!(std::fs::read_to_string(opts.dir.join("users.sql")).expect("read"), local);

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn orphan_sweep_ignores_the_table_pattern() {
    let root = make_temp_dir();
    let mut opts = options(&root);
    opts.pattern = TablePattern::new("user*").expect("pattern");
    std::fs::write(opts.dir.join("legacy.sql"), "CREATE TABLE legacy (id int);\n").expect("write");
    let mut confirmer = ScriptedConfirmer::new([Confirmation::Yes]);

    let tables = vec![
        table("users", USERS, FALLBACK_TIMESTAMP),
        table("posts", "CREATE TABLE posts (id int);", FALLBACK_TIMESTAMP),
    ];
    let (report, _) = run_sync(&opts, &remote(tables), &mut confirmer);
    let report = report.expect("sync");

    assert_eq!(confirmer.prompts().len(), 1);
    assert!(!confirmer.prompts()[0].allow_all);
    assert!(confirmer.prompts()[0].details.iter().any(|d| d.contains("legacy.sql")));
    assert_eq!(report.orphans.len(), 1);
    assert!(!opts.dir.join("legacy.sql").exists());

    assert!(opts.dir.join("users.sql").exists());
    assert!(!opts.dir.join("posts.sql").exists());
    assert!(!report.outcomes.contains_key("posts"));

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn local_only_tables_are_reported_after_the_sweep() {
    let root = make_temp_dir();
    let opts = options(&root);
    std::fs::write(opts.dir.join("legacy.sql"), "CREATE TABLE legacy (id int);\n").expect("write");
    let mut confirmer = ScriptedConfirmer::new([Confirmation::No]);

    let (report, events) = run_sync(&opts, &remote(Vec::new()), &mut confirmer);
    let report = report.expect("sync");

    assert_eq!(confirmer.prompts().len(), 1);
    assert!(report.orphans.is_empty());
    assert_eq!(report.outcomes["legacy"], TableOutcome::LocalOnly);
    assert_eq!(events, vec!["local-only legacy".to_string()]);
    assert!(opts.dir.join("legacy.sql").exists());

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn unavailable_tables_are_left_alone() {
    let root = make_temp_dir();
    let opts = options(&root);
    std::fs::write(opts.dir.join("broken.sql"), "CREATE TABLE broken (id int);\n").expect("write");
    let mut remote = remote(Vec::new());
    remote.unavailable.insert("broken".to_string());
    let mut confirmer = ScriptedConfirmer::default();

    let (report, events) = run_sync(&opts, &remote, &mut confirmer);
    let report = report.expect("sync");

    assert!(confirmer.prompts().is_empty());
    assert!(report.orphans.is_empty());
    assert_eq!(report.unavailable, vec!["broken".to_string()]);
    assert_eq!(events, vec!["unavailable broken".to_string()]);
    assert!(opts.dir.join("broken.sql").exists());

    let _ = std::fs::remove_dir_all(&root);
}

struct CtrlC;

impl Confirmer for CtrlC {
    fn confirm(&mut self, _prompt: &Prompt) -> SchemaResult<Confirmation> {
        Err(SchemaError::Cancelled)
    }
}

#[test]
fn cancelling_a_prompt_aborts_the_run() {
    let root = make_temp_dir();
    let opts = options(&root);
    let local = "-- Remote last updated: 2100-01-01T00:00:00.000Z\nCREATE TABLE users (id int);\n";
    std::fs::write(opts.dir.join("users.sql"), local).expect("write");

    let (report, _) = run_sync(&opts, &remote(vec![table("users", USERS, now() + 3600)]), &mut CtrlC);

    assert!(matches!(report, Err(SchemaError::Cancelled)));
    assert_eq!(std::fs::read_to_string(opts.dir.join("users.sql")).expect("read"), local);

    let _ = std::fs::remove_dir_all(&root);
}
