use crate::cli::SyncArgs;
use crate::config::{ConfigFile, Overrides, Settings};
use crate::confirm::TerminalConfirmer;
use crate::connect::connect_db;
use colored::Colorize;
use supatool_schema::{SyncEngine, SyncEvent, SyncOptions, SyncReport, TableOutcome, Verdict};

pub async fn run(args: SyncArgs) -> anyhow::Result<()> {
    let config = ConfigFile::load(&args.config)?;
    let overrides = Overrides {
        connection: args.connection.as_deref(),
        dir: args.dir.as_deref(),
        tables: args.tables.as_deref(),
        schemas: None,
    };
    let settings = Settings::resolve(&overrides, config.as_ref(), |k| std::env::var(k).ok())?;
    let url = settings.require_connection()?;

    println!(
        "syncing {} (tables: {}, schemas: {})",
        settings.schema_dir.display(),
        settings.pattern.as_str(),
        settings.schemas.join(",")
    );

    let client = connect_db(url).await?;

    let options = SyncOptions {
        dir: settings.schema_dir.clone(),
        pattern: settings.pattern.clone(),
        force: args.force,
        migrations_dir: settings.migrations_dir.clone(),
    };
    let mut confirmer = TerminalConfirmer;
    let mut on_event = |event: SyncEvent<'_>| {
        for line in event_lines(&event) {
            println!("{line}");
        }
    };
    let report = SyncEngine::new(&options, &mut on_event)
        .run(&client, &settings.schemas, settings.limit, &mut confirmer)
        .await?;

    println!("{}", summary(&report));
    Ok(())
}

fn tag(table: &str) -> String {
    format!("[{table}]").bold().to_string()
}

fn event_lines(event: &SyncEvent<'_>) -> Vec<String> {
    match event {
        SyncEvent::LocalOnly { table } => vec![format!(
            "{} exists only locally (not in the remote database)",
            tag(table)
        )],
        SyncEvent::Unavailable { table } => vec![format!(
            "{} {}",
            tag(table),
            "remote definition unavailable, local file left untouched".yellow()
        )],
        SyncEvent::Conflict {
            table,
            verdict,
            diff,
        } => {
            let heading = match verdict {
                Verdict::LocalNewer => "local changes (remote -> local)".to_string(),
                Verdict::RemoteNewer => "remote changes (local -> remote)".to_string(),
                other => format!("{other}, differences (local -> remote)"),
            };
            let mut lines = vec![format!("{} {}", tag(table), heading.yellow())];
            lines.extend(diff.iter().map(ToString::to_string));
            lines
        }
        SyncEvent::Outcome { table, outcome } => {
            let text = match outcome {
                TableOutcome::Created => "created local file".green().to_string(),
                TableOutcome::Updated => "updated from remote".green().to_string(),
                TableOutcome::Skipped => "skipped".dimmed().to_string(),
                TableOutcome::MigrationGenerated(path) => {
                    format!("migration written to {}", path.display()).cyan().to_string()
                }
                TableOutcome::LocalOnly => "local only".to_string(),
                TableOutcome::Unchanged => "unchanged".to_string(),
            };
            vec![format!("{} {text}", tag(table))]
        }
    }
}

fn summary(report: &SyncReport) -> String {
    let created = report.count(|o| *o == TableOutcome::Created);
    let updated = report.count(|o| *o == TableOutcome::Updated);
    let skipped = report.count(|o| *o == TableOutcome::Skipped);
    let migrations = report.count(|o| matches!(o, TableOutcome::MigrationGenerated(_)));
    let local_only = report.count(|o| *o == TableOutcome::LocalOnly);
    let unchanged = report.count(|o| *o == TableOutcome::Unchanged);

    let mut parts = vec![
        format!("{created} created"),
        format!("{updated} updated"),
        format!("{migrations} migrations"),
        format!("{skipped} skipped"),
        format!("{local_only} local only"),
        format!("{unchanged} unchanged"),
    ];
    if !report.orphans.is_empty() {
        parts.push(format!("{} orphans backed up", report.orphans.len()));
    }
    if !report.unavailable.is_empty() {
        parts.push(format!("{} unavailable", report.unavailable.len()));
    }
    format!("sync complete: {}", parts.join(", "))
}
