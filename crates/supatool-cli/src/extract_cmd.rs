use crate::cli::ExtractArgs;
use crate::config::{ConfigFile, Overrides, Settings};
use crate::confirm::TerminalConfirmer;
use crate::connect::connect_db;
use colored::Colorize;
use std::path::Path;
use supatool_schema::extract::{count_by_kind, dir_has_entries, filter_by_pattern, save_definitions};
use supatool_schema::indexer::{INDEX_FILE, LLMS_FILE};
use supatool_schema::{Confirmation, Confirmer, Prompt, SchemaObject, fetch_definitions};

pub async fn run(args: ExtractArgs) -> anyhow::Result<()> {
    let config = ConfigFile::load(&args.config)?;
    let overrides = Overrides {
        connection: args.connection.as_deref(),
        dir: args.output_dir.as_deref(),
        tables: args.tables.as_deref(),
        schemas: args.schemas.as_deref(),
    };
    let settings = Settings::resolve(&overrides, config.as_ref(), |k| std::env::var(k).ok())?;
    let url = settings.require_connection()?;
    let out_dir = settings.schema_dir.as_path();

    if !args.force && !confirm_overwrite(out_dir, &mut TerminalConfirmer)? {
        println!("extraction cancelled");
        return Ok(());
    }

    let client = connect_db(url).await?;
    println!(
        "extracting {:?} from schemas: {}",
        args.scope,
        settings.schemas.join(",")
    );

    let defs = fetch_definitions(&client, &settings.schemas, args.scope, settings.limit).await?;
    let defs = filter_by_pattern(defs, &settings.pattern);
    if defs.is_empty() {
        println!("{}", "no objects matched".yellow());
        return Ok(());
    }

    let written = save_definitions(&defs, out_dir, args.separate)?;
    for line in summary_lines(&defs) {
        println!("{line}");
    }
    println!(
        "wrote {} files, {} and {} to {}",
        written.len(),
        INDEX_FILE,
        LLMS_FILE,
        out_dir.display()
    );
    Ok(())
}

/// Ask before writing into a directory that already has files.
fn confirm_overwrite(out_dir: &Path, confirmer: &mut dyn Confirmer) -> anyhow::Result<bool> {
    if !dir_has_entries(out_dir)? {
        return Ok(true);
    }
    let prompt = Prompt {
        message: format!(
            "{} is not empty. Existing files may be overwritten. Continue?",
            out_dir.display()
        ),
        details: Vec::new(),
        allow_all: false,
    };
    Ok(matches!(
        confirmer.confirm(&prompt)?,
        Confirmation::Yes | Confirmation::All
    ))
}

fn summary_lines(defs: &[SchemaObject]) -> Vec<String> {
    count_by_kind(defs)
        .into_iter()
        .map(|(kind, n)| format!("  {:<14} {n}", kind.label()))
        .collect()
}
