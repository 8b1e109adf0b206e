use crate::cli::InitArgs;
use std::path::Path;

const TEMPLATE: &str = r#"
# supatool configuration. Every key is optional; `${VAR}` expands from the environment.
#
# Connection string precedence: --connection, SUPABASE_CONNECTION_STRING,
# DATABASE_URL, then connection_string below. `.env.local` or `.env` in the
# working directory is loaded first.
# connection_string = "${SUPABASE_CONNECTION_STRING}"

schema_dir = "./supabase/schemas"
table_pattern = "*"
schemas = ["public"]
migrations_dir = "supabase/migrations"

# Parallel introspection queries (5..=50). SUPATOOL_MAX_CONCURRENT overrides it.
max_concurrent = 20
"#;

pub fn run(args: InitArgs) -> anyhow::Result<()> {
    write_template(&args.config)
}

fn write_template(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("refusing to overwrite existing file: {}", path.display());
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!("failed to create directory {}: {e}", parent.display())
            })?;
        }
    }

    std::fs::write(path, TEMPLATE.trim_start_matches('\n'))
        .map_err(|e| anyhow::anyhow!("failed to write {}: {e}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}
