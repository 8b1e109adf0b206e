use serde::Deserialize;
use std::path::{Path, PathBuf};
use supatool_schema::batch::MAX_CONCURRENT_ENV;
use supatool_schema::{ConcurrencyLimit, TablePattern};

pub const DEFAULT_SCHEMA_DIR: &str = "./supabase/schemas";
pub const DEFAULT_MIGRATIONS_DIR: &str = "supabase/migrations";
pub const CONNECTION_ENV_VARS: [&str; 2] = ["SUPABASE_CONNECTION_STRING", "DATABASE_URL"];

/// Contents of `supatool.toml`. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub connection_string: Option<String>,
    pub schema_dir: Option<String>,
    pub table_pattern: Option<String>,
    pub schemas: Option<Vec<String>>,
    pub migrations_dir: Option<String>,
    pub max_concurrent: Option<usize>,
}

impl ConfigFile {
    /// Load `path`. A missing file yields `None`.
    pub fn load(path: &Path) -> anyhow::Result<Option<Self>> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => anyhow::bail!("failed to read config file {}: {e}", path.display()),
        };
        let file = Self::parse(&raw, |key| std::env::var(key).ok())
            .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e:#}", path.display()))?;
        Ok(Some(file))
    }

    pub fn parse(raw: &str, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut file: ConfigFile = toml::from_str(raw)?;
        file.expand_env(&lookup)?;
        Ok(file)
    }

    fn expand_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        for value in [
            &mut self.connection_string,
            &mut self.schema_dir,
            &mut self.table_pattern,
            &mut self.migrations_dir,
        ]
        .into_iter()
        .flatten()
        {
            *value = expand_env_vars(value, lookup)?;
        }
        for s in self.schemas.iter_mut().flatten() {
            *s = expand_env_vars(s, lookup)?;
        }
        Ok(())
    }
}

/// Settings for one command after merging flags, environment and config.
#[derive(Debug, Clone)]
pub struct Settings {
    pub connection_string: Option<String>,
    pub schema_dir: PathBuf,
    pub pattern: TablePattern,
    pub schemas: Vec<String>,
    pub migrations_dir: PathBuf,
    pub limit: ConcurrencyLimit,
}

/// Command-line overrides; `None` defers to environment and config.
#[derive(Debug, Default, Clone)]
pub struct Overrides<'a> {
    pub connection: Option<&'a str>,
    pub dir: Option<&'a Path>,
    pub tables: Option<&'a str>,
    pub schemas: Option<&'a [String]>,
}

impl Settings {
    pub fn resolve(
        overrides: &Overrides<'_>,
        config: Option<&ConfigFile>,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let config = config.cloned().unwrap_or_default();

        let connection_string = overrides
            .connection
            .map(str::to_string)
            .or_else(|| {
                CONNECTION_ENV_VARS
                    .into_iter()
                    .find_map(|key| env(key).filter(|v| !v.trim().is_empty()))
            })
            .or(config.connection_string);

        let schema_dir = overrides
            .dir
            .map(Path::to_path_buf)
            .or(config.schema_dir.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SCHEMA_DIR));

        let raw_pattern = overrides
            .tables
            .map(str::to_string)
            .or(config.table_pattern)
            .unwrap_or_else(|| "*".to_string());
        let pattern = TablePattern::new(&raw_pattern)?;

        let schemas = overrides
            .schemas
            .map(<[String]>::to_vec)
            .or(config.schemas)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| vec!["public".to_string()]);

        let migrations_dir = config
            .migrations_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MIGRATIONS_DIR));

        let limit = ConcurrencyLimit::resolve(config.max_concurrent, env(MAX_CONCURRENT_ENV).as_deref());

        Ok(Self {
            connection_string,
            schema_dir,
            pattern,
            schemas,
            migrations_dir,
            limit,
        })
    }

    pub fn require_connection(&self) -> anyhow::Result<&str> {
        self.connection_string.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "connection string is required: pass --connection, set SUPABASE_CONNECTION_STRING or DATABASE_URL, or add connection_string to supatool.toml"
            )
        })
    }
}

/// Load `.env.local`, or `.env` when it is absent, from `dir`.
///
/// Variables already set in the process environment win.
pub fn load_dotenv(dir: &Path) -> anyhow::Result<Option<PathBuf>> {
    for name in [".env.local", ".env"] {
        let path = dir.join(name);
        if !path.is_file() {
            continue;
        }
        dotenvy::from_path(&path)
            .map_err(|e| anyhow::anyhow!("failed to load {}: {e}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded environment file");
        return Ok(Some(path));
    }
    Ok(None)
}

fn expand_env_vars(input: &str, lookup: &impl Fn(&str) -> Option<String>) -> anyhow::Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut key = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                key.push(ch);
            }

            if !closed {
                anyhow::bail!("unterminated env var reference: ${{{key}");
            }
            if key.is_empty() {
                anyhow::bail!("invalid env var reference: ${{}}");
            }

            let v = lookup(&key)
                .ok_or_else(|| anyhow::anyhow!("missing env var for config expansion: {key}"))?;
            out.push_str(&v);
            continue;
        }

        out.push(c);
    }

    Ok(out)
}
