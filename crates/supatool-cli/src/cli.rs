use std::path::PathBuf;
use supatool_schema::{ExtractScope, GenKind};

pub const DEFAULT_CONFIG: &str = "supatool.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTopic {
    Root,
    Sync,
    Extract,
    Gen,
    Create,
    Init,
}

#[derive(Debug, Clone)]
pub enum Command {
    Help(HelpTopic),
    Version,
    Sync(SyncArgs),
    Extract(ExtractArgs),
    Gen(GenArgs),
    Create(CreateArgs),
    Init(InitArgs),
}

#[derive(Debug, Clone)]
pub struct SyncArgs {
    pub config: PathBuf,
    pub connection: Option<String>,
    pub dir: Option<PathBuf>,
    pub tables: Option<String>,
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct ExtractArgs {
    pub config: PathBuf,
    pub connection: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub tables: Option<String>,
    pub scope: ExtractScope,
    pub separate: bool,
    pub schemas: Option<Vec<String>>,
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct GenArgs {
    pub kind: GenKind,
    pub model: PathBuf,
    pub out: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct CreateArgs {
    pub template: String,
    pub out: PathBuf,
}

#[derive(Debug, Clone)]
pub struct InitArgs {
    pub config: PathBuf,
}

pub fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut it = args.iter().skip(1);
    let Some(first) = it.next() else {
        return Ok(Command::Help(HelpTopic::Root));
    };

    match first.as_str() {
        "-h" | "--help" | "help" => Ok(Command::Help(HelpTopic::Root)),
        "-V" | "--version" => Ok(Command::Version),
        "sync" => parse_sync(it.map(|s| s.as_str())),
        "extract" => parse_extract(it.map(|s| s.as_str())),
        "gen" => parse_gen(it.map(|s| s.as_str())),
        "create" => parse_create(it.map(|s| s.as_str())),
        "init" => parse_init(it.map(|s| s.as_str())),
        _ => anyhow::bail!("unknown command: {first}"),
    }
}

/// Value of `token` if it is `long`/`short` (value in the next token) or `long=value`.
fn option_value<'a>(
    token: &'a str,
    long: &str,
    short: Option<&str>,
    it: &mut impl Iterator<Item = &'a str>,
) -> anyhow::Result<Option<&'a str>> {
    if token == long || short == Some(token) {
        let Some(v) = it.next() else {
            anyhow::bail!("{long} requires a value");
        };
        return Ok(Some(v));
    }
    Ok(token
        .strip_prefix(long)
        .and_then(|rest| rest.strip_prefix('=')))
}

fn split_csv(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn parse_sync<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut config = PathBuf::from(DEFAULT_CONFIG);
    let mut connection: Option<String> = None;
    let mut dir: Option<PathBuf> = None;
    let mut tables: Option<String> = None;
    let mut force = false;

    while let Some(token) = it.next() {
        if let Some(v) = option_value(token, "--config", None, &mut it)? {
            config = PathBuf::from(v);
        } else if let Some(v) = option_value(token, "--connection", Some("-c"), &mut it)? {
            connection = Some(v.to_string());
        } else if let Some(v) = option_value(token, "--dir", Some("-d"), &mut it)? {
            dir = Some(PathBuf::from(v));
        } else if let Some(v) = option_value(token, "--tables", Some("-t"), &mut it)? {
            tables = Some(v.to_string());
        } else {
            match token {
                "-h" | "--help" => return Ok(Command::Help(HelpTopic::Sync)),
                "-f" | "--force" => force = true,
                other => anyhow::bail!("unknown argument: {other}"),
            }
        }
    }

    Ok(Command::Sync(SyncArgs {
        config,
        connection,
        dir,
        tables,
        force,
    }))
}

fn parse_extract<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut config = PathBuf::from(DEFAULT_CONFIG);
    let mut connection: Option<String> = None;
    let mut output_dir: Option<PathBuf> = None;
    let mut tables: Option<String> = None;
    let mut scope: Option<ExtractScope> = None;
    let mut separate = true;
    let mut schemas: Option<Vec<String>> = None;
    let mut force = false;

    let mut set_scope = |next: ExtractScope| -> anyhow::Result<()> {
        if scope.is_some_and(|s| s != next) {
            anyhow::bail!("--tables-only, --views-only and --all are mutually exclusive");
        }
        scope = Some(next);
        Ok(())
    };

    while let Some(token) = it.next() {
        if let Some(v) = option_value(token, "--config", None, &mut it)? {
            config = PathBuf::from(v);
        } else if let Some(v) = option_value(token, "--connection", Some("-c"), &mut it)? {
            connection = Some(v.to_string());
        } else if let Some(v) = option_value(token, "--output-dir", Some("-o"), &mut it)? {
            output_dir = Some(PathBuf::from(v));
        } else if let Some(v) = option_value(token, "--tables", Some("-t"), &mut it)? {
            tables = Some(v.to_string());
        } else if let Some(v) = option_value(token, "--schema", None, &mut it)? {
            let parsed = split_csv(v);
            if parsed.is_empty() {
                anyhow::bail!("--schema must not be empty");
            }
            schemas = Some(parsed);
        } else {
            match token {
                "-h" | "--help" => return Ok(Command::Help(HelpTopic::Extract)),
                "-f" | "--force" => force = true,
                "--no-separate" => separate = false,
                "--tables-only" => set_scope(ExtractScope::TablesOnly)?,
                "--views-only" => set_scope(ExtractScope::ViewsOnly)?,
                "--all" => set_scope(ExtractScope::All)?,
                other => anyhow::bail!("unknown argument: {other}"),
            }
        }
    }

    Ok(Command::Extract(ExtractArgs {
        config,
        connection,
        output_dir,
        tables,
        scope: scope.unwrap_or_default(),
        separate,
        schemas,
        force,
    }))
}

fn parse_gen<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut kind: Option<GenKind> = None;
    let mut model: Option<PathBuf> = None;
    let mut out: Option<PathBuf> = None;

    while let Some(token) = it.next() {
        if let Some(v) = option_value(token, "--out", Some("-o"), &mut it)? {
            out = Some(PathBuf::from(v));
            continue;
        }
        match token {
            "-h" | "--help" => return Ok(Command::Help(HelpTopic::Gen)),
            other if other.starts_with('-') => anyhow::bail!("unknown argument: {other}"),
            other if kind.is_none() => {
                kind = Some(GenKind::parse(other).ok_or_else(|| {
                    anyhow::anyhow!(
                        "unknown gen target: {other} (expected types, crud, docs, sql, rls or all)"
                    )
                })?);
            }
            other if model.is_none() => model = Some(PathBuf::from(other)),
            other => anyhow::bail!("unexpected positional argument: {other}"),
        }
    }

    let Some(kind) = kind else {
        return Ok(Command::Help(HelpTopic::Gen));
    };
    let Some(model) = model else {
        anyhow::bail!("missing model file: usage `supatool gen <kind> <model.yaml>`");
    };
    Ok(Command::Gen(GenArgs { kind, model, out }))
}

fn parse_create<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut template: Option<String> = None;
    let mut out = PathBuf::from(crate::gen_cmd::DEFAULT_MODEL_PATH);

    while let Some(token) = it.next() {
        if let Some(v) = option_value(token, "--out", Some("-o"), &mut it)? {
            out = PathBuf::from(v);
            continue;
        }
        match token {
            "-h" | "--help" => return Ok(Command::Help(HelpTopic::Create)),
            other if other.starts_with('-') => anyhow::bail!("unknown argument: {other}"),
            other if template.is_none() => template = Some(other.to_string()),
            other => anyhow::bail!("unexpected positional argument: {other}"),
        }
    }

    Ok(Command::Create(CreateArgs {
        template: template.unwrap_or_else(|| crate::gen_cmd::DEFAULT_TEMPLATE.to_string()),
        out,
    }))
}

fn parse_init<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut config = PathBuf::from(DEFAULT_CONFIG);

    while let Some(token) = it.next() {
        if let Some(v) = option_value(token, "--config", None, &mut it)? {
            config = PathBuf::from(v);
            continue;
        }
        match token {
            "-h" | "--help" => return Ok(Command::Help(HelpTopic::Init)),
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }

    Ok(Command::Init(InitArgs { config }))
}

pub fn print_help(topic: HelpTopic) {
    match topic {
        HelpTopic::Root => {
            println!(
                "\
supatool - schema sync, extraction and codegen for Supabase/Postgres

USAGE:
  supatool <COMMAND> [OPTIONS]

COMMANDS:
  sync          Reconcile local table files with the remote database
  extract       Extract database objects into SQL files
  gen           Generate code, docs or SQL from a model YAML
  create        Write a starter model YAML from a template
  init          Write a supatool.toml template
  help          Print help

OPTIONS:
  -h, --help    Print help
  -V, --version Print version

Run `supatool <command> --help` for more."
            );
        }
        HelpTopic::Sync => {
            println!(
                "\
USAGE:
  supatool sync [OPTIONS]

OPTIONS:
  -c, --connection <URL>  Connection string (default: SUPABASE_CONNECTION_STRING, DATABASE_URL, config)
  -d, --dir <DIR>         Local schema directory (default: ./supabase/schemas)
  -t, --tables <PATTERN>  Table name pattern, `*` matches anything (default: *)
  -f, --force             Skip confirmation for new files and orphan backups
  --config <FILE>         Config file path (default: supatool.toml)
  -h, --help              Print help

Ambiguous tables are always confirmed, even with --force."
            );
        }
        HelpTopic::Extract => {
            println!(
                "\
USAGE:
  supatool extract [OPTIONS]

OPTIONS:
  -c, --connection <URL>    Connection string (default: SUPABASE_CONNECTION_STRING, DATABASE_URL, config)
  -o, --output-dir <DIR>    Output directory (default: ./supabase/schemas)
  -t, --tables <PATTERN>    Object name pattern (default: *)
  --tables-only             Extract tables only
  --views-only              Extract views only
  --all                     Also extract RLS policies, functions, triggers, cron jobs and types
  --no-separate             Write every file into the output directory root
  --schema <CSV>            Comma-separated schema list (default: public)
  -f, --force               Overwrite a non-empty output directory without asking
  --config <FILE>           Config file path (default: supatool.toml)
  -h, --help                Print help"
            );
        }
        HelpTopic::Gen => {
            println!(
                "\
USAGE:
  supatool gen <KIND> <MODEL.yaml> [OPTIONS]

KINDS:
  types         TypeScript types (default: docs/generated/types.ts)
  crud          supabase-js CRUD modules (default: docs/generated/crud/)
  docs          Table definitions and relations (default: docs/generated/table-doc.md)
  sql           Table DDL and RLS SQL in one file (default: docs/generated/schema.sql)
  rls           RLS / security SQL (default: docs/generated/rls.sql)
  all           types, crud and docs (default: docs/generated/)

OPTIONS:
  -o, --out <PATH>  Output file, or directory for crud/all
  -h, --help        Print help"
            );
        }
        HelpTopic::Create => {
            println!(
                "\
USAGE:
  supatool create [TEMPLATE] [OPTIONS]

TEMPLATES:
  example       Users, profiles and posts with roles and policies (default)

OPTIONS:
  -o, --out <PATH>  Output path (default: docs/model-schema-example.yaml)
  -h, --help        Print help"
            );
        }
        HelpTopic::Init => {
            println!(
                "\
USAGE:
  supatool init [OPTIONS]

OPTIONS:
  --config <FILE>   Output config path (default: supatool.toml)
  -h, --help        Print help"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(tokens: &[&str]) -> Vec<String> {
        std::iter::once("supatool")
            .chain(tokens.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn parse_sync_with_short_and_inline_flags() {
        let cmd = parse_args(&args(&["sync", "-c", "postgres://x", "--dir=db/schemas", "-t", "user_*", "-f"])).unwrap();
        let Command::Sync(sync) = cmd else {
            panic!("expected sync");
        };
        assert_eq!(sync.connection.as_deref(), Some("postgres://x"));
        assert_eq!(sync.dir, Some(PathBuf::from("db/schemas")));
        assert_eq!(sync.tables.as_deref(), Some("user_*"));
        assert!(sync.force);
        assert_eq!(sync.config, PathBuf::from(DEFAULT_CONFIG));
    }

    #[test]
    fn parse_extract_scope_and_schemas() {
        let cmd = parse_args(&args(&["extract", "--all", "--schema", "public, auth", "--no-separate", "-o", "out"])).unwrap();
        let Command::Extract(extract) = cmd else {
            panic!("expected extract");
        };
        assert_eq!(extract.scope, ExtractScope::All);
        assert_eq!(extract.schemas, Some(vec!["public".to_string(), "auth".to_string()]));
        assert!(!extract.separate);
        assert_eq!(extract.output_dir, Some(PathBuf::from("out")));
    }

    #[test]
    fn extract_scopes_conflict() {
        let err = parse_args(&args(&["extract", "--tables-only", "--views-only"])).unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn parse_gen_positionals() {
        let cmd = parse_args(&args(&["gen", "crud", "model.yaml", "-o", "src/crud"])).unwrap();
        let Command::Gen(g) = cmd else {
            panic!("expected gen");
        };
        assert_eq!(g.kind, GenKind::Crud);
        assert_eq!(g.model, PathBuf::from("model.yaml"));
        assert_eq!(g.out, Some(PathBuf::from("src/crud")));

        assert!(parse_args(&args(&["gen", "crud"])).is_err());
        assert!(parse_args(&args(&["gen", "pdf", "model.yaml"])).is_err());
        assert!(matches!(parse_args(&args(&["gen"])).unwrap(), Command::Help(HelpTopic::Gen)));
    }

    #[test]
    fn parse_create_defaults() {
        let Command::Create(c) = parse_args(&args(&["create"])).unwrap() else {
            panic!("expected create");
        };
        assert_eq!(c.template, "example");
        assert_eq!(c.out, PathBuf::from("docs/model-schema-example.yaml"));

        let Command::Create(c) = parse_args(&args(&["create", "example", "--out=m.yaml"])).unwrap() else {
            panic!("expected create");
        };
        assert_eq!(c.out, PathBuf::from("m.yaml"));
    }

    #[test]
    fn missing_value_is_an_error() {
        let err = parse_args(&args(&["sync", "--connection"])).unwrap_err();
        assert_eq!(err.to_string(), "--connection requires a value");
    }

    #[test]
    fn root_flags() {
        assert!(matches!(parse_args(&args(&[])).unwrap(), Command::Help(HelpTopic::Root)));
        assert!(matches!(parse_args(&args(&["-V"])).unwrap(), Command::Version));
        assert!(parse_args(&args(&["frobnicate"])).is_err());
    }
}
