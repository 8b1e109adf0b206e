mod cli;
mod config;
mod confirm;
mod connect;
mod extract_cmd;
mod gen_cmd;
mod init;
mod logging;
mod sync_cmd;
mod write;

pub use supatool_schema::SchemaError;

pub async fn run(args: Vec<String>) -> anyhow::Result<()> {
    let cmd = cli::parse_args(&args)?;
    logging::init();
    match cmd {
        cli::Command::Help(topic) => {
            cli::print_help(topic);
            Ok(())
        }
        cli::Command::Version => {
            println!("supatool {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        cli::Command::Init(args) => init::run(args),
        cli::Command::Create(args) => gen_cmd::create(args),
        cli::Command::Gen(args) => gen_cmd::run(args),
        cli::Command::Sync(args) => {
            load_env()?;
            sync_cmd::run(args).await
        }
        cli::Command::Extract(args) => {
            load_env()?;
            extract_cmd::run(args).await
        }
    }
}

fn load_env() -> anyhow::Result<()> {
    let cwd = std::env::current_dir()
        .map_err(|e| anyhow::anyhow!("failed to read current directory: {e}"))?;
    config::load_dotenv(&cwd)?;
    Ok(())
}
