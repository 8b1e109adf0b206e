use tracing_subscriber::EnvFilter;

pub const DEBUG_ENV: &str = "SUPATOOL_DEBUG";

/// Filter used when `RUST_LOG` is unset.
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "supatool=debug,supatool_schema=debug,supatool_cli=debug"
    } else {
        "supatool=info,supatool_schema=info,supatool_cli=info"
    }
}

/// Install the stderr subscriber. Safe to call once per process.
pub fn init() {
    let debug = std::env::var_os(DEBUG_ENV).is_some_and(|v| !v.is_empty() && v != "0");
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
