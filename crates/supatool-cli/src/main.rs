#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = supatool_cli::run(std::env::args().collect()).await {
        if matches!(
            e.downcast_ref::<supatool_cli::SchemaError>(),
            Some(supatool_cli::SchemaError::Cancelled)
        ) {
            eprintln!("Operation cancelled");
            return;
        }
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}
