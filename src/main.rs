use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = imessage_export::Cli::parse();
    if let Err(err) = imessage_export::run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
