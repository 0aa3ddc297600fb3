use clap::Parser;
use diffract_header::cli::Cli;
use diffract_header::commands::print_header;
use diffract_header::format::Registry;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so the report on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let registry = Registry::default();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    print_header(cli.files.as_slice(), &registry, &mut out)?;

    Ok(())
}
