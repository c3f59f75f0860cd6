use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use fuzzchain::cli::{self, Cli, Mode};
use fuzzchain::config;
use fuzzchain::errors::FuzzchainError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(!cli.no_color)
            .with_writer(std::io::stderr)
            .init();
    }

    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }
    if !cli.quiet {
        cli::banner::print_banner();
    }

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            signal_token.cancel();
        }
    });

    let result = match cli.mode() {
        Ok(mode) => dispatch(&cli, mode, cancel).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn dispatch(cli: &Cli, mode: Mode, cancel: CancellationToken) -> Result<(), FuzzchainError> {
    match mode {
        Mode::Install => cli::install::handle_install(cli, cancel).await,
        Mode::Scan { target, wordlist } => cli::scan::handle_scan(cli, &target, &wordlist, cancel).await,
        Mode::Crawl { target } => cli::crawl::handle_crawl(cli, &target, cancel).await,
        Mode::Probe { target, wordlist } => {
            cli::probe::handle_probe(&target, wordlist.as_deref(), cancel).await
        }
        Mode::Validate { config } => handle_validate(&config).await,
    }
}

async fn handle_validate(path: &std::path::Path) -> Result<(), FuzzchainError> {
    let _config = config::parse_config(path).await?;
    println!("Configuration is valid: {}", path.display());
    Ok(())
}
