//! rdebrid CLI - Real-Debrid command-line downloader
//!
//! Unrestricts hoster links and magnets, then downloads the files with
//! aria2c (or the built-in HTTP downloader) into the current directory.

mod commands;
mod output;
mod progress;

use clap::{CommandFactory, Parser};
use console::style;
use rdebrid_core::ConfigStore;
use rdebrid_types::DownloaderKind;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// rdebrid - Real-Debrid CLI downloader
#[derive(Parser, Debug)]
#[command(name = "rdebrid")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "Examples:\n  \
    rdebrid https://filehost.com/file/abc123\n  \
    rdebrid \"magnet:?xt=urn:btih:...\"\n  \
    rdebrid -d ~/Downloads link1 link2\n\n\
    Shorthand: 'rdb' works the same as 'rdebrid'")]
pub struct Cli {
    /// Links or magnets to download
    #[arg(value_name = "LINK")]
    links: Vec<String>,

    /// Configure your API token
    #[arg(long, conflicts_with = "links")]
    setup: bool,

    /// API token to save with --setup instead of prompting
    #[arg(long, env = "RDEBRID_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Download to specified directory
    #[arg(short, long, value_name = "PATH", default_value = ".")]
    dir: PathBuf,

    /// Downloader for this run (overrides the saved preference)
    #[arg(long, value_enum)]
    downloader: Option<DownloaderArg>,

    /// Config file to use instead of the default location
    #[arg(long, env = "RDEBRID_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Real-Debrid API root
    #[arg(long, env = "RDEBRID_API_URL", hide = true)]
    api_url: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Generate shell completions
    #[arg(long, value_name = "SHELL")]
    completions: Option<clap_complete::Shell>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum DownloaderArg {
    Aria2c,
    Http,
}

impl From<DownloaderArg> for DownloaderKind {
    fn from(arg: DownloaderArg) -> Self {
        match arg {
            DownloaderArg::Aria2c => DownloaderKind::Aria2c,
            DownloaderArg::Http => DownloaderKind::Http,
        }
    }
}

/// Parse arguments, run, and return the process exit code
pub async fn run() -> i32 {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match execute(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {:#}", style("error:").red().bold(), err);
            1
        }
    }
}

async fn execute(cli: Cli) -> anyhow::Result<i32> {
    if let Some(shell) = cli.completions {
        clap_complete::generate(shell, &mut Cli::command(), "rdebrid", &mut std::io::stdout());
        return Ok(0);
    }

    let store = match cli.config {
        Some(path) => ConfigStore::new(path),
        None => ConfigStore::default_location()?,
    };

    if cli.setup {
        commands::setup(&store, cli.token, cli.api_url.as_deref()).await?;
        return Ok(0);
    }

    if cli.links.is_empty() {
        Cli::command().print_help()?;
        return Ok(0);
    }

    commands::download_links(
        &store,
        &cli.links,
        &cli.dir,
        cli.downloader.map(Into::into),
        cli.api_url.as_deref(),
    )
    .await
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "info,rdebrid_core=debug,rdebrid_cli=debug"
    } else {
        "error"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .try_init();
}
