mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "baseline",
    about = "Apply an ordered baseline of edits to a freshly generated application",
    version,
    propagate_version = true
)]
struct Cli {
    /// Application root (default: auto-detect from config/application.rb)
    #[arg(long, global = true, env = "BASELINE_ROOT")]
    root: Option<PathBuf>,

    /// Pipeline config file (default: baseline.yaml in the current directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every step against the application root
    Run {
        /// Print the ordered plan without touching any file
        #[arg(long)]
        dry_run: bool,
    },

    /// List the steps in the order they run
    Steps,
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { dry_run: false } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let config_path = cli.config.as_deref();

    let result = match cli.command {
        Commands::Run { dry_run } => cmd::run::run(&root, config_path, dry_run, cli.json),
        Commands::Steps => cmd::steps::run(&root, config_path, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
