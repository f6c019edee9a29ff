mod commands;
mod formatting;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use devflow_core::Verb;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "devflow")]
#[command(about = "Developer-workflow runner: build, test, release and watch with shell pipelines")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project directory containing devflow.toml.
    #[arg(long, default_value = ".", global = true)]
    dir: PathBuf,

    /// Treat a non-zero exit status as a pipeline failure.
    #[arg(long, action, global = true)]
    strict: bool,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(short, long, action, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the project (default: `<pm> run build`).
    Build { commands: Vec<String> },
    /// Run the test suite (default: `<pm> test`).
    Test { commands: Vec<String> },
    /// Install dependencies (default: `<pm> install`).
    Install { commands: Vec<String> },
    /// Run the given commands one after another.
    Run {
        #[arg(required = true)]
        commands: Vec<String>,
    },
    /// Tag and publish a release.
    Release {
        #[arg(long)]
        tag: Option<String>,
        #[arg(long, action)]
        dry_run: bool,
    },
    /// Remove build output.
    Clean {
        paths: Vec<PathBuf>,
        #[arg(long, action)]
        dry_run: bool,
    },
    /// Re-run commands whenever files change.
    Watch {
        commands: Vec<String>,
        #[arg(long)]
        path: Option<PathBuf>,
        #[arg(long = "ignore")]
        ignore: Vec<String>,
        #[arg(long)]
        debounce_ms: Option<u64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Build { commands } => {
            commands::cmd_pipeline(cli.dir, Verb::Build, commands, cli.strict)?
        }
        Commands::Test { commands } => {
            commands::cmd_pipeline(cli.dir, Verb::Test, commands, cli.strict)?
        }
        Commands::Install { commands } => {
            commands::cmd_pipeline(cli.dir, Verb::Install, commands, cli.strict)?
        }
        Commands::Run { commands } => commands::cmd_run(cli.dir, commands, cli.strict)?,
        Commands::Release { tag, dry_run } => {
            commands::cmd_release(cli.dir, tag, dry_run, cli.strict)?
        }
        Commands::Clean { paths, dry_run } => commands::cmd_clean(cli.dir, paths, dry_run)?,
        Commands::Watch {
            commands,
            path,
            ignore,
            debounce_ms,
        } => commands::cmd_watch(cli.dir, commands, path, ignore, debounce_ms)?,
    }

    Ok(())
}
