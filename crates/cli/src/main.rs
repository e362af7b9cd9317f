use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::Level;

mod replay;

#[derive(Debug, Parser)]
#[command(
    name = "subalign",
    version,
    about = "Replay scripted subtitle alignment edits"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). Logs go to stderr.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply a JSON command script to an SRT file and print events as JSON lines.
    Replay(ReplayArgs),
}

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// SRT file to load.
    pub srt: PathBuf,

    /// JSON array of commands to apply in order.
    #[arg(long, short = 's')]
    pub script: PathBuf,

    /// Editor configuration (TOML).
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Audio duration in milliseconds; enables view commands.
    #[arg(long, value_name = "MS")]
    pub audio_ms: Option<f64>,

    /// Write the final document as SRT.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Print the history summary after the last command.
    #[arg(long)]
    pub summary: bool,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Replay(args) => {
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            replay::run(&args, &mut out)?;
            out.flush()?;
        }
    }
    Ok(())
}
