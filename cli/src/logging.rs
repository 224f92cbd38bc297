use anyhow::Result;
use clap::Args;
use tracing_subscriber::EnvFilter;

/// Logging options shared by all commands
#[derive(Args, Debug, Clone, Copy)]
pub struct LogArgs {
    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Initialize logging. `RUST_LOG` takes precedence over the verbosity flags
/// unless `--quiet` is given. Log output goes to stderr so it never mixes
/// with chunk data written to stdout.
pub fn init_logging(args: &LogArgs) -> Result<()> {
    let filter = if args.quiet {
        EnvFilter::new("error")
    } else {
        let level = match args.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init()
        .map_err(|e| anyhow::anyhow!("unable to initialize logging: {e}"))
}
