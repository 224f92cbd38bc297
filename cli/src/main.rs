use clap::{Parser, Subcommand};
use commands::{
    get::{run_get, GetArgs},
    info::{run_info, InfoArgs},
    list::{run_list, ListArgs},
};
use logging::{init_logging, LogArgs};
use yansi::Condition;

mod commands;
mod logging;

/// Inspect depot chunk stores
#[derive(Parser, Debug)]
#[command(author, version)]
struct Cli {
    #[command(flatten)]
    log: LogArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Info(InfoArgs),
    List(ListArgs),
    Get(GetArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    yansi::whenever(Condition::from(|| {
        Condition::stderr_is_tty() && Condition::clicolor() && Condition::no_color()
    }));
    init_logging(&cli.log)?;

    match cli.command {
        Commands::Info(args) => run_info(args),
        Commands::List(args) => run_list(args),
        Commands::Get(args) => run_get(args),
    }
}
