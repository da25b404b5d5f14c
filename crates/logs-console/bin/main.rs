use clap::{Parser, Subcommand};
use eyre::Result;

mod cmd;

use cmd::console::ConsoleArgs;
use cmd::serve::ServeArgs;
use cmd::tail::TailArgs;

#[derive(Debug, Parser)]
#[command(name = "logs-console", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive console polling one or more log feeds
    Console(ConsoleArgs),
    /// Poll a single log feed and print lines as they arrive
    Tail(TailArgs),
    /// Publish a file (or stdin) as a log feed over HTTP
    Serve(ServeArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Console(args) => args.run(),
        Command::Tail(args) => args.run(),
        Command::Serve(args) => args.run(),
    }
}
