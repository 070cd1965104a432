mod cmd;
mod logging;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogLevel};

#[derive(Parser, Debug)]
#[command(name = "stm32link", version, about = "Serial link to an STM32 signal generator")]
struct Cli {
    /// Minimum log level (stderr). RUST_LOG takes precedence.
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    if let Err(err) = cmd::run(cli.command) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
