//! bgctl - blue-green cutover driver.
//!
//! Sequences the primitives of `bluegreen-core` into a rollout: scale the new
//! application up, move the cnames over, run hooks and notifications, then
//! retire the old application's units.

use clap::Parser;

mod commands;
mod error;
mod logging;
mod output;

use commands::Cli;

fn main() {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_format);

    if let Err(e) = cli.run() {
        error::print_error(&e);
        std::process::exit(1);
    }
}
