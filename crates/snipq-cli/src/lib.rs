pub mod cli;
pub mod commands;
pub mod logging;
pub mod utils;

use clap::Parser;
use cli::Snipq;
use commands::handle_command;
use logging::init_logging;
use std::process;

/// Run the snipq CLI application
pub fn run_main() {
    let args = Snipq::parse();
    init_logging(args.verbose);

    match handle_command(args.vault, args.command) {
        Ok(output) => print!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
