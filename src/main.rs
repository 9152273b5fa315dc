use clap::Parser;

use swift_shell::cli::Cli;
use swift_shell::error::exit_code_for;
use swift_shell::{cli_utils, commands, logging};

fn main() {
    // Initialize structured logging
    logging::init();

    // Usage errors exit 1; --help and --version exit 0
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    if let Err(err) = commands::run::run(cli) {
        cli_utils::print_error(&err);
        std::process::exit(exit_code_for(&err));
    }
}
