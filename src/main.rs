//! Provides the main entry point to the program.
use energy_demand::cli::run_cli;
use energy_demand::log;
use human_panic::{metadata, setup_panic};

fn main() {
    setup_panic!(metadata!().support(
        "Open an issue on the project's issue tracker, attaching the log files from the output \
         folder if there are any."
    ));

    if let Err(err) = run_cli() {
        if log::is_logger_initialised() {
            ::log::error!("{err:?}");
        } else {
            eprintln!("Error: {err:?}");
        }

        std::process::exit(1);
    }
}
