use std::process::ExitCode;

use calib_capture::app;
use calib_capture::cli::Args;
use clap::Parser;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .init();

    app::main_with_args(Args::parse())
}
