use std::process::ExitCode;

use clap::Parser;

use monitor::cli::Args;
use monitor::x11::{self, Flavor};

fn main() -> ExitCode {
    // Enable logging when the user sets RUST_LOG (kept quiet by default).
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .try_init();

    let args = Args::parse();
    match x11::run(Flavor::Native, &args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("zes-select-x11: {e:#}");
            ExitCode::FAILURE
        }
    }
}
