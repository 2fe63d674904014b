use std::process::ExitCode;

use clap::Parser;

use burrow_cli::cli_args::Args;
use burrow_cli::{standalone, tui};
use burrow_core::error::Result;

fn execute() -> Result<()> {
    let args = Args::parse();
    // An empty command is not rejected here: the tunnel still comes up and
    // the supervisor reports it in the log pane, where the operator can edit
    // a command in.
    let config = args.into_config()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    if config.standalone {
        env_logger::init();
        runtime.block_on(standalone::run(config))
    } else {
        runtime.block_on(tui::run(config))
    }
}

fn main() -> ExitCode {
    match execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
