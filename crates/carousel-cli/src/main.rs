//! `carousel` command line entry point

use carousel_cli::{build_cli, dispatch, logging};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let matches = build_cli().get_matches();
    logging::init(matches.get_flag("verbose"), matches.get_flag("log-json"));

    match dispatch(&matches).await {
        Ok(outcome) => outcome.into(),
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
