//! `impact` binary

use clap::Parser;
use impact_cli::{execute, exit_status, init_tracing, Cli};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match execute(cli.command).await {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to render output");
                ExitCode::from(1)
            }
        },
        Err(err) => {
            tracing::error!(error = format!("{err:#}"), "command failed");
            ExitCode::from(exit_status(&err))
        }
    }
}
