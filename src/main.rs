use blockfinder::cli::{self, Cli};
use blockfinder_logger::log;
use blockfinder_logger::LogSeverity::{Fatal, Info};
use clap::Parser;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();
    log("Blockfinder init".to_owned(), Info);

    match cli::run(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            log(format!("Scan failed: {}", err), Fatal);
            ExitCode::FAILURE
        }
    }
}
