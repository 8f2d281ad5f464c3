use anyhow::Result;
use clap::Parser;
use devkit::cli;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    match cli::run(args).await {
        Ok(()) => {
            // The stdin reader task may still be parked on a read; exit explicitly.
            std::process::exit(0);
        }
        Err(e) => Err(e),
    }
}
