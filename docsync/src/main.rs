use anyhow::Result;
use clap::Parser;
use docsync::cli::{run, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    // Secrets may come from a .env file next to the working directory.
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let result = run(cli).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "docsync exited with error");
    }
    result
}
