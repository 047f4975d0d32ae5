use anyhow::Result;
use pulse::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
