mod cli;
mod log;
mod prefs;
mod relay;
mod repl;
mod session;
mod ux;

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = cli::run().await {
        ux::present_error(e);
        std::process::exit(1);
    }
    Ok(())
}
