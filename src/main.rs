use anyhow::Result;
use clap::Parser;
use tab_tree::cli::{self, Cli};
use tokio::runtime::Runtime;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Routes all log::info!() etc. to the debug log file. CLI --log-level
    // takes precedence, then RUST_LOG, then config (applied per command).
    tab_tree::debug::init_log_bridge(cli.runtime_options().log_level);
    log::info!("Starting tab-tree {}", tab_tree::VERSION);

    let runtime = Runtime::new()?;
    let code = runtime.block_on(cli::process_cli(cli));

    // Don't wait forever on a stuck background task
    runtime.shutdown_timeout(std::time::Duration::from_secs(2));

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
