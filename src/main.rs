//! DRIMS print agent - main binary entry point.
//!
//! See the `drims_printer` library for the core functionality.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use drims_printer::{client, logging, Capabilities, ChromePrinter, Config, HostMonitor};
use mimalloc::MiMalloc;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
/// mimalloc provides better multi-threaded performance than the system allocator.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// DRIMS print agent - prints dispatched reports on this host.
#[derive(Parser)]
#[command(name = "drims-printer", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the dispatch server and serve print orders
    Start,
    /// Print the effective configuration
    Config {
        /// Write a default config.json template instead of printing
        #[arg(long)]
        init: bool,
    },
    /// Run the startup browser check and exit
    Check,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start => run_agent(),
        Commands::Config { init } => {
            if init {
                let config = Config::default();
                config.save()?;
                println!(
                    "Wrote default config to {}",
                    Config::config_dir()?.join("config.json").display()
                );
                println!("Edit it before starting the agent.");
                Ok(())
            } else {
                let config = Config::load()?;
                println!("{}", serde_json::to_string_pretty(&config)?);
                Ok(())
            }
        }
        Commands::Check => {
            let config = Config::load()?;
            ChromePrinter::new(&config)
                .check()
                .context("printer check failed")?;
            println!("Browser check passed.");
            Ok(())
        }
    }
}

/// Load config, wire up logging/capabilities/signals, and run the supervisor
/// until the session ends.
fn run_agent() -> Result<()> {
    let config = Config::load().context("startup configuration error")?;

    logging::init(&config.log_dir).context("logging setup failed")?;

    // Log panics before the default handler takes over; the agent runs
    // unattended and the log file is all an operator gets.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        log::error!("PANIC: {panic_info:?}");
        default_hook(panic_info);
    }));

    log::info!(
        "drims-printer v{} starting as {}",
        env!("CARGO_PKG_VERSION"),
        config.display_name()
    );

    // Refuse to go online without a working renderer.
    let printer = ChromePrinter::new(&config);
    printer.check().context("启动失败: browser check")?;

    let caps = Capabilities {
        printer: Arc::new(printer),
        monitor: Arc::new(HostMonitor::new(&config)),
    };

    // Ctrl-C / SIGTERM set the shutdown flag; the supervisor observes it
    // between events and during backoff waits.
    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })
    .context("install shutdown handler")?;

    let runtime = tokio::runtime::Runtime::new().context("start async runtime")?;
    let result = runtime.block_on(client::run(&config, caps, shutdown));

    match &result {
        Ok(()) => log::info!("drims-printer exiting"),
        Err(e) => log::error!("drims-printer aborting: {e:#}"),
    }
    result
}
