//! Presence Router CLI
//!
//! Starts the HTTP server for presence evaluation and attendance commits.

use std::env;
use std::process;

use anyhow::Context;
use presence_router::{config::RouterConfig, start_server};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // Parse command-line arguments
    let args: Vec<String> = env::args().collect();

    let config = if args.len() > 2 && args[1] == "--config" {
        let config_path = &args[2];
        RouterConfig::from_file(config_path)
            .with_context(|| format!("loading configuration from {}", config_path))?
    } else if args.len() > 1 && args[1] == "--help" {
        print_help();
        process::exit(0);
    } else {
        eprintln!("Warning: No config file specified, using default test configuration");
        eprintln!("Usage: presence-router --config <path-to-config.toml>");
        eprintln!();
        RouterConfig::default_test_config()
    };

    start_server(config).await?;

    Ok(())
}

fn print_help() {
    println!("Presence Router - Proof-of-presence attendance service");
    println!();
    println!("USAGE:");
    println!("    presence-router --config <path-to-config.toml>");
    println!();
    println!("OPTIONS:");
    println!("    --config <file>    Load configuration from TOML file");
    println!("    --help             Print this help message");
    println!();
    println!("EXAMPLE:");
    println!("    presence-router --config config/presence.toml");
    println!();
    println!("CONFIGURATION:");
    println!("    The TOML config file should contain:");
    println!("    - bind_address, bind_port: where to listen");
    println!("    - token_secret: Secret key for outcome token signing");
    println!("    - database_path: SQLite ledger file (default: presence.db)");
    println!("    - utc_offset_minutes: Institution time zone offset (default: 0)");
    println!("    - [acquisition], [outcome], [sweeper]: budgets and timings");
    println!("    - [[courses]]: course geofences with expected WiFi and beacons");
    println!();
    println!("Set RUST_LOG to adjust log verbosity (default: info).");
}
