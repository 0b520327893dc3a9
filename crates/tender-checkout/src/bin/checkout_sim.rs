//! # Checkout Simulator
//!
//! Replays a scripted checkout and prints the resulting report as JSON.
//!
//! ## Usage
//! ```bash
//! # Run the bundled grocery scenario
//! cargo run -p tender-checkout --bin checkout-sim -- --scenario demos/grocery.json
//!
//! # Use a specific config file
//! cargo run -p tender-checkout --bin checkout-sim -- -s demos/grocery.json -c ./checkout.toml
//!
//! # Write a default config file
//! cargo run -p tender-checkout --bin checkout-sim -- --init-config ./checkout.toml
//! ```

use std::env;
use std::path::PathBuf;

use tracing::{error, warn};

use tender_checkout::scenario::{self, Scenario};
use tender_checkout::{init_tracing, CheckoutConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut scenario_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut init_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--scenario" | "-s" => {
                if i + 1 < args.len() {
                    scenario_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--init-config" => {
                if i + 1 < args.len() {
                    init_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => {
                eprintln!("Unknown argument: {}", other);
            }
        }
        i += 1;
    }

    if let Some(path) = init_path {
        CheckoutConfig::default().save(Some(path.clone()))?;
        println!("Wrote default config to {}", path.display());
        return Ok(());
    }

    let (config, load_error) = match config_path {
        Some(path) => match CheckoutConfig::load(Some(path)) {
            Ok(config) => (config, None),
            Err(e) => {
                init_tracing("info");
                error!("Failed to load checkout config: {}", e);
                return Err(e.into());
            }
        },
        None => CheckoutConfig::load_with_fallback(None),
    };
    init_tracing(&config.logging.filter);
    if let Some(e) = load_error {
        warn!("Failed to load checkout config: {}. Using defaults.", e);
    }

    let Some(scenario_path) = scenario_path else {
        print_help();
        return Err("--scenario is required".into());
    };

    let contents = std::fs::read_to_string(&scenario_path)?;
    let scenario: Scenario = serde_json::from_str(&contents)?;
    let report = scenario::run(scenario, &config).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_help() {
    println!("Tender Checkout Simulator");
    println!();
    println!("Usage: checkout-sim [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -s, --scenario <PATH>     Scenario JSON to replay");
    println!("  -c, --config <PATH>       Config file (default: platform config dir)");
    println!("      --init-config <PATH>  Write a default config file and exit");
    println!("  -h, --help                Show this help message");
}
