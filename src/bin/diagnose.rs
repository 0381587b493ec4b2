//! Diagnostic tool - Check configuration
//!
//! Run with: cargo run --bin diagnose

use std::env;

use arbiscan::Config;

fn main() {
    println!("🔍 ARBISCAN DIAGNOSTIC CHECK\n");

    // Load .env
    dotenvy::dotenv().ok();

    println!("═══════════════════════════════════════════════════");
    println!("                  CONFIGURATION                     ");
    println!("═══════════════════════════════════════════════════\n");

    let checks = [
        ("EXCHANGE_ID", "binance", "Exchange whose tickers are scanned"),
        ("BASE_ASSET", "usdt", "Asset every cycle starts and ends at"),
        ("MAX_PATH_LENGTH", "4", "Maximum nodes per cycle"),
        ("MAX_PAGES", "5", "Ticker pages fetched per scan"),
        ("STABLE_ASSETS", "usdt,usdc,busd,dai", "Stable assets"),
        ("SEARCH_TIMEOUT_MS", "none", "Search wall-clock budget"),
        ("MAX_SEARCH_STEPS", "none", "Search step budget"),
    ];

    for (key, default, desc) in checks {
        let value = env::var(key).unwrap_or_else(|_| default.to_string());
        let marker = if env::var(key).is_err() { "(default)" } else { "(from env)" };
        println!("  {}: {} {}", key, value, marker);
        println!("    └─ {}\n", desc);
    }

    let api_key = env::var("COINGECKO_API_KEY").is_ok();
    println!("  COINGECKO_API_KEY: {}", if api_key { "✅ Set" } else { "❌ Not set (public tier)" });

    println!("\n═══════════════════════════════════════════════════");
    println!("                     STATUS                         ");
    println!("═══════════════════════════════════════════════════\n");

    match Config::from_env().and_then(|config| config.validate().map(|_| config)) {
        Ok(config) => {
            println!("  ✅ Configuration is valid");
            if config.max_path_length < 3 {
                println!("\n  ⚠️  MAX_PATH_LENGTH < 3: no cycle can close, every scan is empty.");
            }
            if config.max_path_length > 6 && config.max_search_steps.is_none() && config.search_timeout_ms.is_none() {
                println!("\n  ⚠️  Long paths without a search budget can take a very long time");
                println!("     on dense exchanges. Consider SEARCH_TIMEOUT_MS or MAX_SEARCH_STEPS.");
            }
        }
        Err(e) => {
            println!("  ❌ Configuration error: {}", e);
        }
    }

    println!("\n✅ Diagnostic complete!\n");
}
