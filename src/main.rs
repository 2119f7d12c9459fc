// src/main.rs

//! The main entry point for the replicated chat service.

use anyhow::Result;
use relaylink::config::Config;
use relaylink::server;
use std::env;
use tracing_subscriber::filter::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().skip(1).collect();

    if args.iter().any(|a| a == "--version") {
        println!("relaylink version {VERSION}");
        return Ok(());
    }
    if args.iter().any(|a| a == "-h" || a == "--help") {
        print!("{}", Config::USAGE);
        return Ok(());
    }

    let config = match Config::parse(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .compact()
        .init();

    server::run(config).await
}
