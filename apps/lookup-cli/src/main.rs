//! Operator tool: resolve GTINs from the command line and print the results
//! and service stats as JSON.
//!
//! ```text
//! ciclik-lookup [--concurrency N] <gtin>...
//! ```

use ciclik_product_data::{LookupConfig, LookupResult, ProductLookupService, ServiceStats};
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "ciclik-lookup")]
#[command(version, about = "Resolve product barcodes (GTINs) to catalog data", long_about = None)]
struct Args {
    /// Lookups to run at the same time
    #[arg(short, long, value_name = "N", default_value_t = 4)]
    concurrency: usize,

    /// GTINs to look up; separators such as dashes are ignored
    #[arg(required = true, value_name = "GTIN")]
    gtins: Vec<String>,
}

/// One line of output per input.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupLine<'a> {
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a LookupResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    degraded: bool,
}

#[derive(Serialize)]
struct StatsLine<'a> {
    stats: &'a ServiceStats,
}

fn init_tracing() {
    let log_format = std::env::var("CICLIK_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout carries the JSON results
    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let config = LookupConfig::from_env();
    let service = ProductLookupService::from_config(config)?;

    tracing::info!(
        "Looking up {} GTIN(s) with concurrency {}",
        args.gtins.len(),
        args.concurrency
    );

    let results = service
        .lookup_batch(args.gtins.iter().cloned(), args.concurrency)
        .await;

    for (input, result) in &results {
        let line = match result {
            Ok(found) => LookupLine {
                input,
                result: Some(found),
                error: None,
                degraded: false,
            },
            Err(e) => LookupLine {
                input,
                result: None,
                error: Some(e.to_string()),
                degraded: e.is_degraded(),
            },
        };
        println!("{}", serde_json::to_string(&line)?);
    }

    let stats = service.stats();
    println!("{}", serde_json::to_string(&StatsLine { stats: &stats })?);

    Ok(())
}
