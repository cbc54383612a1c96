//! # Simulated Sensor Producer
//!
//! Stands in for the hardware: every interval it advances a random walk and
//! posts the reading to the server's ingestion API.

#![forbid(unsafe_code)]

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use serde_json::Value;

use lib_sensor::ingestors::DummyGenerator;
use lib_sensor::retrieve::ApiClient;

#[derive(Parser, Debug)]
#[clap(about = "Posts simulated distance/TDS readings to the sensor server", version)]
struct Args {
    #[clap(long, env = "MAIN_SERVER_DATA_ENDPOINT", default_value = "http://localhost:3000/api/sensor-data")]
    endpoint: String,

    #[clap(long, env = "DUMMY_INTERVAL_MS", default_value_t = 3000)]
    interval_ms: u64,

    #[clap(long, env = "DUMMY_SEED", help = "Seed for a reproducible walk.")]
    seed: Option<u64>,

    #[clap(long, default_value_t = 3, help = "Retries for transient HTTP failures.")]
    max_retries: u32,
}

fn setup_stdout_logging() -> Result<()> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}] {}",
                chrono::Local::now().format("[%Y-%m-%d %H:%M:%S]"),
                record.level(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    setup_stdout_logging()?;

    let client = ApiClient::new(&args.endpoint, args.max_retries, Duration::from_secs(10))?;
    let mut generator = match args.seed {
        Some(seed) => DummyGenerator::seeded(seed),
        None => DummyGenerator::default(),
    };

    log::info!(
        "Sending simulated readings to {} every {}ms",
        client.base_url(),
        args.interval_ms
    );

    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms.max(1)));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Ctrl-C received, stopping.");
                break;
            }
            _ = ticker.tick() => {
                let reading = generator.next_reading();
                match client.post_json::<Value, _>("", &reading).await {
                    Ok(response) if response.success => {
                        log::info!("Sent reading: distance={} tds={}", reading.distance, reading.tds);
                    }
                    Ok(response) => {
                        log::warn!(
                            "Server refused reading ({}): {}",
                            response.status,
                            response.error_body.unwrap_or_default()
                        );
                    }
                    Err(e) => log::error!("Error sending reading: {:#}", e),
                }
            }
        }
    }

    Ok(())
}
