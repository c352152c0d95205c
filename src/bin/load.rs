//! Load generator.
//!
//! Starts a throwaway system in a temp directory and runs the four-phase
//! workload against it. Exits non-zero when the counting invariants do
//! not hold.

use anyhow::Result;
use hackd::harness::{self, HarnessConfig};
use hackd::{supervisor, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // HACKD_LOG wins, then RUST_LOG, then plain info.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("HACKD_LOG")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let teams = parse_or(args.next(), 100)?;
    let participants = parse_or(args.next(), 10)?;
    let messages = parse_or(args.next(), 10)?;

    let data_dir = std::env::temp_dir().join(format!("hackd-load-{}", std::process::id()));
    let mut config = Config::default();
    config.storage.data_dir = data_dir.clone();

    let hub = supervisor::start(&config).await?;

    let workload = HarnessConfig {
        teams,
        participants_per_team: participants,
        messages_per_team: messages,
        ..HarnessConfig::default()
    };
    let report = harness::run(&hub, &workload).await;
    println!("{report}");

    let ok = report.satisfies(&workload);
    let _ = std::fs::remove_dir_all(&data_dir);
    if !ok {
        anyhow::bail!("workload invariants violated");
    }
    println!("all invariants hold");
    Ok(())
}

fn parse_or(arg: Option<String>, default: usize) -> Result<usize> {
    match arg {
        Some(raw) => Ok(raw.parse()?),
        None => Ok(default),
    }
}
