use anyhow::{ensure, Context, Result};
use log::info;
use std::time::Instant;
use wavebreaker::{run_ensemble, ComparisonStats, Config};

/// The simulated time of every run in s.
const DURATION: f64 = 3000.0;

/// Usage: `wavebreaker [penetration_percent] [runs] [config.json]`
fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let penetration = match args.next() {
        Some(arg) => parse_penetration(&arg)?,
        None => 20.0,
    };
    let runs: u64 = match args.next() {
        Some(arg) => arg
            .parse()
            .with_context(|| format!("invalid run count {:?}", arg))?,
        None => 1,
    };
    let config = match args.next() {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path))?;
            Config::from_json(&json).with_context(|| format!("invalid config in {}", path))?
        }
        None => Config::default(),
    };
    config.validate()?;

    let seeds: Vec<u64> = (0..runs).map(|i| i * 12345).collect();
    let start = Instant::now();
    let results = run_ensemble(&config, penetration / 100.0, &seeds, DURATION);
    info!("Finished {} runs in {:?}", runs, start.elapsed());

    let summary = serde_json::json!({
        "penetration_percent": penetration,
        "duration_s": DURATION,
        "stats": ComparisonStats::from_runs(&results),
        "runs": results,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Parses a connected vehicle share given in percent.
fn parse_penetration(arg: &str) -> Result<f64> {
    let penetration: f64 = arg
        .parse()
        .with_context(|| format!("invalid penetration percentage {:?}", arg))?;
    ensure!(
        penetration.is_finite() && (0.0..=100.0).contains(&penetration),
        "penetration percentage {} is not in [0, 100]",
        penetration
    );
    Ok(penetration)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn penetration_must_be_a_percentage() {
        assert_eq!(parse_penetration("35").unwrap(), 35.0);
        assert_eq!(parse_penetration("0").unwrap(), 0.0);
        assert_eq!(parse_penetration("100").unwrap(), 100.0);
        for bad in ["NaN", "inf", "-5", "150", "lots"] {
            assert!(parse_penetration(bad).is_err(), "accepted {:?}", bad);
        }
    }
}
