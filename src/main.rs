use anyhow::{Context, Result};
use clap::Parser;
use contagion_common::{ScenarioConfig, TrialRecord};
use contagion_engine::run_trial;
use log::{debug, error, info, warn};
use rand::Rng;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

/// Headless driver: runs the scripted contagion scenario against a sandbox world.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the scenario configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Number of independent trials (overrides [run].trials)
    #[arg(short, long)]
    trials: Option<u32>,

    /// Output format for snapshots: json, bincode or messagepack (overrides [output].format)
    #[arg(short, long)]
    format: Option<String>,
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();
    let args = Args::parse();

    info!("Starting Contagion Engine (headless sandbox)...");

    // --- Load Configuration ---
    let mut config = ScenarioConfig::load(&args.config)?;
    if let Some(trials) = args.trials {
        config.run.trials = trials;
    }
    if args.format.is_some() {
        config.output.format = args.format.clone();
    }
    let trials = config.run.trials.max(1);
    debug!("Spread parameters: {:#?}", config.contagion.to_spread_params());

    let base_seed = config.contagion.seed.unwrap_or_else(|| {
        let seed = rand::rng().random::<u64>();
        info!("No [contagion].seed configured; using {}.", seed);
        seed
    });

    // --- Run Trials (Parallel) ---
    info!("Running {} trial(s) on {} Rayon threads.", trials, rayon::current_num_threads());
    let start_time = Instant::now();
    let records: Vec<TrialRecord> = (0..trials)
        .into_par_iter()
        .map(|trial| run_trial(&config, trial, base_seed.wrapping_add(trial as u64)))
        .collect();
    let total_duration = start_time.elapsed();
    info!("Trials finished in {:.3} seconds.", total_duration.as_secs_f64());

    let extinct = records.iter().filter(|r| r.summary.extinct_at_tick.is_some()).count();
    let leaked: usize = records.iter().map(|r| r.summary.residual_infected).sum();
    info!("{} of {} trial(s) died out on their own.", extinct, records.len());
    if leaked > 0 {
        error!("{} infected cell(s) were left behind across all trials.", leaked);
    }

    // --- Save Recorded Data ---
    if config.output.save_stats {
        save_snapshots(&config, &records)?;
    } else {
        info!("Skipping saving snapshots as per config (save_stats is false).");
    }

    if config.output.save_summary {
        save_summary(&config, &records)?;
    } else {
        info!("Skipping saving trial summary as per config.");
    }

    info!("Contagion run complete.");
    Ok(())
}

fn save_snapshots(config: &ScenarioConfig, records: &[TrialRecord]) -> Result<()> {
    let base = &config.output.base_filename;
    let format = config.output.format.as_deref().unwrap_or("json");

    match format {
        "bincode" => {
            let filename = format!("{}_snapshots.bin", base);
            let file = File::create(&filename).with_context(|| format!("creating '{}'", filename))?;
            bincode::serialize_into(BufWriter::new(file), records)
                .with_context(|| format!("serializing snapshots to bincode in '{}'", filename))?;
            info!("All snapshots saved to {} (binary format)", filename);
        }
        "messagepack" => {
            let filename = format!("{}_snapshots.msgpack", base);
            let mut file = BufWriter::new(File::create(&filename).with_context(|| format!("creating '{}'", filename))?);
            rmp_serde::encode::write(&mut file, records)
                .with_context(|| format!("serializing snapshots to MessagePack in '{}'", filename))?;
            file.flush()?;
            info!("All snapshots saved to {} (MessagePack format)", filename);
        }
        other => {
            if other != "json" {
                warn!("Unknown output format: {}. Using JSON instead.", other);
            }
            let filename = format!("{}_snapshots.json", base);
            let json_string = serde_json::to_string(records).context("serializing snapshots to JSON")?;
            let mut file = File::create(&filename).with_context(|| format!("creating '{}'", filename))?;
            file.write_all(json_string.as_bytes())
                .with_context(|| format!("writing snapshot JSON to '{}'", filename))?;
            info!("All snapshots saved to {} ({} KB)", filename, json_string.len() / 1024);
        }
    }
    Ok(())
}

fn save_summary(config: &ScenarioConfig, records: &[TrialRecord]) -> Result<()> {
    let filename = format!("{}_trials.csv", config.output.base_filename);
    let mut writer = csv::Writer::from_path(&filename).with_context(|| format!("creating '{}'", filename))?;
    writer.write_record([
        "trial",
        "rng_seed",
        "seeded",
        "total_infected",
        "peak_active",
        "extinct_at_tick",
        "cancelled_at_tick",
        "residual_infected",
    ])?;
    let optional = |tick: Option<u64>| tick.map(|t| t.to_string()).unwrap_or_default();
    for record in records {
        let s = &record.summary;
        writer.write_record([
            s.trial.to_string(),
            s.rng_seed.to_string(),
            s.seeded.to_string(),
            s.total_infected.to_string(),
            s.peak_active.to_string(),
            optional(s.extinct_at_tick),
            optional(s.cancelled_at_tick),
            s.residual_infected.to_string(),
        ])?;
    }
    writer.flush()?;
    info!("Trial summary saved to {}", filename);
    Ok(())
}
