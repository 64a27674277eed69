//! Command-line front end for one-off decisions and knowledge-base lookups.
//! Usage:
//!   uma-pilot decide <screenshot.png> [config.json]
//!   uma-pilot lookup <event name> [config.json]

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use uma_advisor::{analyze, PriorityConfig};
use uma_capture::StillImageSource;
use uma_data::KnowledgeBase;
use uma_pilot_lib::{AppConfig, DecisionPipeline};

const USAGE: &str = "Usage:\n  uma-pilot decide <screenshot.png> [config.json]\n  uma-pilot lookup <event name> [config.json]";

fn main() -> Result<()> {
    uma_pilot_lib::init_tracing();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }
    let config_path = args
        .get(3)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.json"));
    let config = AppConfig::load(&config_path)?;

    match args[1].as_str() {
        "decide" => decide(Path::new(&args[2]), config),
        "lookup" => lookup(&args[2], &config),
        other => bail!("Unknown command '{}'\n{}", other, USAGE),
    }
}

fn decide(screenshot: &Path, config: AppConfig) -> Result<()> {
    let pipeline = DecisionPipeline::from_config(config)?;
    let mut source = StillImageSource::open(screenshot)?;
    let outcome = pipeline.run_cycle(&mut source);
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if let Some((x, y)) = outcome.tap_point() {
        println!("Tap at ({}, {})", x, y);
    }
    Ok(())
}

fn lookup(text: &str, config: &AppConfig) -> Result<()> {
    let knowledge = KnowledgeBase::load(&config.data_dir)
        .context("Failed to load knowledge base")?
        .with_min_substring_len(config.min_substring_len);
    let priorities = PriorityConfig::load(&config.priority_path)?;

    let Some((tier, hits)) = knowledge.lookup(text) else {
        println!("Unknown event: '{}'", text);
        return Ok(());
    };
    println!("{} match(es) at tier {:?}", hits.len(), tier);

    for record in hits {
        println!("\n{} (source: {})", record.name, record.source_label());
        let (tagged, resolution) = analyze(record, &priorities);
        for (option, tags) in record.options.iter().zip(&tagged) {
            let marker = match &resolution {
                Some(r) if r.label == option.label => "=>",
                _ => "  ",
            };
            println!(
                "{} {}: {}  good={:?} bad={:?}",
                marker,
                option.label,
                option.rewards_inline(),
                tags.good_tags,
                tags.bad_tags
            );
        }
        if let Some(r) = resolution {
            println!("Recommend: {} ({})", r.label, r.rationale);
        }
    }
    Ok(())
}
