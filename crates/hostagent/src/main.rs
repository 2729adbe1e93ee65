//! hostagentd entry point.
//!
//! Replays a scenario against the host table running on the in-memory ASIC,
//! optionally warm-booting from the hardware state a previous run saved, then
//! writes the table snapshot and the new hardware state.

use anyhow::Context;
use clap::Parser;
use hostagent::audit::{AuditCategory, AuditOutcome, AuditRecord};
use hostagent::replay::{load_hw_state, save_hw_state};
use hostagent::{audit_log, HostAgentConfig, HostTable, Replayer, Scenario, WarmBootCache};
use hosttable_sai::{SimSwitch, SwitchHw};
use log::{error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// L3 host table agent
#[derive(Parser, Debug)]
#[command(name = "hostagentd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scenario to replay (JSON)
    scenario: PathBuf,

    /// Configuration file
    #[arg(short = 'c', long, default_value = hostagent::config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short = 'l', long)]
    log_level: Option<String>,

    /// Enable warm boot from the saved hardware state
    #[arg(long)]
    warm_boot: bool,

    /// Hardware state file; overrides the config file
    #[arg(long)]
    hw_state: Option<PathBuf>,

    /// Widest ECMP group to program; overrides the config file
    #[arg(long)]
    max_ecmp_width: Option<usize>,

    /// Write the table snapshot here instead of stdout
    #[arg(short = 'o', long)]
    snapshot: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("hostagentd: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut logger = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.logging.level),
    );
    if !config.host_table.audit {
        logger.filter_module("audit", log::LevelFilter::Off);
    }
    logger.init();

    match run(&args, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("hostagentd: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &Args) -> anyhow::Result<HostAgentConfig> {
    let mut config = HostAgentConfig::load_or_default(&args.config)?;
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if args.warm_boot {
        config.warm_boot.enabled = true;
    }
    if let Some(path) = &args.hw_state {
        config.warm_boot.hw_state_file = path.clone();
    }
    if let Some(width) = args.max_ecmp_width {
        config.host_table.max_ecmp_width = width;
    }
    config.validate()?;
    Ok(config)
}

fn run(args: &Args, config: &HostAgentConfig) -> anyhow::Result<()> {
    info!("Starting hostagentd");
    let scenario = Scenario::load(&args.scenario)?;
    info!(
        "Loaded scenario {}: {} interfaces, {} steps",
        args.scenario.display(),
        scenario.interfaces.len(),
        scenario.steps.len()
    );

    let state_file = &config.warm_boot.hw_state_file;
    let saved = if config.warm_boot.enabled {
        load_hw_state(state_file)?
    } else {
        None
    };
    let warm = saved.is_some();
    if config.warm_boot.enabled && !warm {
        warn!("No hardware state at {}, cold booting", state_file.display());
    }
    let hw = Arc::new(saved.map(SimSwitch::restore).unwrap_or_default());

    audit_log!(AuditRecord::new(AuditCategory::SystemLifecycle, "hostagentd", "start")
        .with_outcome(AuditOutcome::Success)
        .with_details(serde_json::json!({
            "warm_boot": warm,
            "max_ecmp_width": config.host_table.max_ecmp_width,
        })));

    let mut table = HostTable::new(
        config.host_table_config(),
        hw.clone(),
        Arc::new(scenario.interface_map()),
    );
    if warm {
        let cache = WarmBootCache::from_dump(hw.dump());
        table = table.with_warm_boot_cache(Box::new(cache));
    }

    let mut replayer = Replayer::new();
    let replayed = replayer.run(&mut table, &scenario.steps);

    if warm {
        let summary = table.complete_warm_boot(config.warm_boot.purge_orphans)?;
        info!(
            "Warm boot reconciled: {} claimed, {} orphans, {} purged",
            summary.claimed,
            summary.orphans.object_count(),
            summary.purged
        );
    }
    replayed.context("scenario replay failed")?;

    let snapshot = table
        .snapshot()
        .to_json_pretty()
        .context("failed to serialize table snapshot")?;
    match &args.snapshot {
        Some(path) => std::fs::write(path, snapshot)
            .with_context(|| format!("failed to write snapshot to {}", path.display()))?,
        None => println!("{}", snapshot),
    }

    save_hw_state(state_file, &hw.snapshot())?;
    let stats = table.stats();
    info!(
        "hostagentd exiting: {} hosts, {} ECMP hosts, {} egresses, {} warm-boot claims",
        table.host_count(),
        table.ecmp_host_count(),
        table.egress_count(),
        stats.warm_boot_claims
    );
    Ok(())
}
