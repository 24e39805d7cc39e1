use anyhow::Context;
use aquifer_common::AssetId;
use aquifer_kernel::{
    Asset, HydraulicModel, ModelMetadata, Moment, SimulationRunner, SimulationState,
};
use aquifer_persist::{
    EngineConfig, HistoryDirection, HistoryOptions, Persistence, TransactOptions, WorktreeStore,
};
use aquifer_tools::{TopologyRunner, WorktreeInspector};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "aquifer-cli", about = "CLI tool for aquifer operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Engine configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and effective configuration
    Info,
    /// Walk through editing main, branching a scenario, and deleting it
    Walkthrough,
    /// Apply a run of edits, undo and redo all of them, and check replay
    Replay {
        /// Number of edits to apply
        #[arg(short, long, default_value = "20")]
        edits: u64,
    },
    /// Save a demo document to a store directory and load it back
    Store {
        /// Store directory
        path: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Info => {
            println!("aquifer-cli v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "config: simulation_follows_history={} scenario_name_prefix={:?}",
                config.simulation_follows_history, config.scenario_name_prefix
            );
        }
        Commands::Walkthrough => walkthrough(config)?,
        Commands::Replay { edits } => replay(config, edits)?,
        Commands::Store { path } => store_round_trip(config, path)?,
    }

    Ok(())
}

fn junction(id: u64) -> Moment {
    Moment::new(format!("add J{id}"))
        .put_asset(Asset::junction(AssetId(id), format!("J{id}")))
}

/// Run the topology check on `persistence`'s active snapshot and deliver it.
fn simulate_active(persistence: &mut Persistence) -> anyhow::Result<()> {
    let snapshot_id = persistence.worktree().active_snapshot_id().clone();
    let version = persistence.model_version().clone();
    let result = TopologyRunner.simulate(persistence.model());
    let outcome = persistence
        .sync_snapshot_simulation(&snapshot_id, SimulationState::finished(version, result))?;
    println!("simulation on {snapshot_id}: {outcome:?}");
    Ok(())
}

fn walkthrough(config: EngineConfig) -> anyhow::Result<()> {
    let mut p = Persistence::new(config);
    println!("{}", WorktreeInspector::summary(&p));

    p.transact(junction(1), TransactOptions::default())?;
    simulate_active(&mut p)?;
    println!("{}", WorktreeInspector::summary(&p));

    let scenario = p.create_scenario();
    println!("created {} ({})", scenario.name, scenario.id);
    match p.transact(junction(99), TransactOptions::default()) {
        Err(err) => println!("edit on main rejected: {err}"),
        Ok(_) => anyhow::bail!("main accepted an edit while locked"),
    }

    p.switch_to_snapshot(&scenario.id)?;
    p.transact(junction(2), TransactOptions::default())?;
    println!("{}", WorktreeInspector::summary(&p));
    for row in WorktreeInspector::list_scenarios(p.worktree()) {
        println!("  {row}");
    }
    println!(
        "main still has {} asset(s)",
        p.worktree().main().model().asset_count()
    );

    let active = p.delete_scenario(&scenario.id)?;
    println!("deleted {}; active is now {active}", scenario.name);
    println!("{}", WorktreeInspector::summary(&p));
    Ok(())
}

fn replay(config: EngineConfig, edits: u64) -> anyhow::Result<()> {
    let mut p = Persistence::new(config);
    let before = p.model().fingerprint();
    for id in 0..edits {
        p.transact(junction(id), TransactOptions::default())?;
        if id % 3 == 2 {
            p.transact(
                Moment::new(format!("drop J{}", id - 1)).delete_asset(AssetId(id - 1)),
                TransactOptions::default(),
            )?;
        }
    }
    let after = p.model().fingerprint();
    let applied = p.moment_log().len();

    while p
        .history_control(HistoryDirection::Undo, HistoryOptions::default())?
        .is_some()
    {}
    let undone = p.model().fingerprint();
    while p
        .history_control(HistoryDirection::Redo, HistoryOptions::default())?
        .is_some()
    {}
    let redone = p.model().fingerprint();

    println!("Edits applied: {applied}");
    println!("Empty:  {before:#018x}  after undo: {undone:#018x}");
    println!("Edited: {after:#018x}  after redo: {redone:#018x}");
    let replay_ok = p.active().verify_replay().is_ok();
    println!(
        "Match: {}",
        if before == undone && after == redone && replay_ok {
            "OK"
        } else {
            "MISMATCH"
        }
    );
    Ok(())
}

fn store_round_trip(config: EngineConfig, path: PathBuf) -> anyhow::Result<()> {
    let mut p = Persistence::new(config.clone());
    let model = HydraulicModel::new().apply_moment(
        &Moment::new("seed")
            .put_asset(Asset::reservoir(AssetId(1), "R1", 45.0))
            .put_asset(Asset::junction(AssetId(2), "J1"))
            .put_asset(Asset::pipe(AssetId(3), "P1", AssetId(1), AssetId(2))),
    );
    p.transact_import(model, ModelMetadata::default(), "demo-network")?;
    let scenario = p.create_scenario();
    p.switch_to_snapshot(&scenario.id)?;
    p.transact(junction(4), TransactOptions::default())?;

    let mut store = WorktreeStore::open(&path)
        .with_context(|| format!("opening store {}", path.display()))?;
    let revision = store.save(&p)?;
    store.verify_integrity()?;
    println!("saved revision {revision} to {}", path.display());

    let loaded = store.load_latest(config)?;
    println!("{}", WorktreeInspector::summary(&loaded));
    println!(
        "Match: {}",
        if loaded.model() == p.model() {
            "OK"
        } else {
            "MISMATCH"
        }
    );
    Ok(())
}
