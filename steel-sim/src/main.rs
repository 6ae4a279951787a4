//! Runs the demo scene for the configured number of ticks.

use std::path::Path;

use anyhow::Context;
use steel_sim::{CONFIG_PATH, SimConfig, SimWorld, logger, scene};

fn main() -> anyhow::Result<()> {
    let config = SimConfig::load_or_create(Path::new(CONFIG_PATH))
        .with_context(|| format!("loading {CONFIG_PATH}"))?;
    logger::init(&config.log).context("installing the log subscriber")?;

    let ticks = config.ticks;
    let mut world = SimWorld::new(config);
    scene::plant_demo(&mut world)?;

    let mut executed = 0;
    let mut deferred = 0;
    for _ in 0..ticks {
        let report = world.tick()?;
        executed += report.executed;
        deferred += report.deferred;
        if report.executed > 0 {
            log::debug!(
                "Tick {} ran {} updates in {} passes",
                report.age,
                report.executed,
                report.passes
            );
        }
    }

    log::info!(
        "Ran {ticks} ticks: {executed} updates executed, {deferred} deferred to the global phase, {} still pending",
        world.pending_updates()
    );
    Ok(())
}
