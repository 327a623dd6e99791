use anyhow::Context;

use drivebill_infra::Config;
use drivebill_sample::{Session, default_script};

fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    drivebill_observability::init_with(config.log_format);
    config.report_defaults();

    let catalog = config.load_catalog()?;
    let store = config.open_store()?;
    let mut session = Session::new(catalog, store, &config.tank_slot)
        .context("failed to load persisted tank level")?;

    if !session.boot(&config.public_key) {
        tracing::warn!("billing unavailable; purchases will be refused");
    }

    for step in default_script() {
        let report = session.play(step);
        tracing::info!(
            step = ?report.step,
            tank = report.tank_units,
            status = report.status.as_deref().unwrap_or(""),
            "step played"
        );
        if let Some(status) = &report.status {
            println!("{status}");
        }
    }

    Ok(())
}
