use anyhow::{Context, Result};
use std::time::Duration;
use stm32link_core::protocol::{candidate_ports, LinkController, BAUD_RATES};

use crate::cmd::{monitor, AutoconnectArgs};

pub fn run(args: AutoconnectArgs) -> Result<()> {
    let ports = if args.port.is_empty() {
        candidate_ports()
    } else {
        args.port.clone()
    };
    let bauds = if args.baud.is_empty() {
        BAUD_RATES.to_vec()
    } else {
        args.baud.clone()
    };
    tracing::info!(
        "autoconnect: {} port(s) x {} baud rate(s)",
        ports.len(),
        bauds.len()
    );

    let mut link = LinkController::new();
    let config = link
        .autoconnect(&ports, &bauds)
        .context("autoconnect")?;

    if args.json {
        println!("{}", serde_json::to_string(&config)?);
    } else {
        println!("connected to {} @ {} bps", config.port_name, config.baud_rate);
    }

    if args.monitor {
        return monitor::watch(&mut link, Duration::from_millis(args.interval_ms), args.json);
    }
    link.disconnect();
    Ok(())
}
