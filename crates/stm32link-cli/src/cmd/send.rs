use anyhow::{Context, Result};
use stm32link_core::protocol::{LinkController, LinkError};

use crate::cmd::SendArgs;

pub fn run(args: SendArgs) -> Result<()> {
    let config = args.link.to_config()?;
    let mut link = LinkController::new();
    link.connect(config.clone())
        .with_context(|| format!("connecting to {} @ {}", config.port_name, config.baud_rate))?;

    let result = match (&args.raw, args.amplitude, args.frequency) {
        (Some(raw), _, _) => link.send_raw(raw),
        (None, Some(amplitude), Some(frequency)) => link.send_command(amplitude, frequency),
        _ => Err(LinkError::InvalidCommand(
            "need --raw or --amplitude with --frequency".into(),
        )),
    };
    link.disconnect();

    result.context("sending command")?;
    println!("sent to {}", config.port_name);
    Ok(())
}
