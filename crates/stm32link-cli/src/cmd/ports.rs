use anyhow::Result;
use serde::Serialize;
use stm32link_core::protocol::{list_ports, PortInfo};

use crate::cmd::PortsArgs;

#[derive(Serialize)]
struct PortRow {
    name: String,
    vid: Option<String>,
    pid: Option<String>,
    product: Option<String>,
}

impl From<PortInfo> for PortRow {
    fn from(p: PortInfo) -> Self {
        Self {
            name: p.name,
            vid: p.vid.map(|v| format!("{v:04x}")),
            pid: p.pid.map(|v| format!("{v:04x}")),
            product: p.product,
        }
    }
}

pub fn run(args: PortsArgs) -> Result<()> {
    let rows: Vec<PortRow> = list_ports().into_iter().map(PortRow::from).collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("no serial ports found");
        return Ok(());
    }
    for row in rows {
        let usb = match (&row.vid, &row.pid) {
            (Some(vid), Some(pid)) => format!("{vid}:{pid}"),
            _ => "-".to_string(),
        };
        println!(
            "{:<24} {:<10} {}",
            row.name,
            usb,
            row.product.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
