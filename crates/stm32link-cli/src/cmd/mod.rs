use anyhow::Result;
use clap::{ArgGroup, Args, Subcommand};
use stm32link_core::protocol::{LinkConfig, DEFAULT_BAUD_RATE};

pub mod autoconnect;
pub mod monitor;
pub mod ports;
pub mod send;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List serial ports in autoconnect order.
    Ports(PortsArgs),
    /// Connect and print received lines; stdin lines are sent to the board.
    Monitor(MonitorArgs),
    /// Send a single command and disconnect.
    Send(SendArgs),
    /// Scan ports and baud rates for the first one that opens.
    Autoconnect(AutoconnectArgs),
}

pub fn run(command: Command) -> Result<()> {
    match command {
        Command::Ports(args) => ports::run(args),
        Command::Monitor(args) => monitor::run(args),
        Command::Send(args) => send::run(args),
        Command::Autoconnect(args) => autoconnect::run(args),
    }
}

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Serial port (e.g. /dev/ttyACM0, COM3).
    #[arg(long, env = "STM32LINK_PORT")]
    pub port: String,

    /// Baud rate.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE, env = "STM32LINK_BAUD")]
    pub baud: u32,
}

impl LinkArgs {
    pub fn to_config(&self) -> Result<LinkConfig> {
        Ok(LinkConfig::new(self.port.as_str(), self.baud)?)
    }
}

#[derive(Args, Debug)]
pub struct PortsArgs {
    /// Emit JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub link: LinkArgs,

    /// Drain period in milliseconds.
    #[arg(long, default_value_t = 50)]
    pub interval_ms: u64,

    /// Emit one JSON object per received line.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("payload").required(true).args(["amplitude", "raw"])))]
pub struct SendArgs {
    #[command(flatten)]
    pub link: LinkArgs,

    /// Amplitude in percent (0-100).
    #[arg(long, requires = "frequency")]
    pub amplitude: Option<u16>,

    /// Frequency in Hz (1-1000).
    #[arg(long, requires = "amplitude")]
    pub frequency: Option<u16>,

    /// Manual command, padded/truncated to 9 characters.
    #[arg(long)]
    pub raw: Option<String>,
}

#[derive(Args, Debug)]
pub struct AutoconnectArgs {
    /// Candidate port; repeat for several. Defaults to every detected port.
    #[arg(long)]
    pub port: Vec<String>,

    /// Candidate baud rate; repeat for several. Defaults to every supported rate.
    #[arg(long)]
    pub baud: Vec<u32>,

    /// Keep the link open and monitor it.
    #[arg(long)]
    pub monitor: bool,

    /// Drain period in milliseconds when monitoring.
    #[arg(long, default_value_t = 50)]
    pub interval_ms: u64,

    /// Emit JSON.
    #[arg(long)]
    pub json: bool,
}
