//! Serial port handling
//!
//! Port enumeration and low-level opening/configuration for the board link.

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;
use std::time::Duration;

use super::{LinkConfig, LinkError};

/// Information about an available serial port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyACM0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Product name (if available)
    pub product: Option<String>,
}

impl PortInfo {
    fn bare(name: String) -> Self {
        Self {
            name,
            vid: None,
            pid: None,
            product: None,
        }
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        match info.port_type {
            SerialPortType::UsbPort(usb_info) => Self {
                name: info.port_name,
                vid: Some(usb_info.vid),
                pid: Some(usb_info.pid),
                product: usb_info.product,
            },
            _ => Self::bare(info.port_name),
        }
    }
}

/// Sort key putting ttyACM* first (STM32 virtual COM ports), then ttyUSB*,
/// then everything else; numeric suffixes sort numerically
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    if let Some(rest) = basename.strip_prefix("ttyACM") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (0, num, basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("ttyUSB") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (1, num, basename.to_string());
    }
    (2, 0, basename.to_string())
}

/// List all available serial ports, with /dev fallbacks and deterministic ordering
pub fn list_ports() -> Vec<PortInfo> {
    let mut map: HashMap<String, PortInfo> = HashMap::new();
    match serialport::available_ports() {
        Ok(ports) => {
            for info in ports {
                let p = PortInfo::from(info);
                map.entry(p.name.clone()).or_insert(p);
            }
        }
        Err(e) => tracing::warn!("serial port enumeration failed: {e}"),
    }

    // Linux-only: pick up /dev/ttyACM* and /dev/ttyUSB* the API missed
    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname.starts_with("ttyACM") || fname.starts_with("ttyUSB") {
                    let full = format!("/dev/{}", fname);
                    map.entry(full.clone())
                        .or_insert_with(|| PortInfo::bare(full));
                }
            }
        }
    }

    let mut v: Vec<PortInfo> = map.into_values().collect();
    v.sort_by_key(|p| port_sort_key(&p.name));
    v
}

/// Port names in autoconnect order
pub fn candidate_ports() -> Vec<String> {
    list_ports().into_iter().map(|p| p.name).collect()
}

/// Open a serial port for the given link configuration
pub fn open_port(config: &LinkConfig) -> Result<Box<dyn SerialPort>, LinkError> {
    serialport::new(&config.port_name, config.baud_rate)
        .timeout(Duration::from_millis(config.read_timeout_ms))
        .open()
        .map_err(|e| LinkError::ConnectionFailed(format!("{}: {}", config.port_name, e)))
}

/// Configure a serial port for the board: 8N1, no flow control
pub fn configure_port(port: &mut dyn SerialPort) -> Result<(), LinkError> {
    port.set_data_bits(serialport::DataBits::Eight)
        .map_err(|e| LinkError::ConnectionFailed(e.to_string()))?;
    port.set_parity(serialport::Parity::None)
        .map_err(|e| LinkError::ConnectionFailed(e.to_string()))?;
    port.set_stop_bits(serialport::StopBits::One)
        .map_err(|e| LinkError::ConnectionFailed(e.to_string()))?;
    port.set_flow_control(serialport::FlowControl::None)
        .map_err(|e| LinkError::ConnectionFailed(e.to_string()))?;
    Ok(())
}

/// Discard unread input
pub fn clear_input(port: &mut dyn SerialPort) -> Result<(), LinkError> {
    port.clear(serialport::ClearBuffer::Input)
        .map_err(|e| LinkError::ConnectionFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_list_ports() {
        // Only checks enumeration doesn't panic on this host
        let ports = list_ports();
        for port in &ports {
            println!("Found port: {} - {:?}", port.name, port.product);
        }
    }

    #[test]
    fn test_port_sorting() {
        let names = vec![
            "/dev/ttyUSB1",
            "/dev/ttyACM1",
            "/dev/ttyUSB0",
            "/dev/ttyACM0",
            "/dev/someport",
            "/dev/ttyACM10",
        ];
        let mut ports: Vec<PortInfo> = names
            .into_iter()
            .map(|n| PortInfo::bare(n.to_string()))
            .collect();

        ports.sort_by_key(|p| port_sort_key(&p.name));
        let ordered: Vec<String> = ports.into_iter().map(|p| p.name).collect();

        assert_eq!(
            ordered,
            vec![
                "/dev/ttyACM0",
                "/dev/ttyACM1",
                "/dev/ttyACM10",
                "/dev/ttyUSB0",
                "/dev/ttyUSB1",
                "/dev/someport",
            ]
        );
    }

    #[test]
    fn test_open_nonexistent_port_fails() {
        let config = LinkConfig::new("/dev/does-not-exist-stm32link", 115200).unwrap();
        assert!(matches!(
            open_port(&config),
            Err(LinkError::ConnectionFailed(_))
        ));
    }
}
