//! Outbound commands
//!
//! The firmware understands two ASCII line formats:
//! - `A###F####\n` : amplitude (percent, 3 digits) and frequency (Hz, 4 digits)
//! - a manual line, left-padded with `'0'` to a fixed 9 character field

use serde::{Deserialize, Serialize};

use super::LinkError;

/// Smallest accepted amplitude (percent)
pub const AMPLITUDE_MIN: u16 = 0;
/// Largest accepted amplitude (percent)
pub const AMPLITUDE_MAX: u16 = 100;
/// Smallest accepted frequency (Hz)
pub const FREQUENCY_MIN: u16 = 1;
/// Largest accepted frequency (Hz)
pub const FREQUENCY_MAX: u16 = 1000;

/// Width of the manual command field
pub const RAW_FIELD_WIDTH: usize = 9;

/// A validated amplitude/frequency pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmpFreq {
    amplitude: u16,
    frequency: u16,
}

impl AmpFreq {
    /// Validate a pair against the firmware's accepted ranges
    pub fn new(amplitude: u16, frequency: u16) -> Result<Self, LinkError> {
        if !(AMPLITUDE_MIN..=AMPLITUDE_MAX).contains(&amplitude) {
            return Err(LinkError::InvalidCommand(format!(
                "amplitude {} outside {}..={}",
                amplitude, AMPLITUDE_MIN, AMPLITUDE_MAX
            )));
        }
        if !(FREQUENCY_MIN..=FREQUENCY_MAX).contains(&frequency) {
            return Err(LinkError::InvalidCommand(format!(
                "frequency {} outside {}..={}",
                frequency, FREQUENCY_MIN, FREQUENCY_MAX
            )));
        }
        Ok(Self {
            amplitude,
            frequency,
        })
    }

    pub fn amplitude(&self) -> u16 {
        self.amplitude
    }

    pub fn frequency(&self) -> u16 {
        self.frequency
    }

    /// Wire form of this command
    pub fn encode(&self) -> String {
        encode_amplitude_frequency(self.amplitude, self.frequency)
    }
}

/// Encode an amplitude/frequency command.
///
/// Callers are expected to have checked the ranges already (see [`AmpFreq`]);
/// values wider than the field are written in full rather than truncated.
pub fn encode_amplitude_frequency(amplitude: u16, frequency: u16) -> String {
    format!("A{:03}F{:04}\n", amplitude, frequency)
}

/// Normalize manual input to the fixed 9 character field plus newline.
///
/// Short input is left-padded with `'0'`, long input keeps its last 9 characters.
pub fn encode_raw_line(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut line = String::with_capacity(RAW_FIELD_WIDTH + 1);
    if chars.len() < RAW_FIELD_WIDTH {
        line.extend(std::iter::repeat('0').take(RAW_FIELD_WIDTH - chars.len()));
        line.extend(chars.iter());
    } else {
        line.extend(chars[chars.len() - RAW_FIELD_WIDTH..].iter());
    }
    line.push('\n');
    line
}
