use anyhow::{Context, Result};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use stm32link_core::protocol::{Frame, LinkController};

use crate::cmd::MonitorArgs;

pub fn run(args: MonitorArgs) -> Result<()> {
    let config = args.link.to_config()?;
    let mut link = LinkController::new();
    link.connect(config.clone())
        .with_context(|| format!("connecting to {} @ {}", config.port_name, config.baud_rate))?;

    watch(&mut link, Duration::from_millis(args.interval_ms), args.json)
}

/// Periodic drain loop until Ctrl-C or link loss, then disconnect
pub fn watch(link: &mut LinkController, interval: Duration, json: bool) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))
        .context("installing Ctrl-C handler")?;

    let input = spawn_stdin_reader();
    let mut stdin_open = true;
    let mut seq = 0u64;

    while running.load(Ordering::SeqCst) {
        print_frames(link, json, &mut seq);

        while stdin_open {
            match input.try_recv() {
                Ok(line) => handle_input(link, &line),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => stdin_open = false,
            }
        }

        if !link.is_connected() {
            tracing::warn!("link lost");
            break;
        }
        thread::sleep(interval);
    }

    link.disconnect();
    print_frames(link, json, &mut seq);

    let counters = link.counters();
    tracing::info!("rx {} lines, tx {} commands", counters.received, counters.sent);
    Ok(())
}

fn print_frames(link: &mut LinkController, json: bool, seq: &mut u64) {
    let frames: Vec<Frame> = link.drain();
    for frame in frames {
        *seq += 1;
        if json {
            println!("{}", serde_json::json!({ "seq": *seq, "line": frame }));
        } else {
            println!("< {frame}");
        }
    }
}

fn handle_input(link: &mut LinkController, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    let result = match parse_amp_freq(line) {
        Some((amplitude, frequency)) => link.send_command(amplitude, frequency),
        None => link.send_raw(line),
    };
    match result {
        Ok(()) => println!("> {line}"),
        Err(e) => eprintln!("error: {e}"),
    }
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Accepts `A50 F440`, `a050f0440` and similar
fn parse_amp_freq(input: &str) -> Option<(u16, u16)> {
    let compact: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();
    let (amplitude, frequency) = compact.strip_prefix('A')?.split_once('F')?;
    Some((amplitude.parse().ok()?, frequency.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_amp_freq_forms() {
        assert_eq!(parse_amp_freq("A050F0440"), Some((50, 440)));
        assert_eq!(parse_amp_freq("a50 f440"), Some((50, 440)));
        assert_eq!(parse_amp_freq(" A 100  F 1000 "), Some((100, 1000)));
    }

    #[test]
    fn other_input_is_raw() {
        assert_eq!(parse_amp_freq("42"), None);
        assert_eq!(parse_amp_freq("AF"), None);
        assert_eq!(parse_amp_freq("A10"), None);
        assert_eq!(parse_amp_freq("RESET"), None);
    }
}
