//! Physical input stand-in
//!
//! The appliance has two momentary inputs: the capture trigger and the
//! config-entry input. On a host build they map to stdin commands:
//! `t` (or an empty line) taps the capture trigger, `c` holds the config
//! input long enough to trip the long-press escape hatch.

use std::io::BufRead;
use std::sync::mpsc::{Receiver, channel};
use std::time::{Duration, Instant};

use crate::pipeline::InputSample;

/// Polled provider of input snapshots
pub trait InputSource {
    /// Sample both inputs for this tick
    fn sample(&mut self) -> InputSample;
}

enum Command {
    Talk,
    Config,
}

/// Reads commands from stdin on a background thread
pub struct TermInput {
    rx: Receiver<Command>,
    talk_queued: bool,
    config_until: Option<Instant>,
    config_hold: Duration,
}

impl TermInput {
    /// Spawn the stdin reader.
    ///
    /// `config_hold` is the long-press threshold; a `c` command emulates
    /// holding the config input slightly longer than that.
    #[must_use]
    pub fn spawn(config_hold: Duration) -> Self {
        let (tx, rx) = channel();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                match line.trim() {
                    "t" | "" => {
                        if tx.send(Command::Talk).is_err() {
                            break;
                        }
                    }
                    "c" => {
                        if tx.send(Command::Config).is_err() {
                            break;
                        }
                    }
                    other => {
                        tracing::debug!(input = other, "ignoring unknown command");
                    }
                }
            }
        });
        Self {
            rx,
            talk_queued: false,
            config_until: None,
            config_hold,
        }
    }
}

impl InputSource for TermInput {
    fn sample(&mut self) -> InputSample {
        while let Ok(command) = self.rx.try_recv() {
            match command {
                Command::Talk => self.talk_queued = true,
                Command::Config => {
                    self.config_until =
                        Some(Instant::now() + self.config_hold + Duration::from_millis(250));
                }
            }
        }

        let talk_pressed = std::mem::take(&mut self.talk_queued);
        let config_held = self
            .config_until
            .is_some_and(|until| Instant::now() < until);
        if !config_held {
            self.config_until = None;
        }

        InputSample {
            talk_pressed,
            config_held,
        }
    }
}
