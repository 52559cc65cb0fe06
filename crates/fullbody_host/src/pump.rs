// SPDX-License-Identifier: MIT OR Apache-2.0
//! Background update pump.
//!
//! A thread that measures real elapsed time and posts it to the scheduler
//! context at a fixed rate. The scheduler itself never leaves the thread
//! that owns it; the pump only sends `dt` values over a channel.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Default tick rate in Hz
pub const DEFAULT_RATE_HZ: f32 = 60.0;

fn interval_for(hz: f32) -> Duration {
    let hz = if hz.is_finite() && hz > 0.0 { hz } else { DEFAULT_RATE_HZ };
    Duration::from_secs_f64(1.0 / f64::from(hz))
}

/// Posts measured frame deltas at a configurable rate
pub struct UpdatePump {
    running: Arc<AtomicBool>,
    interval: Arc<RwLock<Duration>>,
    handle: Option<JoinHandle<()>>,
}

impl UpdatePump {
    /// Create a stopped pump
    pub fn new(hz: f32) -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            interval: Arc::new(RwLock::new(interval_for(hz))),
            handle: None,
        }
    }

    /// Start posting deltas to `tx`.
    ///
    /// Returns `Ok(false)` if the pump was already running. The thread exits
    /// on [`UpdatePump::stop`] or once the receiver is dropped.
    pub fn start(&mut self, tx: Sender<f32>) -> std::io::Result<bool> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }

        let running = Arc::clone(&self.running);
        let interval = Arc::clone(&self.interval);
        let spawned = std::thread::Builder::new()
            .name("fullbody-pump".to_string())
            .spawn(move || {
                let mut last = Instant::now();
                while running.load(Ordering::SeqCst) {
                    let now = Instant::now();
                    let dt = now.duration_since(last).as_secs_f32();
                    last = now;

                    if tx.send(dt).is_err() {
                        tracing::debug!("Pump: receiver gone, stopping");
                        running.store(false, Ordering::SeqCst);
                        break;
                    }

                    let wait = *interval.read();
                    std::thread::sleep(wait);
                }
            });

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(interval = ?self.interval(), "Pump: started");
                Ok(true)
            }
            Err(err) => {
                self.running.store(false, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    /// Stop the pump and wait for its thread
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Pump: thread panicked");
            }
            tracing::info!("Pump: stopped");
        }
    }

    /// Change the tick rate; takes effect after the current sleep
    #[allow(dead_code)] // Intentionally kept for API completeness
    pub fn set_rate(&self, hz: f32) {
        *self.interval.write() = interval_for(hz);
    }

    /// Interval between posts
    pub fn interval(&self) -> Duration {
        *self.interval.read()
    }

    /// Whether the pump thread is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for UpdatePump {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_rate() {
        let pump = UpdatePump::new(50.0);
        assert!((pump.interval().as_secs_f64() - 0.02).abs() < 1e-6);
        pump.set_rate(0.0);
        assert_eq!(pump.interval(), interval_for(DEFAULT_RATE_HZ));
        assert!(!pump.is_running());
    }

    #[test]
    fn test_posts_deltas_until_stopped() {
        let (tx, rx) = mpsc::channel();
        let mut pump = UpdatePump::new(500.0);
        assert!(pump.start(tx.clone()).unwrap());
        assert!(!pump.start(tx).unwrap());

        let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(first >= 0.0);
        assert!(second > 0.0);

        pump.stop();
        assert!(!pump.is_running());
    }

    #[test]
    fn test_stops_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel();
        let mut pump = UpdatePump::new(500.0);
        pump.start(tx).unwrap();
        drop(rx);
        // join returns once the thread notices the closed channel
        pump.stop();
        assert!(!pump.is_running());
    }
}
