//! Periodic cleanup of expired in-memory state.
//!
//! Counters and OTP records reset/expire lazily, so correctness never
//! waits on this task — it exists purely to reclaim memory for keys
//! that stopped arriving. Runs on its own thread with an explicit
//! start/stop lifecycle, and each pass locks one shard at a time so
//! request-path operations are never stalled behind a full sweep.

use crate::clock::Clock;
use crate::counter::WindowedCounterStore;
use crate::otp::OtpVerifier;
use crate::rate_limiter::RateLimiter;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// The stores a sweep pass visits.
pub struct SweepTargets {
    pub counters: Arc<WindowedCounterStore>,
    pub limiter:  Arc<RateLimiter>,
    pub otp:      Arc<OtpVerifier>,
    pub clock:    Arc<dyn Clock>,
}

pub struct CleanupSweeper {
    shutdown: Option<mpsc::Sender<()>>,
    handle:   Option<JoinHandle<()>>,
}

impl CleanupSweeper {
    /// Spawn the sweeper thread. It sleeps `interval` between passes
    /// and exits promptly when stopped.
    pub fn start(interval: Duration, targets: SweepTargets) -> Self {
        let (tx, rx) = mpsc::channel::<()>();
        let handle = std::thread::Builder::new()
            .name("cleanup-sweeper".to_string())
            .spawn(move || loop {
                match rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let now = targets.clock.now();
                        let counters = targets.counters.sweep_expired();
                        let buckets = targets.limiter.sweep_idle();
                        let otps = targets.otp.cleanup_expired(now);
                        log::info!(
                            "sweep pass: {counters} counters, {buckets} buckets, {otps} otp records"
                        );
                    }
                    // Stop signal or sender dropped — either way, done.
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .expect("failed to spawn cleanup-sweeper thread");
        Self { shutdown: Some(tx), handle: Some(handle) }
    }

    /// Signal the thread and wait for it to exit. Idempotent.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CleanupSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}
