//! Speaking timer
//!
//! Emits a tick per interval while a speaker holds the floor. The elapsed
//! time itself is always recomputed from the stored start instant; the
//! timer only decides when to redraw.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

pub struct SpeakingTimer {
    interval: Duration,
    tx: mpsc::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl SpeakingTimer {
    pub fn new(interval: Duration, tx: mpsc::Sender<()>) -> Self {
        Self {
            interval,
            tx,
            handle: None,
        }
    }

    /// Start the timer when someone is speaking, abort it otherwise
    pub fn sync(&mut self, running: bool) {
        match (running, self.handle.is_some()) {
            (true, false) => {
                let tx = self.tx.clone();
                let period = self.interval;
                self.handle = Some(tokio::spawn(async move {
                    let mut interval = tokio::time::interval(period);
                    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                    // First tick completes immediately
                    interval.tick().await;
                    loop {
                        interval.tick().await;
                        if tx.send(()).await.is_err() {
                            break;
                        }
                    }
                }));
                debug!("Speaking timer started");
            }
            (false, true) => {
                if let Some(handle) = self.handle.take() {
                    handle.abort();
                }
                debug!("Speaking timer stopped");
            }
            _ => {}
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for SpeakingTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
