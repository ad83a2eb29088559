//! Repeating countdown task with an explicit cancel handle.
//!
//! The task only emits tick markers; decrementing the remaining time is
//! done by whoever owns the session state. Every tick carries the
//! generation of the countdown that produced it, so the owner can drop
//! ticks that were already queued when a countdown was cancelled.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;

/// Handle to a running countdown. Dropping it cancels the task.
pub struct Countdown {
    generation: u64,
    token: CancellationToken,
}

impl Countdown {
    /// Spawn a countdown that sends `generation` on `ticks` once per `period`.
    ///
    /// The first tick fires one full period after the call. `period` must
    /// be non-zero.
    pub fn start(period: Duration, generation: u64, ticks: mpsc::UnboundedSender<u64>) -> Self {
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    biased;
                    _ = child.cancelled() => break,
                    _ = interval.tick() => {
                        if ticks.send(generation).is_err() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!(generation, "countdown stopped");
        });
        Self { generation, token }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Stop emitting ticks. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let start = Instant::now();
        let countdown = Countdown::start(Duration::from_secs(1), 7, tx);

        assert_eq!(rx.recv().await, Some(7));
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert_eq!(rx.recv().await, Some(7));
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert_eq!(countdown.generation(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let countdown = Countdown::start(Duration::from_secs(1), 1, tx);
        assert_eq!(rx.recv().await, Some(1));

        countdown.cancel();
        assert!(countdown.is_cancelled());

        // The task exits and drops its sender, so the channel closes.
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        drop(Countdown::start(Duration::from_secs(1), 1, tx));
        assert_eq!(rx.recv().await, None);
    }
}
