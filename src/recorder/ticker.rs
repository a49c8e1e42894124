//! Cancellable one-second tick

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Periodic task feeding `epoch` into the recorder's tick queue
///
/// The task is aborted when the ticker is cancelled or dropped.
#[derive(Debug)]
pub(crate) struct Ticker {
    epoch: u64,
    handle: JoinHandle<()>,
}

impl Ticker {
    pub(crate) fn spawn(epoch: u64, period: Duration, tx: mpsc::UnboundedSender<u64>) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(epoch).is_err() {
                    break;
                }
            }
        });

        Self { epoch, handle }
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn cancel(self) {
        tracing::trace!("Cancelling tick epoch {}", self.epoch);
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_until_cancelled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ticker = Ticker::spawn(3, Duration::from_secs(1), tx);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        let mut received = Vec::new();
        while let Ok(epoch) = rx.try_recv() {
            received.push(epoch);
        }
        assert_eq!(received, vec![3, 3, 3]);

        ticker.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
    }
}
