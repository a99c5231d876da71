use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::MissedTickBehavior;

use crate::domain::ports::TickerSource;

/// Ticker backed by a tokio interval. Each call spawns a forwarding task that
/// stamps wall-clock time into a 1-slot channel; a tick that finds the slot
/// occupied is dropped, never queued.
pub struct IntervalTicker;

impl TickerSource for IntervalTicker {
    fn ticks(&self, period: Duration) -> mpsc::Receiver<SystemTime> {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first interval tick fires immediately; skip it so the first
            // signal arrives one full period after subscription.
            interval.tick().await;
            loop {
                interval.tick().await;
                match tx.try_send(SystemTime::now()) {
                    Ok(()) | Err(TrySendError::Full(_)) => {}
                    Err(TrySendError::Closed(_)) => break,
                }
            }
        });
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn when_period_elapses_then_a_tick_is_delivered() {
        let mut rx = IntervalTicker.ticks(Duration::from_secs(1));

        tokio::time::advance(Duration::from_millis(1100)).await;
        let tick = rx.recv().await;
        assert!(tick.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn when_consumer_is_slow_then_extra_ticks_are_dropped() {
        let mut rx = IntervalTicker.ticks(Duration::from_millis(100));

        // Let many periods elapse without consuming; only one signal may be
        // buffered in the 1-slot channel.
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn when_receiver_is_dropped_then_the_forwarding_task_stops() {
        let rx = IntervalTicker.ticks(Duration::from_millis(50));
        drop(rx);

        // Advancing time must not panic or leak sends after closure.
        tokio::time::advance(Duration::from_secs(1)).await;
    }
}
