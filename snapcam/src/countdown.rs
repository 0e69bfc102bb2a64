//! Countdown gating the capture.
//!
//! Two independent timers run side by side: a ticker advancing the progress
//! indicator and a deadline ending the countdown. They only share the start
//! instant, so the indicator may or may not have reached its cap at expiry.
use std::{pin::Pin, time::Duration};

use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior, Sleep};

/// Shortest tick interval; a zero period would make the ticker panic.
const MIN_TICK: Duration = Duration::from_millis(1);

/// Progress counter of the countdown indicator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    value: u8,
    max: u8,
}

impl Progress {
    pub fn new(max: u8) -> Self {
        Self { value: 0, max }
    }

    /// Add one unit unless the cap is reached.
    pub fn advance(&mut self) -> u8 {
        if self.value < self.max {
            self.value += 1;
        }
        self.value
    }
}

/// What woke the countdown up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountdownStep {
    Tick(u8),
    Expired,
}

pub struct Countdown {
    progress: Progress,
    ticker: Interval,
    deadline: Pin<Box<Sleep>>,
    expired: bool,
}

impl Countdown {
    /// Start both timers now.
    ///
    /// Must be called from within a Tokio runtime. `tick` is raised to 1 ms if
    /// shorter.
    pub fn start(total: Duration, tick: Duration, progress_max: u8) -> Self {
        let tick = tick.max(MIN_TICK);
        let now = Instant::now();
        let mut ticker = interval_at(now + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            progress: Progress::new(progress_max),
            ticker,
            deadline: Box::pin(sleep(total)),
            expired: false,
        }
    }

    /// Wait for the next tick or the expiry, whichever comes first.
    ///
    /// A tick due at the same instant as the deadline is delivered first. Once
    /// expired, the countdown never wakes up again.
    pub async fn next(&mut self) -> CountdownStep {
        if self.expired {
            return std::future::pending().await;
        }

        tokio::select! {
            biased;
            _ = self.ticker.tick() => CountdownStep::Tick(self.progress.advance()),
            _ = &mut self.deadline => {
                self.expired = true;
                CountdownStep::Expired
            }
        }
    }
}

/// Wait on an optional countdown, pending forever if there is none.
pub async fn next_step(countdown: &mut Option<Countdown>) -> CountdownStep {
    match countdown {
        Some(countdown) => countdown.next().await,
        None => std::future::pending().await,
    }
}
