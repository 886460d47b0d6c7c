//! Poll-until-ready primitive
//!
//! Every wait in Liquid has the same shape: poll immediately, then keep
//! polling at a fixed interval until the target is ready, the deadline
//! passes, or the target decides it can no longer become ready in time.
//! Giving up early is a normal outcome, not an error.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// Timing of one poll attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTick {
    /// Zero-based attempt number.
    pub attempt: u32,
    pub elapsed: Duration,
    /// Time left before the deadline.
    pub remaining: Duration,
}

/// Something that can be polled until it is ready
#[async_trait]
pub trait PollTarget: Send {
    type Output: Send;
    type Error: Send;

    /// Poll once. `Some` ends the wait.
    async fn poll(&mut self, tick: &PollTick) -> Result<Option<Self::Output>, Self::Error>;

    /// Whether readiness is out of reach given the time left.
    fn hopeless(&self, _tick: &PollTick) -> bool {
        false
    }
}

/// How a poll loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready(T),
    /// The deadline passed.
    TimedOut,
    /// The target reported it could no longer become ready in time.
    GaveUp,
}

/// Drives a [`PollTarget`] against an interval and a deadline
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    interval: Duration,
    started: Instant,
    deadline: Instant,
}

impl Poller {
    /// Start a poller whose deadline is `budget` from now.
    pub fn new(interval: Duration, budget: Duration) -> Self {
        let started = Instant::now();
        Self {
            interval,
            started,
            deadline: started + budget,
        }
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn tick(&self, attempt: u32) -> PollTick {
        let now = Instant::now();
        PollTick {
            attempt,
            elapsed: now.saturating_duration_since(self.started),
            remaining: self.deadline.saturating_duration_since(now),
        }
    }

    /// Poll until ready, timed out or hopeless.
    ///
    /// The first poll happens immediately. Sleeps never extend past the
    /// deadline.
    pub async fn run<P: PollTarget>(&self, target: &mut P) -> Result<PollOutcome<P::Output>, P::Error> {
        let mut attempt = 0;

        loop {
            let tick = self.tick(attempt);
            if let Some(output) = target.poll(&tick).await? {
                return Ok(PollOutcome::Ready(output));
            }

            let after = self.tick(attempt);
            if after.remaining.is_zero() {
                return Ok(PollOutcome::TimedOut);
            }
            if target.hopeless(&after) {
                return Ok(PollOutcome::GaveUp);
            }

            tokio::time::sleep(self.interval.min(after.remaining)).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    /// Ready once `ready_at` attempts have been made.
    struct Countdown {
        ready_at: u32,
        ticks: Vec<PollTick>,
        give_up_below: Option<Duration>,
    }

    impl Countdown {
        fn new(ready_at: u32) -> Self {
            Self {
                ready_at,
                ticks: Vec::new(),
                give_up_below: None,
            }
        }
    }

    #[async_trait]
    impl PollTarget for Countdown {
        type Output = u32;
        type Error = Infallible;

        async fn poll(&mut self, tick: &PollTick) -> Result<Option<u32>, Infallible> {
            self.ticks.push(*tick);
            Ok((tick.attempt + 1 >= self.ready_at).then_some(tick.attempt))
        }

        fn hopeless(&self, tick: &PollTick) -> bool {
            self.give_up_below
                .map(|limit| tick.remaining < limit)
                .unwrap_or(false)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_is_immediate() {
        let poller = Poller::new(Duration::from_secs(3), Duration::from_secs(60));
        let mut target = Countdown::new(1);

        let outcome = poller.run(&mut target).await.unwrap();
        assert_eq!(outcome, PollOutcome::Ready(0));
        assert_eq!(target.ticks[0].elapsed, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_at_interval() {
        let poller = Poller::new(Duration::from_secs(3), Duration::from_secs(60));
        let mut target = Countdown::new(4);

        let outcome = poller.run(&mut target).await.unwrap();
        assert_eq!(outcome, PollOutcome::Ready(3));
        let elapsed: Vec<u64> = target.ticks.iter().map(|t| t.elapsed.as_secs()).collect();
        assert_eq!(elapsed, vec![0, 3, 6, 9]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_without_overshooting() {
        let poller = Poller::new(Duration::from_secs(4), Duration::from_secs(10));
        let mut target = Countdown::new(u32::MAX);

        let outcome = poller.run(&mut target).await.unwrap();
        assert_eq!(outcome, PollOutcome::TimedOut);

        // 0, 4, 8, then a clamped 2s sleep to the deadline.
        let elapsed: Vec<u64> = target.ticks.iter().map(|t| t.elapsed.as_secs()).collect();
        assert_eq!(elapsed, vec![0, 4, 8, 10]);
        assert_eq!(poller.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_before_next_poll() {
        let poller = Poller::new(Duration::from_secs(1), Duration::from_secs(10));
        let mut target = Countdown::new(u32::MAX);
        target.give_up_below = Some(Duration::from_secs(5));

        let outcome = poller.run(&mut target).await.unwrap();
        assert_eq!(outcome, PollOutcome::GaveUp);

        // At 6s there are 4s left, which is below the limit.
        assert_eq!(target.ticks.last().unwrap().elapsed, Duration::from_secs(6));
    }
}
