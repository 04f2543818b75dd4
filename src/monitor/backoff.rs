use std::time::Duration;

use async_trait::async_trait;

/// Delay inserted between a failure and the next connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    Fixed(Duration),
    /// Doubles per consecutive failure, starting at `initial`, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Fixed(Duration::from_secs(5))
    }
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (1-based count of consecutive
    /// failures; `0` is treated as `1`).
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            BackoffPolicy::Fixed(d) => d,
            BackoffPolicy::Exponential { initial, max } => {
                let shift = attempt.saturating_sub(1).min(31);
                initial
                    .checked_mul(1u32 << shift)
                    .map_or(max, |d| d.min(max))
            }
        }
    }
}

/// Source of suspension for the monitor, swapped out in tests so nothing
/// waits on the wall clock.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_ignores_attempts() {
        let p = BackoffPolicy::Fixed(Duration::from_secs(5));
        assert_eq!(p.delay(1), Duration::from_secs(5));
        assert_eq!(p.delay(40), Duration::from_secs(5));
    }

    #[test]
    fn exponential_doubles_then_caps() {
        let p = BackoffPolicy::Exponential {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(4),
        };
        assert_eq!(p.delay(0), Duration::from_millis(500));
        assert_eq!(p.delay(1), Duration::from_millis(500));
        assert_eq!(p.delay(2), Duration::from_secs(1));
        assert_eq!(p.delay(4), Duration::from_secs(4));
        assert_eq!(p.delay(5), Duration::from_secs(4));
        assert_eq!(p.delay(u32::MAX), Duration::from_secs(4));
    }
}
