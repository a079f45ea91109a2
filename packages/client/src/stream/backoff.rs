//! Reconnect delays.

use std::time::Duration;

/// Exponential backoff bounds: `min(base * 2^retry, max)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay to wait before the reconnect following `retry` failed cycles
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map_or(self.max, |delay| delay.min(self.max))
    }
}

impl Default for BackoffPolicy {
    /// 1s, 2s, 4s, 8s, then 10s forever
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(10))
    }
}

/// Retry counter driven by a [`BackoffPolicy`]
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    retry_count: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            retry_count: 0,
        }
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Delay for the current retry, then count the retry
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.policy.delay_for(self.retry_count);
        self.retry_count = self.retry_count.saturating_add(1);
        delay
    }

    /// Back to the base delay after a successful open
    pub fn reset(&mut self) {
        self.retry_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delays_double_until_capped() {
        // テスト項目: デフォルトの遅延は 1s から倍々に増え、10s で頭打ちになる
        // given (前提条件):
        let mut backoff = Backoff::new(BackoffPolicy::default());

        // when (操作):
        let delays: Vec<u128> = (0..7).map(|_| backoff.next_delay().as_millis()).collect();

        // then (期待する結果):
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 10000, 10000, 10000]);
        assert_eq!(backoff.retry_count(), 7);
    }

    #[test]
    fn test_reset_returns_to_base_delay() {
        // テスト項目: reset 後は再び基本の遅延から始まる
        // given (前提条件):
        let mut backoff = Backoff::new(BackoffPolicy::default());
        backoff.next_delay();
        backoff.next_delay();

        // when (操作):
        backoff.reset();

        // then (期待する結果):
        assert_eq!(backoff.retry_count(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_huge_retry_counts_stay_capped() {
        // テスト項目: 非常に大きなリトライ回数でもオーバーフローせず上限値を返す
        // given (前提条件):
        let policy = BackoffPolicy::default();

        // when (操作):
        let delays = [policy.delay_for(31), policy.delay_for(32), policy.delay_for(u32::MAX)];

        // then (期待する結果):
        assert!(delays.iter().all(|d| *d == Duration::from_secs(10)));
    }

    #[test]
    fn test_custom_policy() {
        // テスト項目: 独自の基本値と上限値が反映される
        // given (前提条件):
        let policy = BackoffPolicy::new(Duration::from_millis(50), Duration::from_millis(300));

        // when (操作):
        let delays: Vec<u128> = (0..4).map(|n| policy.delay_for(n).as_millis()).collect();

        // then (期待する結果):
        assert_eq!(delays, vec![50, 100, 200, 300]);
    }
}
