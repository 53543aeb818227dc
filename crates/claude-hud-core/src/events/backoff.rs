//! Reconnect delay policy.

use std::time::Duration;

use crate::config::ReconnectConfig;

/// Exponential backoff with a per-delay cap and an attempt ceiling
#[derive(Debug, Clone)]
pub struct Backoff {
    base_ms: u64,
    growth: f64,
    cap_ms: u64,
    max_attempts: u32,
}

impl Backoff {
    pub fn new(base_ms: u64, growth: f64, cap_ms: u64, max_attempts: u32) -> Self {
        Self {
            base_ms,
            growth,
            cap_ms,
            max_attempts,
        }
    }

    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self::new(
            config.base_ms,
            config.growth,
            config.cap_ms,
            config.max_attempts,
        )
    }

    /// Delay before the `attempt`-th consecutive reconnect (1-based)
    ///
    /// `min(base * growth^(attempt - 1), cap)`
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let raw = self.base_ms as f64 * self.growth.powi(exponent);
        let ms = if raw.is_finite() {
            raw.min(self.cap_ms as f64)
        } else {
            self.cap_ms as f64
        };
        Duration::from_millis(ms.round() as u64)
    }

    /// Whether another attempt is allowed after `attempts` consecutive ones
    pub fn allows(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_config(&ReconnectConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_delay_sequence() {
        let backoff = Backoff::default();
        let delays: Vec<u64> = (1..=5)
            .map(|n| backoff.delay(n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![100, 150, 225, 338, 506]);
    }

    #[test]
    fn test_delay_is_capped() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(10), Duration::from_millis(3844));
        assert_eq!(backoff.delay(11), Duration::from_millis(5000));
        assert_eq!(backoff.delay(50), Duration::from_millis(5000));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_millis(5000));
    }

    #[test]
    fn test_attempt_ceiling() {
        let backoff = Backoff::default();
        assert_eq!(backoff.max_attempts(), 50);
        assert!(backoff.allows(0));
        assert!(backoff.allows(49));
        assert!(!backoff.allows(50));
    }
}
