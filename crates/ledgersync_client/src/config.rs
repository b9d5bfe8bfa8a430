//! Configuration for the device-side sync client.

use std::time::Duration;
use uuid::Uuid;

/// Configuration for a device's sync client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Device id (unique per device install).
    pub device_id: Uuid,
    /// User the device belongs to.
    pub user_id: String,
    /// Sync server base URL.
    pub server_url: String,
    /// Maximum operations per push batch.
    pub push_batch_size: usize,
    /// Maximum retries per queue entry before it stays failed.
    pub max_entry_retries: u32,
    /// Retry configuration for transport failures.
    pub retry: RetryConfig,
    /// Request timeout hint for transports.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Creates a configuration with default limits.
    pub fn new(device_id: Uuid, user_id: impl Into<String>, server_url: impl Into<String>) -> Self {
        Self {
            device_id,
            user_id: user_id.into(),
            server_url: server_url.into(),
            push_batch_size: 50,
            max_entry_retries: 5,
            retry: RetryConfig::default(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the push batch size.
    pub fn with_push_batch_size(mut self, size: usize) -> Self {
        self.push_batch_size = size;
        self
    }

    /// Sets the per-entry retry limit.
    pub fn with_max_entry_retries(mut self, retries: u32) -> Self {
        self.max_entry_retries = retries;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Configuration for retry behavior on transport failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (first try included).
    pub max_attempts: u32,
    /// Initial delay between attempts.
    pub initial_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a retry configuration with the given attempt cap.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculates the delay before a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        if self.add_jitter {
            // Up to 25% jitter.
            Duration::from_secs_f64(capped + capped * 0.25 * pseudo_jitter())
        } else {
            Duration::from_secs_f64(capped)
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Cheap pseudo-random jitter without an RNG dependency.
fn pseudo_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_config_builder() {
        let device = Uuid::new_v4();
        let config = ClientConfig::new(device, "agent-1", "https://sync.example.com")
            .with_push_batch_size(10)
            .with_max_entry_retries(3)
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.device_id, device);
        assert_eq!(config.push_batch_size, 10);
        assert_eq!(config.max_entry_retries, 3);
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn first_attempt_has_no_delay() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay_for_attempt(0), Duration::ZERO);
    }

    #[test]
    fn backoff_grows_exponentially() {
        let retry = RetryConfig::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0);

        let d1 = retry.delay_for_attempt(1);
        let d3 = retry.delay_for_attempt(3);

        assert!(d1 >= Duration::from_millis(100));
        assert!(d1 <= Duration::from_millis(125));
        assert!(d3 >= Duration::from_millis(400));
        assert!(d3 <= Duration::from_millis(500));
    }

    #[test]
    fn backoff_respects_max_delay() {
        let retry = RetryConfig::new(10)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(4))
            .with_backoff_multiplier(10.0);

        let delay = retry.delay_for_attempt(6);
        assert!(delay <= Duration::from_secs(5)); // 4s + 25% jitter
    }
}
