use std::env;
use std::time::Duration;

/// Error notices stay on screen this long unless configured otherwise.
pub const DEFAULT_ERROR_NOTICE_MS: u64 = 3_000;

/// Runtime knobs for the session orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub error_notice_ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            error_notice_ttl: Duration::from_millis(DEFAULT_ERROR_NOTICE_MS),
        }
    }
}

impl SessionConfig {
    /// Read `ASSESS_ERROR_NOTICE_MS`; missing or unparsable values keep the default.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(ms) = lookup("ASSESS_ERROR_NOTICE_MS")
            .and_then(|raw| raw.trim().parse::<u64>().ok())
        {
            config.error_notice_ttl = Duration::from_millis(ms);
        }
        config
    }

    #[must_use]
    pub fn with_error_notice_ttl(mut self, ttl: Duration) -> Self {
        self.error_notice_ttl = ttl;
        self
    }
}
