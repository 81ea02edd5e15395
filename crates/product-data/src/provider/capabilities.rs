//! Rate limiting configuration declared by each source.

/// Rate limiting configuration for a source.
///
/// Controls how aggressively a source is called to stay within its quota.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimit {
    /// Sustained requests allowed per minute.
    pub requests_per_minute: u32,

    /// Requests allowed back to back before throttling starts.
    pub burst_capacity: u32,

    /// Calls allowed to be in progress at the same time.
    pub max_concurrency: usize,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            burst_capacity: 10,
            max_concurrency: 2,
        }
    }
}
