use serde::Serialize;

use crate::cache::CacheStats;
use crate::registry::{CircuitSnapshot, CircuitState, RateLimiterStats};

/// Operational snapshot of a lookup service.
///
/// Serializes as
/// `{"circuitBreaker": {"isOpen", "state", "failures"}, "cache": {"total", "sizeKB"}, "rateLimiter": {"trackedSources", "activeRequests", "requestsLastMinute"}}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStats {
    pub circuit_breaker: BreakerStats,
    pub cache: CacheReport,
    pub rate_limiter: RateLimiterStats,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerStats {
    pub is_open: bool,
    pub state: CircuitState,
    /// Consecutive failures counted while closed.
    pub failures: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CacheReport {
    pub total: usize,
    #[serde(rename = "sizeKB")]
    pub size_kb: f64,
}

impl ServiceStats {
    pub(crate) fn new(
        circuit: CircuitSnapshot,
        cache: CacheStats,
        rate_limiter: RateLimiterStats,
    ) -> Self {
        Self {
            circuit_breaker: BreakerStats {
                is_open: circuit.state == CircuitState::Open,
                state: circuit.state,
                failures: circuit.consecutive_failures,
            },
            cache: CacheReport {
                total: cache.total,
                size_kb: cache.size_kb(),
            },
            rate_limiter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let stats = ServiceStats::new(
            CircuitSnapshot {
                state: CircuitState::Open,
                consecutive_failures: 0,
                opened_at: None,
            },
            CacheStats {
                total: 2,
                size_bytes: 2048,
            },
            RateLimiterStats {
                tracked_sources: 3,
                active_requests: 1,
                requests_last_minute: 7,
            },
        );

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["circuitBreaker"]["isOpen"], true);
        assert_eq!(json["circuitBreaker"]["state"], "open");
        assert_eq!(json["circuitBreaker"]["failures"], 0);
        assert_eq!(json["cache"]["total"], 2);
        assert_eq!(json["cache"]["sizeKB"], 2.0);
        assert_eq!(json["rateLimiter"]["trackedSources"], 3);
        assert_eq!(json["rateLimiter"]["activeRequests"], 1);
        assert_eq!(json["rateLimiter"]["requestsLastMinute"], 7);
    }
}
