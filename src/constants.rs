//! Application-wide constants for conduit management.
//!
//! This module centralizes retry bounds, timeouts and remote API paths.
//! Constants are grouped by domain.
//!
//! # Categories
//!
//! - **Retry**: Attempt bounds and delays for connection failures
//! - **Timeouts**: Network timeouts
//! - **Concurrency**: Fan-out bounds for bulk operations
//! - **API**: Remote endpoint paths and wire constants

use std::time::Duration;

// ============================================================================
// Retry
// ============================================================================

/// Maximum attempts for a single outbound request when the connection
/// cannot be established in time.
pub const MAX_REQUEST_ATTEMPTS: u32 = 3;

/// Fixed delay between retry attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

// ============================================================================
// Timeouts
// ============================================================================

/// Overall timeout for a single HTTP request.
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for establishing the TCP/TLS connection.
///
/// Expiry of this timeout is the only failure the executor retries.
pub const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Concurrency
// ============================================================================

/// Default bound on in-flight requests during bulk subscription operations.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 8;

// ============================================================================
// API
// ============================================================================

/// Conduit collection endpoint (list, create, update, delete).
pub const CONDUITS_PATH: &str = "/eventsub/conduits";

/// Conduit shard endpoint (list, bulk update).
pub const SHARDS_PATH: &str = "/eventsub/conduits/shards";

/// Subscription endpoint (create, list, delete).
pub const SUBSCRIPTIONS_PATH: &str = "/eventsub/subscriptions";

/// Transport method used by every shard this crate registers.
pub const WEBHOOK_METHOD: &str = "webhook";

/// Transport method subscriptions use to target a conduit.
pub const CONDUIT_METHOD: &str = "conduit";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_bounds() {
        assert_eq!(MAX_REQUEST_ATTEMPTS, 3);
        assert_eq!(RETRY_DELAY, Duration::from_secs(1));
    }

    #[test]
    fn test_connect_timeout_within_request_timeout() {
        assert!(HTTP_CONNECT_TIMEOUT < HTTP_REQUEST_TIMEOUT);
    }

    #[test]
    fn test_shard_path_nests_under_conduits() {
        assert!(SHARDS_PATH.starts_with(CONDUITS_PATH));
    }
}
