use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Configuration constants for the platform core

/// Redis connection URL for the session store
/// Read once at startup from REDIS_URL or defaults to the compose hostname
pub static REDIS_URL: Lazy<String> =
    Lazy::new(|| env::var("REDIS_URL").unwrap_or_else(|_| "redis://redis:6379".to_string()));

/// Session retention configuration
pub mod session {
    use super::Duration;

    /// Idle retention window for conversation state (in seconds).
    /// Every successful put refreshes the TTL, so expiry is measured
    /// from last contact.
    pub const STATE_TTL_SECS: u64 = 7 * 24 * 60 * 60; // 7 дней

    /// Conversation state TTL duration
    pub fn state_ttl() -> Duration {
        Duration::from_secs(STATE_TTL_SECS)
    }

    /// Lifetime of a freshly minted auth session (in seconds)
    pub const AUTH_SESSION_TTL_SECS: u64 = 24 * 60 * 60; // 24 часа

    /// Auth session TTL duration
    pub fn auth_session_ttl() -> Duration {
        Duration::from_secs(AUTH_SESSION_TTL_SECS)
    }
}

/// Auth sub-protocol configuration
pub mod auth {
    use super::Duration;

    /// Time allowed for one send-code / verify-code round trip (in
    /// seconds). The MTProto connect handshake alone can take most of it.
    pub const ROUND_TRIP_TIMEOUT_SECS: u64 = 15;

    /// Auth round trip timeout duration
    pub fn round_trip_timeout() -> Duration {
        Duration::from_secs(ROUND_TRIP_TIMEOUT_SECS)
    }
}

/// Rate limiting configuration
pub mod rate_limit {
    use super::Duration;

    /// Inbound events allowed per user per window
    pub const EVENTS_PER_WINDOW: u32 = 20;

    /// Fixed window length (in seconds)
    pub const WINDOW_SECS: u64 = 60;

    /// Rate limit window duration
    pub fn window() -> Duration {
        Duration::from_secs(WINDOW_SECS)
    }
}

/// Referral code configuration
pub mod refcode {
    /// Characters a generated code is drawn from
    pub const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

    /// Generated code length
    pub const LENGTH: usize = 8;
}
