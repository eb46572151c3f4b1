//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Max WebSocket messages per second from one viewer
pub const VIEWER_MESSAGE_RATE_LIMIT: u32 = 10;

/// Per-viewer rate limiter state
#[derive(Clone)]
pub struct ViewerRateLimiter {
    message_limiter: Arc<Limiter>,
}

impl ViewerRateLimiter {
    pub fn new() -> Self {
        Self::with_rate(VIEWER_MESSAGE_RATE_LIMIT)
    }

    pub fn with_rate(per_second: u32) -> Self {
        Self {
            message_limiter: create_limiter(per_second),
        }
    }

    /// Check if a message is allowed (returns true if allowed)
    pub fn check_message(&self) -> bool {
        self.message_limiter.check().is_ok()
    }
}

impl Default for ViewerRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_is_limited() {
        let limiter = ViewerRateLimiter::with_rate(3);
        let allowed = (0..10).filter(|_| limiter.check_message()).count();
        assert_eq!(allowed, 3);
    }
}
