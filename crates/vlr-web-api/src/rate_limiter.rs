use dashmap::DashMap;
use governor::{
    Quota, RateLimiter as GovernorLimiter,
    clock::{Clock, DefaultClock, Reference},
    middleware::StateInformationMiddleware,
    state::{InMemoryState, NotKeyed},
};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Rate limit exceeded: {requests} requests in window, limit is {limit}")]
    LimitExceeded {
        requests: u64,
        limit: u64,
        retry_after: u64,
    },
    #[error("Invalid rate limit '{0}', expected e.g. '250/minute' or '5 per 1 minute'")]
    InvalidLimit(String),
}

/// A request budget per client key, e.g. `250/minute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub requests: u64,
    pub window: Duration,
}

impl RateLimit {
    pub const fn per_minute(requests: u64) -> Self {
        Self {
            requests,
            window: Duration::from_secs(60),
        }
    }

    fn window_seconds(&self) -> u64 {
        self.window.as_secs().max(1)
    }

    fn burst(&self) -> NonZeroU32 {
        let requests = u32::try_from(self.requests).unwrap_or(u32::MAX);
        NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN)
    }

    /// GCRA quota admitting `requests` at once and refilling the whole budget
    /// over one window.
    pub fn quota(&self) -> Quota {
        let burst = self.burst();
        let window = self.window.max(Duration::from_secs(1));
        Quota::with_period(window / burst.get())
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst)
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.window_seconds();
        let (amount, unit) = if secs % 86_400 == 0 {
            (secs / 86_400, "day")
        } else if secs % 3_600 == 0 {
            (secs / 3_600, "hour")
        } else if secs % 60 == 0 {
            (secs / 60, "minute")
        } else {
            (secs, "second")
        };
        write!(f, "{} per {} {}", self.requests, amount, unit)
    }
}

impl FromStr for RateLimit {
    type Err = RateLimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RateLimitError::InvalidLimit(s.to_string());
        let normalized = s.trim().to_lowercase();

        let (count, period) = normalized
            .split_once('/')
            .or_else(|| normalized.split_once(" per "))
            .ok_or_else(invalid)?;

        let requests = count.trim().parse::<u32>().map_err(|_| invalid())?;

        let mut parts = period.split_whitespace();
        let (amount, unit) = match (parts.next(), parts.next(), parts.next()) {
            (Some(unit), None, None) => (1, unit),
            (Some(amount), Some(unit), None) => {
                (amount.parse::<u64>().map_err(|_| invalid())?, unit)
            }
            _ => return Err(invalid()),
        };

        let unit_seconds: u64 = match unit.trim_end_matches('s') {
            "second" | "sec" => 1,
            "minute" | "min" => 60,
            "hour" => 3_600,
            "day" => 86_400,
            _ => return Err(invalid()),
        };

        if requests == 0 || amount == 0 {
            return Err(invalid());
        }

        let window_seconds = amount.checked_mul(unit_seconds).ok_or_else(invalid)?;

        Ok(Self {
            requests: u64::from(requests),
            window: Duration::from_secs(window_seconds),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub limit: RateLimit,
    pub cleanup_interval_seconds: u64,
    /// Key clients on `X-Forwarded-For` / `X-Real-IP` instead of the peer
    /// address. Only safe behind a proxy that overwrites those headers.
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: RateLimit::per_minute(250),
            cleanup_interval_seconds: 60,
            trust_proxy_headers: false,
        }
    }
}

/// Usage of the current window after a request was admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub used: u64,
    pub limit: u64,
    pub window_seconds: u64,
}

impl RateLimitStatus {
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }
}

type ClientLimiter<C> = GovernorLimiter<NotKeyed, InMemoryState, C, StateInformationMiddleware>;

struct ClientEntry<C: Clock> {
    limiter: ClientLimiter<C>,
    remaining: u32,
    last_seen: C::Instant,
}

/// Per-client GCRA limiters, created lazily on a client's first request.
pub struct RateLimiter<C: Clock = DefaultClock> {
    clients: DashMap<String, ClientEntry<C>>,
    quota: Quota,
    clock: C,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, DefaultClock::default())
    }
}

impl<C: Clock> fmt::Debug for RateLimiter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limit", &self.config.limit)
            .field("tracked_clients", &self.clients.len())
            .finish_non_exhaustive()
    }
}

impl<C: Clock + Clone> RateLimiter<C> {
    pub fn with_clock(config: RateLimitConfig, clock: C) -> Self {
        Self {
            clients: DashMap::new(),
            quota: config.limit.quota(),
            clock,
            config,
        }
    }

    pub fn check_and_increment(&self, identifier: &str) -> Result<RateLimitStatus, RateLimitError> {
        let now = self.clock.now();
        let mut entry = self
            .clients
            .entry(identifier.to_string())
            .or_insert_with(|| ClientEntry {
                limiter: GovernorLimiter::direct_with_clock(self.quota, self.clock.clone())
                    .with_middleware::<StateInformationMiddleware>(),
                remaining: self.quota.burst_size().get(),
                last_seen: now,
            });
        entry.last_seen = now;
        let decision = entry.limiter.check();
        if let Ok(snapshot) = &decision {
            entry.remaining = snapshot.remaining_burst_capacity();
        }
        drop(entry);

        let limit = self.requests_per_window();
        match decision {
            Ok(snapshot) => {
                let used = limit.saturating_sub(u64::from(snapshot.remaining_burst_capacity()));
                debug!(
                    "Rate limit check for '{}': {}/{} requests in current window",
                    identifier, used, limit
                );
                Ok(RateLimitStatus {
                    used,
                    limit,
                    window_seconds: self.window_size_seconds(),
                })
            }
            Err(not_until) => {
                let wait = not_until.wait_time_from(self.clock.now());
                Err(RateLimitError::LimitExceeded {
                    requests: limit,
                    limit,
                    retry_after: ceil_seconds(wait).max(1),
                })
            }
        }
    }

    /// Drops clients idle for a whole window; their budget has fully
    /// refilled, so forgetting them changes no decision.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let stale_after = self.config.limit.window;
        let before = self.clients.len();
        self.clients
            .retain(|_, entry| Duration::from(now.duration_since(entry.last_seen)) < stale_after);
        let removed = before.saturating_sub(self.clients.len());

        if removed > 0 {
            debug!("Cleaned up {} expired rate limit windows", removed);
        }
        removed
    }

    /// Requests counted against `identifier` right now, or `None` if the
    /// client is not tracked.
    pub fn get_current_usage(&self, identifier: &str) -> Option<u64> {
        let entry = self.clients.get(identifier)?;
        let elapsed = Duration::from(self.clock.now().duration_since(entry.last_seen));
        let period = self.quota.replenish_interval().as_nanos().max(1);
        let refilled = u64::try_from(elapsed.as_nanos() / period).unwrap_or(u64::MAX);

        let limit = self.requests_per_window();
        let remaining = u64::from(entry.remaining).saturating_add(refilled).min(limit);
        Some(limit - remaining)
    }

    pub fn reset_limit(&self, identifier: &str) {
        self.clients.remove(identifier);
        debug!("Reset rate limit for identifier '{}'", identifier);
    }

    pub fn limit(&self) -> RateLimit {
        self.config.limit
    }

    pub fn trusts_proxy_headers(&self) -> bool {
        self.config.trust_proxy_headers
    }

    pub fn requests_per_window(&self) -> u64 {
        u64::from(self.quota.burst_size().get())
    }

    pub fn window_size_seconds(&self) -> u64 {
        self.config.limit.window_seconds()
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}

fn ceil_seconds(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use governor::clock::FakeRelativeClock;
    use rstest::rstest;

    fn limiter(requests: u64, window_secs: u64) -> (RateLimiter<FakeRelativeClock>, FakeRelativeClock) {
        let clock = FakeRelativeClock::default();
        let limiter = RateLimiter::with_clock(
            RateLimitConfig {
                limit: RateLimit {
                    requests,
                    window: Duration::from_secs(window_secs),
                },
                ..RateLimitConfig::default()
            },
            clock.clone(),
        );
        (limiter, clock)
    }

    #[rstest]
    #[case("250/minute", 250, 60)]
    #[case("5 per 1 minute", 5, 60)]
    #[case("10/second", 10, 1)]
    #[case("100 / 2 hours", 100, 7_200)]
    #[case("1000/day", 1000, 86_400)]
    #[case(" 3 PER 30 Seconds ", 3, 30)]
    fn test_parse_rate_limit(#[case] input: &str, #[case] requests: u64, #[case] secs: u64) {
        let limit = input.parse::<RateLimit>().unwrap();
        assert_eq!(limit.requests, requests);
        assert_eq!(limit.window, Duration::from_secs(secs));
    }

    #[rstest]
    #[case("")]
    #[case("250")]
    #[case("many/minute")]
    #[case("0/minute")]
    #[case("5/0 minutes")]
    #[case("5/fortnight")]
    #[case("5/1 2 minutes")]
    #[case("1/400000000000000000 days")]
    #[case("5000000000/minute")]
    fn test_parse_rate_limit_rejects(#[case] input: &str) {
        assert!(matches!(
            input.parse::<RateLimit>(),
            Err(RateLimitError::InvalidLimit(_))
        ));
    }

    #[rstest]
    #[case(RateLimit::per_minute(250), "250 per 1 minute")]
    #[case(RateLimit { requests: 5, window: Duration::from_secs(30) }, "5 per 30 second")]
    #[case(RateLimit { requests: 7, window: Duration::from_secs(7_200) }, "7 per 2 hour")]
    fn test_display_rate_limit(#[case] limit: RateLimit, #[case] expected: &str) {
        assert_eq!(limit.to_string(), expected);
    }

    #[test]
    fn test_quota_spreads_budget_over_window() {
        let quota = RateLimit::per_minute(6).quota();
        assert_eq!(quota.burst_size().get(), 6);
        assert_eq!(quota.replenish_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_rate_limit_allows_requests_within_limit() {
        let (limiter, _clock) = limiter(5, 60);

        for i in 1..=5 {
            let status = limiter.check_and_increment("test_user");
            assert!(status.is_ok(), "Request {} should be allowed", i);
        }
    }

    #[test]
    fn test_rate_limit_blocks_excess_requests() {
        let (limiter, clock) = limiter(5, 300);

        // Fill up the limit
        for _ in 1..=5 {
            limiter.check_and_increment("test_user").unwrap();
        }

        // One slot refills every 60 seconds
        clock.advance(Duration::from_secs(10));
        let result = limiter.check_and_increment("test_user");
        assert!(matches!(
            result,
            Err(RateLimitError::LimitExceeded {
                requests: 5,
                limit: 5,
                retry_after: 50
            })
        ));

        clock.advance(Duration::from_secs(50));
        assert!(limiter.check_and_increment("test_user").is_ok());
        assert!(limiter.check_and_increment("test_user").is_err());
    }

    #[test]
    fn test_no_double_burst_at_window_edge() {
        let (limiter, clock) = limiter(4, 60);

        clock.advance(Duration::from_secs(59));
        for _ in 1..=4 {
            limiter.check_and_increment("edge").unwrap();
        }

        // A fixed window would reset here and admit another four
        clock.advance(Duration::from_secs(2));
        assert!(limiter.check_and_increment("edge").is_err());
    }

    #[test]
    fn test_limits_are_per_identifier() {
        let (limiter, _clock) = limiter(1, 60);

        assert!(limiter.check_and_increment("a").is_ok());
        assert!(limiter.check_and_increment("b").is_ok());
        assert!(limiter.check_and_increment("a").is_err());
    }

    #[test]
    fn test_status_reports_remaining() {
        let (limiter, _clock) = limiter(3, 60);

        let status = limiter.check_and_increment("test_user").unwrap();
        assert_eq!(status.used, 1);
        assert_eq!(status.remaining(), 2);
        assert_eq!(status.window_seconds, 60);
    }

    #[test]
    fn test_get_current_usage() {
        let (limiter, clock) = limiter(100, 100);

        // Initially no usage
        assert_eq!(limiter.get_current_usage("test_user"), None);

        for _ in 1..=3 {
            limiter.check_and_increment("test_user").unwrap();
        }
        assert_eq!(limiter.get_current_usage("test_user"), Some(3));

        // One request's worth refills every second
        clock.advance(Duration::from_secs(2));
        assert_eq!(limiter.get_current_usage("test_user"), Some(1));

        clock.advance(Duration::from_secs(60));
        assert_eq!(limiter.get_current_usage("test_user"), Some(0));
    }

    #[test]
    fn test_reset_limit() {
        let (limiter, _clock) = limiter(5, 60);

        // Fill up the limit
        for _ in 1..=5 {
            limiter.check_and_increment("test_user").unwrap();
        }
        assert!(limiter.check_and_increment("test_user").is_err());

        limiter.reset_limit("test_user");

        // Should be able to make requests again
        assert!(limiter.check_and_increment("test_user").is_ok());
    }

    #[test]
    fn test_cleanup_expired() {
        let (limiter, clock) = limiter(5, 60);
        limiter.check_and_increment("expired_user").unwrap();

        clock.advance(Duration::from_secs(55));
        limiter.check_and_increment("live_user").unwrap();

        clock.advance(Duration::from_secs(10));
        let deleted = limiter.cleanup_expired();
        assert_eq!(deleted, 1);
        assert_eq!(limiter.tracked_clients(), 1);
        assert_eq!(limiter.get_current_usage("expired_user"), None);
    }
}
