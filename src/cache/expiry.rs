//! Bucketed expiration and the clocks that feed it.
//!
//! Expiration instants are aligned to fixed-width windows counted from the
//! Unix epoch. Every request observed inside one window shares the same
//! deadline: the end of that window.

use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// `Cache-Control` value sent when there is no freshness window to advertise.
pub const NO_CACHE: &str = "max-age=0, no-cache, no-store, must-revalidate";

/// Source of the reference time used for freshness decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Reads the operating-system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A manually driven clock for deterministic hosts and tests.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<SystemTime>,
}

impl FixedClock {
    pub fn new(now: SystemTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: SystemTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Computes bucket-aligned expiration from a configured TTL.
///
/// A zero TTL disables time-based expiry: no boundary is produced and the
/// remaining window is always zero.
///
/// Two requests a few milliseconds apart on either side of a boundary land in
/// different buckets. That is inherent to bucketing and is not smoothed over.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, UNIX_EPOCH};
/// use rttp_cache::cache::ExpiryPolicy;
///
/// let policy = ExpiryPolicy::new(Duration::from_secs(60));
/// let now = UNIX_EPOCH + Duration::from_secs(125);
///
/// assert_eq!(policy.bucket_boundary(now), Some(UNIX_EPOCH + Duration::from_secs(180)));
/// assert_eq!(policy.remaining_window(now), Duration::from_secs(55));
/// assert_eq!(policy.cache_control(now), "max-age=55, public");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExpiryPolicy {
    ttl: Duration,
}

impl ExpiryPolicy {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns `true` when the TTL is zero and entries never expire by time.
    pub fn is_disabled(&self) -> bool {
        self.ttl.is_zero()
    }

    /// The end of the TTL-wide window containing `now`.
    ///
    /// `now` is truncated down to a multiple of the TTL since the Unix epoch
    /// and advanced by one TTL. Instants before the epoch are treated as the
    /// epoch itself. A boundary too far out for `SystemTime` to represent is
    /// reported as `None`, the same as a disabled TTL.
    pub fn bucket_boundary(&self, now: SystemTime) -> Option<SystemTime> {
        if self.is_disabled() {
            return None;
        }
        let width = self.ttl.as_nanos();
        let since = now.duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
        let boundary = (since / width + 1).saturating_mul(width);
        UNIX_EPOCH.checked_add(nanos_to_duration(boundary))
    }

    /// Time left until the boundary of the window containing `now`.
    ///
    /// Always in `(0, ttl]` for a non-zero TTL; zero when disabled.
    pub fn remaining_window(&self, now: SystemTime) -> Duration {
        self.bucket_boundary(now)
            .and_then(|boundary| boundary.duration_since(now).ok())
            .unwrap_or_default()
    }

    /// The `Cache-Control` directive advertising the remaining window.
    ///
    /// Whole seconds only; a window that floors to zero seconds is advertised
    /// as non-cacheable.
    pub fn cache_control(&self, now: SystemTime) -> String {
        match self.remaining_window(now).as_secs() {
            0 => NO_CACHE.to_string(),
            secs => format!("max-age={secs}, public"),
        }
    }
}

fn nanos_to_duration(nanos: u128) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    let secs = u64::try_from(nanos / NANOS_PER_SEC).unwrap_or(u64::MAX);
    // Remainder is below one second, so it always fits.
    Duration::new(secs, (nanos % NANOS_PER_SEC) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64, millis: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs) + Duration::from_millis(millis)
    }

    #[test]
    fn requests_in_one_window_share_a_boundary() {
        let policy = ExpiryPolicy::new(Duration::from_secs(60));
        let first = policy.bucket_boundary(at(1_000_000_030, 0));
        let second = policy.bucket_boundary(at(1_000_000_035, 0));
        assert_eq!(first, second);
        assert_eq!(first, Some(at(1_000_000_080, 0)));
    }

    #[test]
    fn boundary_edge_splits_buckets() {
        let policy = ExpiryPolicy::new(Duration::from_secs(60));
        let before = policy.bucket_boundary(at(119, 999));
        let after = policy.bucket_boundary(at(120, 0));
        assert_eq!(before, Some(at(120, 0)));
        assert_eq!(after, Some(at(180, 0)));
    }

    #[test]
    fn remaining_window_stays_within_ttl() {
        let policy = ExpiryPolicy::new(Duration::from_secs(60));
        assert_eq!(policy.remaining_window(at(120, 0)), Duration::from_secs(60));
        assert_eq!(policy.remaining_window(at(179, 500)), Duration::from_millis(500));
        assert_eq!(policy.remaining_window(at(150, 250)), Duration::from_millis(29_750));
    }

    #[test]
    fn zero_ttl_disables_expiry() {
        let policy = ExpiryPolicy::new(Duration::ZERO);
        assert!(policy.is_disabled());
        assert_eq!(policy.bucket_boundary(at(42, 0)), None);
        assert_eq!(policy.remaining_window(at(42, 0)), Duration::ZERO);
        assert_eq!(policy.cache_control(at(42, 0)), NO_CACHE);
    }

    #[test]
    fn cache_control_floors_to_whole_seconds() {
        let policy = ExpiryPolicy::new(Duration::from_secs(60));
        assert_eq!(policy.cache_control(at(150, 250)), "max-age=29, public");
        // Less than a second left floors to zero.
        assert_eq!(policy.cache_control(at(179, 500)), NO_CACHE);
    }

    #[test]
    fn unrepresentable_boundary_is_treated_as_disabled() {
        let policy = ExpiryPolicy::new(Duration::from_secs(u64::MAX));
        let now = SystemTime::now();
        assert_eq!(policy.bucket_boundary(now), None);
        assert_eq!(policy.remaining_window(now), Duration::ZERO);
        assert_eq!(policy.cache_control(now), NO_CACHE);
    }

    #[test]
    fn sub_second_ttl_buckets() {
        let policy = ExpiryPolicy::new(Duration::from_millis(250));
        assert_eq!(policy.bucket_boundary(at(3, 260)), Some(at(3, 500)));
    }

    #[test]
    fn fixed_clock_advances() {
        let clock = FixedClock::new(at(10, 0));
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now(), at(15, 0));
        clock.set(at(1, 0));
        assert_eq!(clock.now(), at(1, 0));
    }
}
