use chrono::{DateTime, Utc};

/// Source of wall-clock timestamps for the registry.
///
/// Injected so tests can assert monotonicity and equality deterministically
/// instead of racing the system clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
