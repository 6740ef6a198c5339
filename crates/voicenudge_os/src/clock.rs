#![forbid(unsafe_code)]

use chrono::Utc;

use voicenudge_kernel_contracts::UtcTimestamp;

/// Injectable time source. Flows never call the wall clock directly so tests
/// can pin every instant.
pub trait Clock {
    fn now(&self) -> UtcTimestamp;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> UtcTimestamp {
        UtcTimestamp(Utc::now())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub UtcTimestamp);

impl Clock for FixedClock {
    fn now(&self) -> UtcTimestamp {
        self.0
    }
}
