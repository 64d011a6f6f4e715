use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

/// Source of processing timestamps.
pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wraps a clock so that every stamp it issues is strictly greater than the previous one.
///
/// When the inner clock has not advanced, or went backwards, the stamp is the previous one plus
/// one microsecond.
#[derive(Debug)]
pub struct MonotonicClock<C = SystemClock> {
    inner: C,
    last_micros: AtomicI64,
}

impl MonotonicClock<SystemClock> {
    pub fn system() -> Self {
        Self::new(SystemClock)
    }
}

impl<C: Clock> MonotonicClock<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            last_micros: AtomicI64::new(i64::MIN),
        }
    }
}

impl<C: Clock> Clock for MonotonicClock<C> {
    fn now(&self) -> DateTime<Utc> {
        let now = self.inner.now();
        let candidate = now.timestamp_micros();

        let mut last = self.last_micros.load(Ordering::Acquire);
        loop {
            let next = candidate.max(last.saturating_add(1));
            match self.last_micros.compare_exchange_weak(
                last,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return DateTime::from_timestamp_micros(next).unwrap_or(now),
                Err(actual) => last = actual,
            }
        }
    }
}

/// A clock that only moves when told to, for deterministic stamps.
#[derive(Debug)]
pub struct ManualClock {
    micros: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            micros: AtomicI64::new(start.timestamp_micros()),
        }
    }

    pub fn set(&self, time: DateTime<Utc>) {
        self.micros.store(time.timestamp_micros(), Ordering::Release);
    }

    pub fn advance(&self, by: chrono::Duration) {
        let micros = by.num_microseconds().unwrap_or(i64::MAX);
        self.micros.fetch_add(micros, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let micros = self.micros.load(Ordering::Acquire);
        DateTime::from_timestamp_micros(micros).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn start() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn stalled_clock_still_issues_increasing_stamps() {
        let clock = MonotonicClock::new(ManualClock::new(start()));

        let first = clock.now();
        let second = clock.now();
        let third = clock.now();

        assert_eq!(first, start());
        assert_eq!((second - first).num_microseconds(), Some(1));
        assert!(third > second);
    }

    #[test]
    fn clock_going_backwards_is_ignored() {
        let manual = ManualClock::new(start());
        let clock = MonotonicClock::new(manual);
        let first = clock.now();

        clock.inner.set(start() - chrono::Duration::seconds(10));
        assert!(clock.now() > first);

        clock.inner.set(start() + chrono::Duration::seconds(10));
        assert_eq!(clock.now(), start() + chrono::Duration::seconds(10));
    }

    #[test]
    fn concurrent_stamps_are_unique() {
        let clock = Arc::new(MonotonicClock::new(ManualClock::new(start())));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let clock = clock.clone();
                std::thread::spawn(move || (0..250).map(|_| clock.now()).collect::<Vec<_>>())
            })
            .collect();

        let mut stamps: Vec<_> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        stamps.sort();
        stamps.dedup();

        assert_eq!(stamps.len(), 1_000);
    }
}
