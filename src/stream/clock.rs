/*
 * Copyright (C) 2021 Evtech Solutions, Ltd., dba 3D-P
 * Copyright (C) 2021 Neil Tallim <neiltallim@3d-p.com>
 *
 * This file is part of rampperf.
 *
 * rampperf is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * rampperf is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with rampperf.  If not, see <https://www.gnu.org/licenses/>.
 */

//! time sources for stamping, pacing and windowing
//!
//! the sender stamps packets and the receiver computes latency from the same
//! kind of clock; one-way latency is only meaningful when both hosts share
//! that time reference.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub trait Clock {
    /// current time in nanoseconds
    fn now_ns(&self) -> u64;

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn yield_now(&self) {
        std::thread::yield_now();
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ns(&self) -> u64 {
        (**self).now_ns()
    }
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
    fn yield_now(&self) {
        (**self).yield_now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_ns(&self) -> u64 {
        (**self).now_ns()
    }
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
    fn yield_now(&self) {
        (**self).yield_now()
    }
}

impl<C: Clock + ?Sized> Clock for Box<C> {
    fn now_ns(&self) -> u64 {
        (**self).now_ns()
    }
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
    fn yield_now(&self) {
        (**self).yield_now()
    }
}

/// CLOCK_MONOTONIC; comparable across processes on the same host
#[derive(Clone, Copy, Debug, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    #[cfg(unix)]
    fn now_ns(&self) -> u64 {
        // SAFETY: an all-zero timespec is valid, and clock_gettime only writes into it
        let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
        if rc != 0 {
            log::error!("clock_gettime(CLOCK_MONOTONIC) failed: {}", std::io::Error::last_os_error());
            return 0;
        }
        ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64
    }

    #[cfg(not(unix))]
    fn now_ns(&self) -> u64 {
        use std::sync::OnceLock;
        use std::time::Instant;
        static ORIGIN: OnceLock<Instant> = OnceLock::new();
        ORIGIN.get_or_init(Instant::now).elapsed().as_nanos() as u64
    }
}

/// wall-clock time since the UNIX epoch, for hosts kept in sync externally
#[derive(Clone, Copy, Debug, Default)]
pub struct RealtimeClock;

impl Clock for RealtimeClock {
    fn now_ns(&self) -> u64 {
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0).max(0) as u64
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClockSource {
    #[default]
    Monotonic,
    Realtime,
}

impl ClockSource {
    pub fn build(self) -> Box<dyn Clock + Send + Sync> {
        match self {
            ClockSource::Monotonic => Box::new(MonotonicClock),
            ClockSource::Realtime => Box::new(RealtimeClock),
        }
    }
}

/// a deterministic clock: time only moves when it is read, slept on or yielded
///
/// each `now_ns` read advances time by `read_cost_ns`, which lets spin loops
/// make progress; sleeps advance by exactly the requested duration.
#[derive(Debug, Default)]
pub struct SimulatedClock {
    now_ns: AtomicU64,
    read_cost_ns: u64,
    yield_cost_ns: u64,
}

impl SimulatedClock {
    pub fn new(start_ns: u64) -> SimulatedClock {
        SimulatedClock::with_costs(start_ns, 20, 500)
    }

    pub fn with_costs(start_ns: u64, read_cost_ns: u64, yield_cost_ns: u64) -> SimulatedClock {
        SimulatedClock {
            now_ns: AtomicU64::new(start_ns),
            read_cost_ns,
            yield_cost_ns,
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.now_ns.fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    /// current time without the read cost
    pub fn peek_ns(&self) -> u64 {
        self.now_ns.load(Ordering::Relaxed)
    }
}

impl Clock for SimulatedClock {
    fn now_ns(&self) -> u64 {
        self.now_ns.fetch_add(self.read_cost_ns, Ordering::Relaxed)
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }

    fn yield_now(&self) {
        self.now_ns.fetch_add(self.yield_cost_ns, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock;
        let a = clock.now_ns();
        let b = clock.now_ns();
        assert!(b >= a);
    }

    #[test]
    fn simulated_clock_moves_on_reads_and_sleeps() {
        let clock = SimulatedClock::with_costs(1_000, 10, 100);
        assert_eq!(clock.now_ns(), 1_000);
        assert_eq!(clock.peek_ns(), 1_010);
        clock.sleep(Duration::from_micros(5));
        assert_eq!(clock.peek_ns(), 6_010);
        clock.yield_now();
        assert_eq!(clock.peek_ns(), 6_110);
    }

    #[test]
    fn realtime_clock_is_past_the_epoch() {
        // 2020-01-01T00:00:00Z
        assert!(RealtimeClock.now_ns() > 1_577_836_800_000_000_000);
    }
}
