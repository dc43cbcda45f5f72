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

//! converts a target byte rate into a fixed per-packet send schedule
//!
//! the deadline is absolute and advanced by one interval per send, never
//! recomputed from "now", so lateness on any single send does not become
//! long-term drift. there is no burst credit: this is fixed-interval
//! scheduling, not a token bucket.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::stream::clock::Clock;

/// rates are expressed in MiB/s
pub const BYTES_PER_MEGABYTE: u64 = 1024 * 1024;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// what to do while a send deadline is still in the future
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wait {
    /// far from the deadline: give the core back for part of the gap
    Sleep(Duration),
    /// close: let other threads run, but don't risk a coarse sleep
    Yield,
    /// imminent: burn cycles for sub-microsecond accuracy
    Spin,
}

/// thresholds for the three-tier wait
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitPolicy {
    /// above this remaining time, sleep for half of it
    pub sleep_above: Duration,
    /// at or below this, spin; anything in between yields
    pub spin_at_or_below: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        WaitPolicy {
            sleep_above: Duration::from_micros(100),
            spin_at_or_below: Duration::from_micros(1),
        }
    }
}

impl WaitPolicy {
    pub fn select(&self, remaining_ns: u64) -> Wait {
        if remaining_ns > self.sleep_above.as_nanos() as u64 {
            Wait::Sleep(Duration::from_nanos(remaining_ns / 2))
        } else if remaining_ns > self.spin_at_or_below.as_nanos() as u64 {
            Wait::Yield
        } else {
            Wait::Spin
        }
    }
}

/// nanoseconds between sends needed to sustain `rate_mbps` with fixed-size packets
pub fn interval_ns_for(rate_mbps: u32, packet_size: usize) -> Result<u64> {
    if packet_size == 0 {
        return Err(Error::Config("packet size must be non-zero".to_string()));
    }
    let bytes_per_sec = rate_mbps as u64 * BYTES_PER_MEGABYTE;
    let packets_per_sec = bytes_per_sec / packet_size as u64;
    if packets_per_sec == 0 {
        return Err(Error::Config(format!(
            "a rate of {} MB/s cannot carry a single {}-byte packet per second",
            rate_mbps, packet_size
        )));
    }
    Ok((NANOS_PER_SECOND / packets_per_sec).max(1))
}

#[derive(Clone, Debug)]
pub struct Pacer {
    interval_ns: u64,
    next_send_ns: u64,
    policy: WaitPolicy,
}

impl Pacer {
    /// the first send is due immediately at `start_ns`
    pub fn new(rate_mbps: u32, packet_size: usize, start_ns: u64, policy: WaitPolicy) -> Result<Pacer> {
        let interval_ns = interval_ns_for(rate_mbps, packet_size)?;
        log::debug!(
            "pacing {} MB/s with {}-byte packets: one send every {}ns",
            rate_mbps,
            packet_size,
            interval_ns
        );
        Ok(Pacer {
            interval_ns,
            next_send_ns: start_ns,
            policy,
        })
    }

    pub fn interval_ns(&self) -> u64 {
        self.interval_ns
    }

    pub fn next_send_ns(&self) -> u64 {
        self.next_send_ns
    }

    pub fn is_due(&self, now_ns: u64) -> bool {
        now_ns >= self.next_send_ns
    }

    /// moves the deadline forward by exactly one interval
    pub fn advance(&mut self) {
        self.next_send_ns += self.interval_ns;
    }

    /// the wait tier for the time left until the deadline; `None` if it has passed
    pub fn plan(&self, now_ns: u64) -> Option<Wait> {
        if self.is_due(now_ns) {
            None
        } else {
            Some(self.policy.select(self.next_send_ns - now_ns))
        }
    }

    /// waits once according to the policy; callers loop until `is_due`
    pub fn wait<C: Clock>(&self, clock: &C, now_ns: u64) {
        match self.plan(now_ns) {
            Some(Wait::Sleep(d)) => clock.sleep(d),
            Some(Wait::Yield) => clock.yield_now(),
            Some(Wait::Spin) | None => (),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet::PACKET_SIZE;
    use crate::stream::clock::SimulatedClock;

    #[test]
    fn interval_for_one_megabyte_per_second() {
        // 1048576 / 1400 = 748 packets per second
        assert_eq!(interval_ns_for(1, PACKET_SIZE).unwrap(), 1_000_000_000 / 748);
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert!(interval_ns_for(0, PACKET_SIZE).is_err());
        assert!(interval_ns_for(1, 0).is_err());
    }

    #[test]
    fn wait_tiers_follow_remaining_time() {
        let policy = WaitPolicy::default();
        assert_eq!(policy.select(400_000), Wait::Sleep(Duration::from_nanos(200_000)));
        assert_eq!(policy.select(100_001), Wait::Sleep(Duration::from_nanos(50_000)));
        assert_eq!(policy.select(100_000), Wait::Yield);
        assert_eq!(policy.select(1_001), Wait::Yield);
        assert_eq!(policy.select(1_000), Wait::Spin);
        assert_eq!(policy.select(1), Wait::Spin);
    }

    #[test]
    fn late_send_does_not_shift_later_deadlines() {
        let mut pacer = Pacer::new(10, PACKET_SIZE, 1_000, WaitPolicy::default()).unwrap();
        let interval = pacer.interval_ns();
        assert!(pacer.is_due(1_000));
        // a send issued well after its deadline
        pacer.advance();
        assert_eq!(pacer.next_send_ns(), 1_000 + interval);
        pacer.advance();
        assert_eq!(pacer.next_send_ns(), 1_000 + 2 * interval);
    }

    #[test]
    fn plan_is_none_once_due() {
        let pacer = Pacer::new(1, PACKET_SIZE, 5_000, WaitPolicy::default()).unwrap();
        assert_eq!(pacer.plan(5_000), None);
        assert_eq!(pacer.plan(4_500), Some(Wait::Spin));
    }

    fn simulate_sends(rate_mbps: u32, seconds: u64) -> u64 {
        let clock = SimulatedClock::new(0);
        let mut pacer = Pacer::new(rate_mbps, PACKET_SIZE, clock.now_ns(), WaitPolicy::default()).unwrap();
        let end_ns = seconds * NANOS_PER_SECOND;
        let mut sends = 0;
        loop {
            let now = clock.now_ns();
            if now >= end_ns {
                break;
            }
            if pacer.is_due(now) {
                sends += 1;
                pacer.advance();
            } else {
                pacer.wait(&clock, now);
            }
        }
        sends
    }

    #[test]
    fn long_run_rate_converges_to_target() {
        for rate in [1_u32, 10, 50] {
            let sends = simulate_sends(rate, 2);
            let achieved = (sends * PACKET_SIZE as u64) as f64 / 2.0;
            let target = rate as f64 * BYTES_PER_MEGABYTE as f64;
            let error = (achieved - target).abs() / target;
            assert!(error <= 0.05, "rate {} achieved {} vs {} ({:.3})", rate, achieved, target, error);
        }
    }
}
