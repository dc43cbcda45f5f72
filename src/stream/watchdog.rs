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

use std::time::Duration;

use crate::stream::clock::Clock;
use crate::stream::tracker::{LossLatencyTracker, TrackerPhase};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// silence allowed before any traffic has arrived
    pub startup_timeout: Duration,
    /// silence allowed after traffic has started
    pub idle_timeout: Duration,
    /// the clock is only consulted on every n-th idle poll
    pub check_every: u32,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        WatchdogConfig {
            startup_timeout: Duration::from_secs(30 * 60),
            idle_timeout: Duration::from_secs(30),
            check_every: 10,
        }
    }
}

/// why the receiver gave up
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchdogExpiry {
    NeverStarted { timeout: Duration, waited: Duration },
    TrafficStopped { timeout: Duration, idle: Duration },
}

impl std::fmt::Display for WatchdogExpiry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatchdogExpiry::NeverStarted { timeout, .. } => {
                write!(f, "No traffic received for {} seconds. Exiting.", timeout.as_secs())
            }
            WatchdogExpiry::TrafficStopped { timeout, .. } => {
                write!(f, "Traffic stopped for {} seconds. Exiting.", timeout.as_secs())
            }
        }
    }
}

/// the result of one idle poll
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdleCheck {
    /// the clock was not read
    Skipped,
    /// the clock was read at this time and nothing expired
    Checked(u64),
    Expired(WatchdogExpiry),
}

#[derive(Clone, Debug)]
pub struct IdleWatchdog {
    config: WatchdogConfig,
    idle_polls: u32,
}

impl IdleWatchdog {
    pub fn new(config: WatchdogConfig) -> IdleWatchdog {
        IdleWatchdog { config, idle_polls: 0 }
    }

    /// called when a poll returned no packet; reads the clock only every `check_every` calls
    pub fn on_idle_poll<C: Clock>(&mut self, clock: &C, tracker: &LossLatencyTracker) -> Option<WatchdogExpiry> {
        match self.poll_idle(clock, tracker) {
            IdleCheck::Expired(expiry) => Some(expiry),
            IdleCheck::Skipped | IdleCheck::Checked(_) => None,
        }
    }

    /// as `on_idle_poll`, also handing back the time it read so callers can reuse it
    pub fn poll_idle<C: Clock>(&mut self, clock: &C, tracker: &LossLatencyTracker) -> IdleCheck {
        self.idle_polls += 1;
        if self.idle_polls < self.config.check_every.max(1) {
            return IdleCheck::Skipped;
        }
        self.idle_polls = 0;
        let now_ns = clock.now_ns();
        match self.check(now_ns, tracker) {
            Some(expiry) => IdleCheck::Expired(expiry),
            None => IdleCheck::Checked(now_ns),
        }
    }

    /// both boundaries are inclusive
    pub fn check(&self, now_ns: u64, tracker: &LossLatencyTracker) -> Option<WatchdogExpiry> {
        match tracker.phase() {
            TrackerPhase::AwaitingFirstPacket => {
                let waited = Duration::from_nanos(now_ns.saturating_sub(tracker.run_start_ns()));
                if waited >= self.config.startup_timeout {
                    return Some(WatchdogExpiry::NeverStarted {
                        timeout: self.config.startup_timeout,
                        waited,
                    });
                }
            }
            TrackerPhase::Active => {
                let idle = Duration::from_nanos(now_ns.saturating_sub(tracker.last_receipt_ns()));
                if idle >= self.config.idle_timeout {
                    return Some(WatchdogExpiry::TrafficStopped {
                        timeout: self.config.idle_timeout,
                        idle,
                    });
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::packet::{PacketHeader, PACKET_SIZE};
    use crate::stream::clock::SimulatedClock;

    const SECOND: u64 = 1_000_000_000;

    fn active_tracker(last_receipt_ns: u64) -> LossLatencyTracker {
        let mut tracker = LossLatencyTracker::new(0);
        let header = PacketHeader {
            sequence_number: 1,
            send_timestamp_ns: 0,
        };
        tracker.observe(&header, PACKET_SIZE, last_receipt_ns);
        tracker
    }

    #[test]
    fn never_started_expires_at_thirty_minutes() {
        let watchdog = IdleWatchdog::new(WatchdogConfig::default());
        let tracker = LossLatencyTracker::new(0);
        assert!(watchdog.check(1799 * SECOND, &tracker).is_none());
        assert!(watchdog.check(1800 * SECOND - 1, &tracker).is_none());
        match watchdog.check(1800 * SECOND, &tracker) {
            Some(WatchdogExpiry::NeverStarted { waited, .. }) => assert_eq!(waited, Duration::from_secs(1800)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn stopped_traffic_expires_thirty_seconds_after_last_packet() {
        let watchdog = IdleWatchdog::new(WatchdogConfig::default());
        let tracker = active_tracker(100 * SECOND);
        assert!(watchdog.check(129 * SECOND, &tracker).is_none());
        assert!(watchdog.check(130 * SECOND - 1, &tracker).is_none());
        assert!(matches!(
            watchdog.check(130 * SECOND, &tracker),
            Some(WatchdogExpiry::TrafficStopped { .. })
        ));
    }

    #[test]
    fn startup_timeout_does_not_apply_once_active() {
        let watchdog = IdleWatchdog::new(WatchdogConfig::default());
        let tracker = active_tracker(3000 * SECOND);
        assert!(watchdog.check(3010 * SECOND, &tracker).is_none());
    }

    #[test]
    fn clock_is_read_only_every_tenth_idle_poll() {
        let clock = SimulatedClock::with_costs(0, 1, 0);
        let mut watchdog = IdleWatchdog::new(WatchdogConfig::default());
        let tracker = LossLatencyTracker::new(0);
        for _ in 0..9 {
            assert!(watchdog.on_idle_poll(&clock, &tracker).is_none());
        }
        assert_eq!(clock.peek_ns(), 0);
        watchdog.on_idle_poll(&clock, &tracker);
        assert_eq!(clock.peek_ns(), 1);
    }

    #[test]
    fn idle_poll_hands_back_the_time_it_read() {
        let clock = SimulatedClock::with_costs(5 * SECOND, 0, 0);
        let mut watchdog = IdleWatchdog::new(WatchdogConfig {
            check_every: 3,
            ..WatchdogConfig::default()
        });
        let tracker = active_tracker(4 * SECOND);
        assert_eq!(watchdog.poll_idle(&clock, &tracker), IdleCheck::Skipped);
        assert_eq!(watchdog.poll_idle(&clock, &tracker), IdleCheck::Skipped);
        assert_eq!(watchdog.poll_idle(&clock, &tracker), IdleCheck::Checked(5 * SECOND));
        assert_eq!(watchdog.poll_idle(&clock, &tracker), IdleCheck::Skipped);
    }

    #[test]
    fn amortised_check_still_fires() {
        let clock = SimulatedClock::with_costs(31 * SECOND, 0, 0);
        let mut watchdog = IdleWatchdog::new(WatchdogConfig::default());
        let tracker = active_tracker(SECOND);
        let fired = (0..10).filter_map(|_| watchdog.on_idle_poll(&clock, &tracker)).count();
        assert_eq!(fired, 1);
    }

    #[test]
    fn expiry_messages_name_the_timeout() {
        let expiry = WatchdogExpiry::TrafficStopped {
            timeout: Duration::from_secs(30),
            idle: Duration::from_secs(31),
        };
        assert_eq!(expiry.to_string(), "Traffic stopped for 30 seconds. Exiting.");
    }
}
