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

use crate::protocol::results::IntervalReport;
use crate::stream::tracker::LossLatencyTracker;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// snapshots and resets the tracker's window once it has run past `window`
///
/// timing comes from whichever clock the receive loop uses; it must be
/// monotonic for windows to be immune to wall-clock adjustments.
#[derive(Clone, Debug)]
pub struct IntervalReporter {
    window_ns: u64,
    window_start_ns: u64,
    reports_emitted: u64,
}

impl IntervalReporter {
    pub fn new(window: Duration, now_ns: u64) -> IntervalReporter {
        IntervalReporter {
            window_ns: window.as_nanos() as u64,
            window_start_ns: now_ns,
            reports_emitted: 0,
        }
    }

    /// opens a new window at `now_ns` without reporting the current one
    pub fn restart(&mut self, now_ns: u64) {
        self.window_start_ns = now_ns;
    }

    pub fn reports_emitted(&self) -> u64 {
        self.reports_emitted
    }

    pub fn poll(&mut self, now_ns: u64, tracker: &mut LossLatencyTracker) -> Option<IntervalReport> {
        let elapsed_ns = now_ns.saturating_sub(self.window_start_ns);
        if elapsed_ns <= self.window_ns {
            return None;
        }

        let stats = tracker.take_interval();
        let window_seconds = elapsed_ns as f64 / NANOS_PER_SECOND as f64;
        let achieved_mbps = (stats.bytes_received * 8) as f64 / 1_000_000.0 / window_seconds;

        self.window_start_ns = now_ns;
        self.reports_emitted += 1;

        log::debug!(
            "window closed after {:.3}s: {} packets, {} bytes, {} lost",
            window_seconds,
            stats.packets_received,
            stats.bytes_received,
            stats.packets_lost
        );

        Some(IntervalReport {
            timestamp_seconds: now_ns / NANOS_PER_SECOND,
            achieved_mbps,
            mean_latency_ns: stats.mean_latency_ns(),
            packets_lost: stats.packets_lost,
            packets_received: stats.packets_received,
            bytes_received: stats.bytes_received,
            window_seconds,
        })
    }
}
