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

use crate::protocol::packet::PacketHeader;

/// counters scoped to a single reporting window
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntervalStats {
    pub packets_received: u64,
    pub bytes_received: u64,
    pub packets_lost: u64,
    pub latency_sum_ns: u128,
    pub latency_count: u64,
}

impl IntervalStats {
    /// zero when nothing arrived
    pub fn mean_latency_ns(&self) -> u64 {
        if self.latency_count == 0 {
            0
        } else {
            (self.latency_sum_ns / self.latency_count as u128) as u64
        }
    }

    fn absorb(&mut self, other: &IntervalStats) {
        self.packets_received += other.packets_received;
        self.bytes_received += other.bytes_received;
        self.packets_lost += other.packets_lost;
        self.latency_sum_ns += other.latency_sum_ns;
        self.latency_count += other.latency_count;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackerPhase {
    AwaitingFirstPacket,
    Active,
}

/// what a single packet contributed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Observation {
    pub latency_ns: u64,
    /// packets presumed lost in the gap this packet revealed
    pub lost: u64,
    /// this packet moved the tracker out of `AwaitingFirstPacket`
    pub first: bool,
    /// arrived below the high-water mark
    pub late: bool,
}

/// infers loss from gaps in the sequence high-water mark and accumulates latency
///
/// a packet arriving below the mark counts as received but never reduces
/// loss already attributed, so reordering reads as loss followed by a late
/// arrival, and duplicates inflate the received count.
#[derive(Clone, Debug)]
pub struct LossLatencyTracker {
    phase: TrackerPhase,
    highest_sequence_seen: u64,
    last_receipt_ns: u64,
    run_start_ns: u64,
    interval: IntervalStats,
    completed: IntervalStats,
}

impl LossLatencyTracker {
    pub fn new(run_start_ns: u64) -> LossLatencyTracker {
        LossLatencyTracker {
            phase: TrackerPhase::AwaitingFirstPacket,
            highest_sequence_seen: 0,
            last_receipt_ns: run_start_ns,
            run_start_ns,
            interval: IntervalStats::default(),
            completed: IntervalStats::default(),
        }
    }

    /// records a packet received at `now_ns`, a time in the sender's stamping domain
    pub fn observe(&mut self, header: &PacketHeader, wire_len: usize, now_ns: u64) -> Observation {
        self.observe_at(header, wire_len, now_ns, now_ns)
    }

    /// as `observe`, for when the receive loop's clock differs from the stamping clock
    ///
    /// `receipt_ns` feeds the idle watchdog; `stamp_now_ns` is compared with
    /// the packet's send timestamp.
    pub fn observe_at(&mut self, header: &PacketHeader, wire_len: usize, receipt_ns: u64, stamp_now_ns: u64) -> Observation {
        let first = self.phase == TrackerPhase::AwaitingFirstPacket;
        let mut lost = 0;
        let mut late = false;

        if first {
            //whatever preceded the first packet was never ours to count
            self.phase = TrackerPhase::Active;
        } else if header.sequence_number > self.highest_sequence_seen.saturating_add(1) {
            lost = header.sequence_number - self.highest_sequence_seen - 1;
        } else if header.sequence_number <= self.highest_sequence_seen {
            late = true;
        }
        if first || header.sequence_number > self.highest_sequence_seen {
            self.highest_sequence_seen = header.sequence_number;
        }

        let latency_ns = stamp_now_ns.saturating_sub(header.send_timestamp_ns);

        self.interval.packets_received += 1;
        self.interval.bytes_received += wire_len as u64;
        self.interval.packets_lost += lost;
        self.interval.latency_sum_ns += latency_ns as u128;
        self.interval.latency_count += 1;
        self.last_receipt_ns = receipt_ns;

        Observation {
            latency_ns,
            lost,
            first,
            late,
        }
    }

    /// hands back the current window's counters and starts a fresh one
    pub fn take_interval(&mut self) -> IntervalStats {
        let interval = std::mem::take(&mut self.interval);
        self.completed.absorb(&interval);
        interval
    }

    pub fn interval(&self) -> &IntervalStats {
        &self.interval
    }

    /// every window so far, including the one still open
    pub fn lifetime(&self) -> IntervalStats {
        let mut lifetime = self.completed.clone();
        lifetime.absorb(&self.interval);
        lifetime
    }

    pub fn phase(&self) -> TrackerPhase {
        self.phase
    }

    pub fn traffic_started(&self) -> bool {
        self.phase == TrackerPhase::Active
    }

    pub fn highest_sequence_seen(&self) -> u64 {
        self.highest_sequence_seen
    }

    /// the run start until the first packet arrives
    pub fn last_receipt_ns(&self) -> u64 {
        self.last_receipt_ns
    }

    pub fn run_start_ns(&self) -> u64 {
        self.run_start_ns
    }
}
