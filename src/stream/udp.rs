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

pub mod receiver {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use crate::{
        protocol::{
            packet::{PacketHeader, PACKET_SIZE},
            results::{IntervalReport, RunTotals},
        },
        stream::{
            clock::Clock,
            is_timeout,
            reporter::IntervalReporter,
            tracker::LossLatencyTracker,
            watchdog::{IdleCheck, IdleWatchdog, WatchdogConfig, WatchdogExpiry},
            DatagramSource,
        },
    };

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum ReceiverExit {
        Watchdog(WatchdogExpiry),
        Interrupted,
    }

    impl ReceiverExit {
        pub fn exit_code(&self) -> i32 {
            match self {
                ReceiverExit::Interrupted => 0,
                ReceiverExit::Watchdog(WatchdogExpiry::TrafficStopped { .. }) => 0,
                ReceiverExit::Watchdog(WatchdogExpiry::NeverStarted { .. }) => 2,
            }
        }
    }

    impl std::fmt::Display for ReceiverExit {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                ReceiverExit::Watchdog(expiry) => write!(f, "{}", expiry),
                ReceiverExit::Interrupted => write!(f, "Interrupted. Exiting."),
            }
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    pub struct ReceiverOutcome {
        pub exit: ReceiverExit,
        pub totals: RunTotals,
    }

    /// the receive loop: tracker, reporter and watchdog share one thread of control
    pub struct UdpReceiver<S, C> {
        source: S,
        clock: C,
        tracker: LossLatencyTracker,
        reporter: IntervalReporter,
        watchdog: IdleWatchdog,
        stamp_clock: Option<Box<dyn Clock + Send + Sync>>,
        buf: Vec<u8>,
    }

    impl<S: DatagramSource, C: Clock> UdpReceiver<S, C> {
        pub fn new(source: S, clock: C, report_interval: Duration, watchdog: WatchdogConfig) -> UdpReceiver<S, C> {
            let start = clock.now_ns();
            UdpReceiver {
                source,
                clock,
                tracker: LossLatencyTracker::new(start),
                reporter: IntervalReporter::new(report_interval, start),
                watchdog: IdleWatchdog::new(watchdog),
                stamp_clock: None,
                buf: vec![0_u8; PACKET_SIZE],
            }
        }

        /// computes latency against `clock` instead of the loop clock
        pub fn with_stamp_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> UdpReceiver<S, C> {
            self.stamp_clock = Some(clock);
            self
        }

        pub fn tracker(&self) -> &LossLatencyTracker {
            &self.tracker
        }

        /// runs until the watchdog fires or `alive` is cleared
        pub fn run<F: FnMut(&IntervalReport)>(&mut self, alive: &AtomicBool, mut on_report: F) -> ReceiverOutcome {
            while alive.load(Ordering::Relaxed) {
                let now = match self.source.recv(&mut self.buf) {
                    Ok(packet_size) => {
                        let now = self.clock.now_ns();
                        self.process_datagram(packet_size, now);
                        now
                    }
                    Err(e) => {
                        if !is_timeout(&e) {
                            log::warn!("unable to receive UDP packet: {}", e);
                        }
                        //idle polls only see the clock when the watchdog reads it, so
                        //silent windows are reported at that cadence
                        match self.watchdog.poll_idle(&self.clock, &self.tracker) {
                            IdleCheck::Expired(expiry) => {
                                log::info!("{}", expiry);
                                return self.finish(ReceiverExit::Watchdog(expiry));
                            }
                            IdleCheck::Checked(now) => now,
                            IdleCheck::Skipped => continue,
                        }
                    }
                };

                if self.tracker.traffic_started() {
                    if let Some(report) = self.reporter.poll(now, &mut self.tracker) {
                        on_report(&report);
                    }
                }
            }
            log::debug!("receive loop stopped by request");
            self.finish(ReceiverExit::Interrupted)
        }

        fn process_datagram(&mut self, packet_size: usize, now: u64) {
            let header = match PacketHeader::decode(&self.buf[..packet_size]) {
                Ok(header) => header,
                Err(e) => {
                    log::debug!("discarding malformed datagram: {}", e);
                    return;
                }
            };
            let stamp_now = match &self.stamp_clock {
                Some(clock) => clock.now_ns(),
                None => now,
            };
            let observation = self.tracker.observe_at(&header, packet_size, now, stamp_now);
            if observation.first {
                log::info!("traffic started at sequence {}", header.sequence_number);
                self.reporter.restart(now);
            }
            if observation.lost > 0 {
                log::trace!(
                    "observed a gap of {} packets before sequence {}",
                    observation.lost,
                    header.sequence_number
                );
            } else if observation.late {
                log::trace!(
                    "sequence {} arrived below the high-water mark of {}",
                    header.sequence_number,
                    self.tracker.highest_sequence_seen()
                );
            }
        }

        fn finish(&mut self, exit: ReceiverExit) -> ReceiverOutcome {
            let lifetime = self.tracker.lifetime();
            let totals = RunTotals {
                packets_received: lifetime.packets_received,
                bytes_received: lifetime.bytes_received,
                packets_lost: lifetime.packets_lost,
                mean_latency_ns: lifetime.mean_latency_ns(),
                reports_emitted: self.reporter.reports_emitted(),
            };
            ReceiverOutcome { exit, totals }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::stream::clock::SimulatedClock;
        use std::collections::VecDeque;
        use std::io;
        use std::sync::atomic::AtomicU64;
        use std::sync::Arc;

        /// yields queued datagrams `spacing` apart, then read timeouts that cost the configured wait
        struct Script {
            clock: Arc<SimulatedClock>,
            datagrams: VecDeque<Vec<u8>>,
            read_timeout: Duration,
            spacing: Duration,
        }

        impl DatagramSource for Script {
            fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                match self.datagrams.pop_front() {
                    Some(d) => {
                        self.clock.advance(self.spacing);
                        buf[..d.len()].copy_from_slice(&d);
                        Ok(d.len())
                    }
                    None => {
                        self.clock.sleep(self.read_timeout);
                        Err(io::Error::from(io::ErrorKind::WouldBlock))
                    }
                }
            }
        }

        #[test]
        fn short_datagrams_are_not_counted() {
            let clock = Arc::new(SimulatedClock::with_costs(0, 0, 0));
            let source = Script {
                clock: clock.clone(),
                datagrams: VecDeque::from(vec![vec![0_u8; 8], vec![1_u8; 15]]),
                read_timeout: Duration::from_secs(1),
                spacing: Duration::ZERO,
            };
            let config = WatchdogConfig {
                startup_timeout: Duration::from_secs(5),
                idle_timeout: Duration::from_secs(5),
                check_every: 1,
            };
            let mut receiver = UdpReceiver::new(source, clock, Duration::from_secs(1), config);
            let alive = AtomicBool::new(true);
            let outcome = receiver.run(&alive, |_| panic!("nothing should be reported"));
            assert!(matches!(
                outcome.exit,
                ReceiverExit::Watchdog(WatchdogExpiry::NeverStarted { .. })
            ));
            assert_eq!(outcome.exit.exit_code(), 2);
            assert_eq!(outcome.totals, RunTotals::default());
            assert!(!receiver.tracker().traffic_started());
        }

        fn flow_packet(sequence_number: u64) -> Vec<u8> {
            let mut d = vec![0_u8; PACKET_SIZE];
            PacketHeader {
                sequence_number,
                send_timestamp_ns: 0,
            }
            .encode_into(&mut d)
            .unwrap();
            d
        }

        fn quick_watchdog() -> WatchdogConfig {
            WatchdogConfig {
                startup_timeout: Duration::from_secs(5),
                idle_timeout: Duration::from_secs(5),
                check_every: 1,
            }
        }

        #[test]
        fn short_datagram_mid_flow_leaves_counters_alone() {
            let clock = Arc::new(SimulatedClock::with_costs(0, 0, 0));
            let source = Script {
                clock: clock.clone(),
                datagrams: VecDeque::from(vec![flow_packet(1), flow_packet(2), vec![9_u8; 10]]),
                read_timeout: Duration::from_secs(1),
                spacing: Duration::from_millis(1),
            };
            let mut receiver = UdpReceiver::new(source, clock, Duration::from_secs(60), quick_watchdog());
            let alive = AtomicBool::new(true);
            let outcome = receiver.run(&alive, |_| ());

            let lifetime = receiver.tracker().lifetime();
            assert_eq!(lifetime.packets_received, 2);
            assert_eq!(lifetime.bytes_received, 2 * PACKET_SIZE as u64);
            assert_eq!(lifetime.packets_lost, 0);
            // the short datagram arrived at 3ms but is not a receipt
            assert_eq!(receiver.tracker().last_receipt_ns(), 2_000_000);
            assert_eq!(receiver.tracker().highest_sequence_seen(), 2);
            assert_eq!(outcome.totals.packets_received, 2);
        }

        #[test]
        fn late_packet_is_received_without_changing_loss() {
            let clock = Arc::new(SimulatedClock::with_costs(0, 0, 0));
            let source = Script {
                clock: clock.clone(),
                datagrams: VecDeque::from(vec![flow_packet(1), flow_packet(3), flow_packet(2)]),
                read_timeout: Duration::from_secs(1),
                spacing: Duration::from_millis(1),
            };
            let mut receiver = UdpReceiver::new(source, clock, Duration::from_secs(60), quick_watchdog());
            let alive = AtomicBool::new(true);
            let outcome = receiver.run(&alive, |_| ());
            assert_eq!(outcome.totals.packets_received, 3);
            assert_eq!(outcome.totals.packets_lost, 1);
            assert_eq!(receiver.tracker().highest_sequence_seen(), 3);
        }

        /// counts reads of the loop clock; the script sleeps on the inner clock directly
        struct CountingClock {
            inner: Arc<SimulatedClock>,
            reads: AtomicU64,
        }

        impl Clock for CountingClock {
            fn now_ns(&self) -> u64 {
                self.reads.fetch_add(1, Ordering::Relaxed);
                self.inner.now_ns()
            }
        }

        #[test]
        fn idle_polls_read_the_clock_only_when_the_watchdog_checks() {
            let inner = Arc::new(SimulatedClock::with_costs(0, 0, 0));
            let source = Script {
                clock: inner.clone(),
                datagrams: VecDeque::from(vec![flow_packet(1), flow_packet(2)]),
                read_timeout: Duration::from_secs(1),
                spacing: Duration::from_millis(1),
            };
            let clock = CountingClock {
                inner,
                reads: AtomicU64::new(0),
            };
            let config = WatchdogConfig {
                idle_timeout: Duration::from_secs(5),
                ..WatchdogConfig::default()
            };
            let mut receiver = UdpReceiver::new(source, clock, Duration::from_secs(1), config);
            let alive = AtomicBool::new(true);
            let outcome = receiver.run(&alive, |_| ());
            assert!(matches!(
                outcome.exit,
                ReceiverExit::Watchdog(WatchdogExpiry::TrafficStopped { .. })
            ));
            // construction, two packets, then one watchdog read after ten idle polls
            assert_eq!(receiver.clock.reads.load(Ordering::Relaxed), 4);
        }

        #[test]
        fn cleared_flag_stops_the_loop() {
            let clock = Arc::new(SimulatedClock::new(0));
            let source = Script {
                clock: clock.clone(),
                datagrams: VecDeque::new(),
                read_timeout: Duration::from_secs(1),
                spacing: Duration::ZERO,
            };
            let mut receiver = UdpReceiver::new(source, clock, Duration::from_secs(1), WatchdogConfig::default());
            let alive = AtomicBool::new(false);
            let outcome = receiver.run(&alive, |_| ());
            assert_eq!(outcome.exit, ReceiverExit::Interrupted);
            assert_eq!(outcome.exit.exit_code(), 0);
        }
    }
}

pub mod sender {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use crate::{
        error::Result,
        protocol::packet::{Packet, PacketHeader, PACKET_SIZE},
        stream::{
            clock::Clock,
            pacer::{Pacer, WaitPolicy, BYTES_PER_MEGABYTE},
            ramp::{RampSchedule, RateStep},
            DatagramSink,
        },
    };

    /// how a single ramp step went
    #[derive(Clone, Debug, Default, PartialEq)]
    pub struct StepSummary {
        pub target_mbps: u32,
        pub packets_sent: u64,
        pub bytes_sent: u64,
        pub send_failures: u64,
        pub elapsed: Duration,
    }

    impl StepSummary {
        /// MiB/s actually handed to the transport
        pub fn achieved_mbps(&self) -> f64 {
            let seconds = self.elapsed.as_secs_f64();
            if seconds == 0.0 {
                0.0
            } else {
                self.bytes_sent as f64 / seconds / BYTES_PER_MEGABYTE as f64
            }
        }
    }

    /// drives the pacer across a ramp, stamping and emitting packets
    pub struct UdpSender<K, C> {
        sink: K,
        clock: C,
        policy: WaitPolicy,
        stamp_clock: Option<Box<dyn Clock + Send + Sync>>,
        packet: Packet,
        next_sequence: u64,
    }

    impl<K: DatagramSink, C: Clock> UdpSender<K, C> {
        pub fn new(sink: K, clock: C, policy: WaitPolicy) -> UdpSender<K, C> {
            UdpSender {
                sink,
                clock,
                policy,
                stamp_clock: None,
                packet: Packet::new(),
                next_sequence: 1,
            }
        }

        /// stamps packets from `clock` while pacing stays on the loop clock
        pub fn with_stamp_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> UdpSender<K, C> {
            self.stamp_clock = Some(clock);
            self
        }

        /// the sequence number the next successful send will carry
        pub fn next_sequence(&self) -> u64 {
            self.next_sequence
        }

        pub fn sink(&self) -> &K {
            &self.sink
        }

        /// runs every step in order; `on_step` is told about each step as it begins
        pub fn run<F: FnMut(&RateStep)>(
            &mut self,
            schedule: &RampSchedule,
            alive: &AtomicBool,
            mut on_step: F,
        ) -> Result<Vec<StepSummary>> {
            let mut summaries = Vec::with_capacity(schedule.len());
            for step in schedule.steps() {
                if !alive.load(Ordering::Relaxed) {
                    log::debug!("ramp stopped by request before {} MB/s", step.target_mbps);
                    break;
                }
                on_step(step);
                let summary = self.run_step(step, alive)?;
                log::debug!(
                    "step {} MB/s: {} packets, {} send failures, {:.2} MB/s achieved",
                    summary.target_mbps,
                    summary.packets_sent,
                    summary.send_failures,
                    summary.achieved_mbps()
                );
                summaries.push(summary);
            }
            Ok(summaries)
        }

        /// holds one rate for the step's duration; sequence numbers carry over between steps
        pub fn run_step(&mut self, step: &RateStep, alive: &AtomicBool) -> Result<StepSummary> {
            let start = self.clock.now_ns();
            let end = start + step.duration().as_nanos() as u64;
            let mut pacer = Pacer::new(step.target_mbps, PACKET_SIZE, start, self.policy)?;

            let mut summary = StepSummary {
                target_mbps: step.target_mbps,
                ..StepSummary::default()
            };

            let mut now = start;
            while alive.load(Ordering::Relaxed) {
                now = self.clock.now_ns();
                if now >= end {
                    break;
                }
                if !pacer.is_due(now) {
                    pacer.wait(&self.clock, now);
                    continue;
                }

                let header = PacketHeader {
                    sequence_number: self.next_sequence,
                    send_timestamp_ns: match &self.stamp_clock {
                        Some(clock) => clock.now_ns(),
                        None => now,
                    },
                };
                let wire = self.packet.stamp(&header);
                match self.sink.send(wire) {
                    Ok(packet_size) => {
                        self.next_sequence += 1;
                        summary.packets_sent += 1;
                        summary.bytes_sent += packet_size as u64;
                    }
                    Err(e) => {
                        //no retry: the slot is spent either way
                        summary.send_failures += 1;
                        if summary.send_failures == 1 {
                            log::warn!("unable to send UDP packet {}: {}", header.sequence_number, e);
                        } else {
                            log::trace!("unable to send UDP packet {}: {}", header.sequence_number, e);
                        }
                    }
                }
                pacer.advance();
            }

            summary.elapsed = Duration::from_nanos(now.saturating_sub(start));
            Ok(summary)
        }
    }

}
