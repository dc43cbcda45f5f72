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

//! validated, role-specific configuration built from the command line

use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use crate::args::{Args, ClockKind, Format};
use crate::error::{Error, Result};
use crate::protocol::packet::PACKET_SIZE;
use crate::protocol::results::OutputFormat;
use crate::stream::clock::ClockSource;
use crate::stream::pacer::WaitPolicy;
use crate::stream::ramp::RampSchedule;
use crate::stream::watchdog::WatchdogConfig;
use crate::stream::INTERVAL;

pub const DEFAULT_SOCKET_BUFFER: usize = 8 * 1024 * 1024;

const MIN_READ_TIMEOUT: Duration = Duration::from_millis(10);
const MAX_READ_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq)]
pub struct SenderConfig {
    pub peer: SocketAddrV4,
    pub schedule: RampSchedule,
    pub send_buffer: usize,
    pub wait_policy: WaitPolicy,
    pub clock: ClockSource,
    pub affinity: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReceiverConfig {
    pub bind: SocketAddrV4,
    pub read_timeout: Duration,
    pub report_interval: Duration,
    pub receive_buffer: usize,
    pub watchdog: WatchdogConfig,
    pub format: OutputFormat,
    pub clock: ClockSource,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Role {
    Sender(SenderConfig),
    Receiver(ReceiverConfig),
}

fn validate_read_timeout(seconds: f64) -> Duration {
    if !seconds.is_finite() || seconds <= 0.0 {
        log::warn!("read-timeout was invalid; defaulting to one second");
        return Duration::from_secs(1);
    }
    //values too large for a Duration are simply too long
    let requested = Duration::try_from_secs_f64(seconds).unwrap_or(MAX_READ_TIMEOUT);
    let timeout = requested.clamp(MIN_READ_TIMEOUT, MAX_READ_TIMEOUT);
    if timeout != requested || seconds > MAX_READ_TIMEOUT.as_secs_f64() {
        log::warn!(
            "read-timeout of {}s was not in an acceptable range and has been set to {}s",
            seconds,
            timeout.as_secs_f64()
        );
    }
    timeout
}

fn validate_buffer(buffer: usize) -> usize {
    if buffer < PACKET_SIZE * 2 {
        log::warn!(
            "requested socket buffer, {}, is too small to hold the data to be exchanged; it will be increased to {}",
            buffer,
            PACKET_SIZE * 2
        );
        PACKET_SIZE * 2
    } else {
        buffer
    }
}

fn validate_timeout(seconds: u64, name: &str, default: Duration) -> Duration {
    if seconds > 0 {
        Duration::from_secs(seconds)
    } else {
        log::warn!("{} must be positive; defaulting to {} seconds", name, default.as_secs());
        default
    }
}

fn clock_source(kind: ClockKind) -> ClockSource {
    match kind {
        ClockKind::Monotonic => ClockSource::Monotonic,
        ClockKind::Realtime => ClockSource::Realtime,
    }
}

fn output_format(format: Format) -> OutputFormat {
    match format {
        Format::Csv => OutputFormat::Csv,
        Format::Json => OutputFormat::Json,
    }
}

impl Role {
    pub fn from_args(args: &Args) -> Result<Role> {
        match (args.server, args.client) {
            (true, Some(_)) => Err(Error::Config("choose either receiver or sender mode, not both".to_string())),
            (true, None) => Ok(Role::Receiver(ReceiverConfig::from_args(args))),
            (false, Some(peer)) => Ok(Role::Sender(SenderConfig::from_args(args, peer)?)),
            (false, None) => Err(Error::Config(
                "sender mode requires -c <receiver address>; use -s for receiver mode".to_string(),
            )),
        }
    }
}

impl SenderConfig {
    pub fn from_args(args: &Args, peer: Ipv4Addr) -> Result<SenderConfig> {
        Ok(SenderConfig {
            peer: SocketAddrV4::new(peer, args.port),
            schedule: RampSchedule::new(args.bandwidth, args.time)?,
            send_buffer: validate_buffer(args.buffer),
            wait_policy: WaitPolicy::default(),
            clock: clock_source(args.clock),
            affinity: args.affinity.clone(),
        })
    }
}

impl ReceiverConfig {
    pub fn from_args(args: &Args) -> ReceiverConfig {
        let defaults = WatchdogConfig::default();
        ReceiverConfig {
            bind: SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, args.port),
            read_timeout: validate_read_timeout(args.read_timeout),
            report_interval: INTERVAL,
            receive_buffer: validate_buffer(args.buffer),
            watchdog: WatchdogConfig {
                startup_timeout: validate_timeout(args.startup_timeout, "startup-timeout", defaults.startup_timeout),
                idle_timeout: validate_timeout(args.idle_timeout, "idle-timeout", defaults.idle_timeout),
                ..defaults
            },
            format: output_format(args.format),
            clock: clock_source(args.clock),
        }
    }
}
