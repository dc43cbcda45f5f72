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

use std::net::Ipv4Addr;

use clap::{Parser, ValueEnum};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Csv,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ClockKind {
    /// CLOCK_MONOTONIC; only comparable between processes on one host
    Monotonic,
    /// wall-clock time; requires externally synchronised hosts
    Realtime,
}

/// ramps UDP send rate between two hosts and measures throughput, latency and loss
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// run in receiver mode
    #[arg(short, long, conflicts_with = "client")]
    pub server: bool,

    /// run in sender mode, targeting the specified receiver
    #[arg(short, long, value_name = "IPv4")]
    pub client: Option<Ipv4Addr>,

    /// the UDP data port the receiver binds
    #[arg(short, long, value_name = "number", default_value_t = 10001)]
    pub port: u16,

    /// the highest rate of the ramp, in megabytes per second
    #[arg(short, long, value_name = "MB/s", default_value_t = 100)]
    pub bandwidth: u32,

    /// seconds to hold each rate step
    #[arg(short, long, value_name = "seconds", default_value_t = 5)]
    pub time: u32,

    /// how long a single receive may block before the loop re-checks its timers
    #[arg(long, value_name = "seconds", default_value_t = 1.0)]
    pub read_timeout: f64,

    /// receiver exits if no traffic arrives within this many seconds of launch
    #[arg(long, value_name = "seconds", default_value_t = 1800)]
    pub startup_timeout: u64,

    /// receiver exits after this many seconds without traffic, once it has started
    #[arg(long, value_name = "seconds", default_value_t = 30)]
    pub idle_timeout: u64,

    /// socket send/receive buffer size, in bytes
    #[arg(long, value_name = "bytes", default_value_t = 8 * 1024 * 1024)]
    pub buffer: usize,

    /// how the receiver prints its per-second records
    #[arg(long, value_enum, default_value_t = Format::Csv)]
    pub format: Format,

    /// clock used for packet timestamps and latency
    #[arg(long, value_enum, default_value_t = ClockKind::Monotonic)]
    pub clock: ClockKind,

    /// pin the sending thread to one of these CPU cores, e.g. "2" or "2,3"
    #[arg(short = 'A', long, value_name = "cores", default_value = "")]
    pub affinity: String,

    /// emit debug-level logging
    #[arg(short, long)]
    pub debug: bool,
}
