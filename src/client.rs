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

use std::net::{SocketAddr, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};

use crate::config::SenderConfig;
use crate::context::RunContext;
use crate::stream::clock::{ClockSource, MonotonicClock};
use crate::stream::udp::sender::{StepSummary, UdpSender};
use crate::utils::cpu_affinity::CpuAffinityManager;
use crate::BoxResult;

/// creates the data socket: IPv4, large send buffer, connected to the receiver
pub fn connect_send_socket(cfg: &SenderConfig) -> BoxResult<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;

    log::debug!("setting send-buffer to {}...", cfg.send_buffer);
    if let Err(e) = socket.set_send_buffer_size(cfg.send_buffer) {
        log::warn!("unable to set send-buffer to {}: {}", cfg.send_buffer, e);
    }
    if let Ok(size) = socket.send_buffer_size() {
        log::debug!("kernel granted a send-buffer of {} bytes", size);
    }

    socket.connect(&SocketAddr::V4(cfg.peer).into())?;
    Ok(socket.into())
}

pub fn execute(cfg: &SenderConfig, ctx: &RunContext) -> BoxResult<Vec<StepSummary>> {
    let socket = connect_send_socket(cfg)?;
    log::info!("sending from {} to {}", socket.local_addr()?, cfg.peer);
    execute_on(socket, cfg, ctx)
}

/// runs the whole ramp over a connected socket, announcing each step on stdout
pub fn execute_on(socket: UdpSocket, cfg: &SenderConfig, ctx: &RunContext) -> BoxResult<Vec<StepSummary>> {
    CpuAffinityManager::new(&cfg.affinity)?.set_affinity();

    let mut sender = UdpSender::new(socket, MonotonicClock, cfg.wait_policy);
    if cfg.clock != ClockSource::Monotonic {
        log::info!("stamping packets from the {:?} clock", cfg.clock);
        sender = sender.with_stamp_clock(cfg.clock.build());
    }

    log::info!(
        "ramping through {} steps over {}s",
        cfg.schedule.len(),
        cfg.schedule.total_duration().as_secs()
    );
    let summaries = sender.run(&cfg.schedule, ctx.alive_flag(), |step| {
        println!("Testing Rate: {} MB/s", step.target_mbps);
    })?;

    let failures: u64 = summaries.iter().map(|s| s.send_failures).sum();
    if failures > 0 {
        log::warn!("{} sends failed over the run", failures);
    }
    log::info!("{} packets sent", sender.next_sequence() - 1);
    Ok(summaries)
}
