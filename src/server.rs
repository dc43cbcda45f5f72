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

use crate::config::ReceiverConfig;
use crate::context::RunContext;
use crate::protocol::results::{OutputFormat, CSV_HEADER};
use crate::stream::clock::{ClockSource, MonotonicClock};
use crate::stream::udp::receiver::{ReceiverOutcome, UdpReceiver};
use crate::BoxResult;

/// creates the data socket: IPv4, reusable address, large receive buffer, bounded reads
pub fn bind_receive_socket(cfg: &ReceiverConfig) -> BoxResult<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;

    log::debug!("setting receive-buffer to {}...", cfg.receive_buffer);
    if let Err(e) = socket.set_recv_buffer_size(cfg.receive_buffer) {
        log::warn!("unable to set receive-buffer to {}: {}", cfg.receive_buffer, e);
    }
    if let Ok(size) = socket.recv_buffer_size() {
        log::debug!("kernel granted a receive-buffer of {} bytes", size);
    }

    socket.bind(&SocketAddr::V4(cfg.bind).into())?;
    let socket: UdpSocket = socket.into();
    socket.set_read_timeout(Some(cfg.read_timeout))?;
    Ok(socket)
}

pub fn serve(cfg: &ReceiverConfig, ctx: &RunContext) -> BoxResult<ReceiverOutcome> {
    let socket = bind_receive_socket(cfg)?;
    log::info!("receiver listening on {}", socket.local_addr()?);
    Ok(serve_on(socket, cfg, ctx))
}

/// runs the receive loop on an already-bound socket, printing one record per window to stdout
pub fn serve_on(socket: UdpSocket, cfg: &ReceiverConfig, ctx: &RunContext) -> ReceiverOutcome {
    let mut receiver = UdpReceiver::new(socket, MonotonicClock, cfg.report_interval, cfg.watchdog);
    if cfg.clock != ClockSource::Monotonic {
        log::info!("computing latency against the {:?} clock", cfg.clock);
        receiver = receiver.with_stamp_clock(cfg.clock.build());
    }

    let format = cfg.format;
    if format == OutputFormat::Csv {
        println!("{}", CSV_HEADER);
    }

    let outcome = receiver.run(ctx.alive_flag(), |report| println!("{}", report.render(format)));
    log::info!("receiver finished: {}", outcome.totals);
    outcome
}
