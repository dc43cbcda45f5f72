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

pub mod clock;
pub mod pacer;
pub mod ramp;
pub mod reporter;
pub mod tracker;
pub mod udp;
pub mod watchdog;

use std::io;
use std::net::UdpSocket;
use std::time::Duration;

/// the reporting window; one record is emitted per elapsed interval
pub const INTERVAL: Duration = Duration::from_secs(1);

/// where the sender's datagrams go
pub trait DatagramSink {
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;
}

/// where the receiver's datagrams come from
///
/// an elapsed read timeout must surface as `WouldBlock` or `TimedOut`.
pub trait DatagramSource {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl DatagramSink for UdpSocket {
    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        UdpSocket::send(self, buf)
    }
}

impl DatagramSource for UdpSocket {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let (packet_size, peer_addr) = self.recv_from(buf)?;
        log::trace!("received {} bytes from {}", packet_size, peer_addr);
        Ok(packet_size)
    }
}

pub(crate) fn is_timeout(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut
}
