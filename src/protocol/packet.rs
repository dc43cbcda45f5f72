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

//! the fixed-size datagram exchanged between sender and receiver
//!
//! every packet is exactly `PACKET_SIZE` bytes: a 16-byte header made of the
//! sequence number and the send timestamp, followed by filler. both fields are
//! written in the host's native byte order; peers are assumed to share it.

use crate::error::{Error, Result};

/// total on-wire size of every packet, kept under a typical path MTU
pub const PACKET_SIZE: usize = 1400;

/// sequence number plus send timestamp, eight bytes each
pub const HEADER_SIZE: usize = 16;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PacketHeader {
    /// flow-scoped, starts at 1 and grows by exactly 1 per emitted packet
    pub sequence_number: u64,
    /// sender clock at transmit time, in nanoseconds
    pub send_timestamp_ns: u64,
}

impl PacketHeader {
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::Decode {
                len: buf.len(),
                required: HEADER_SIZE,
            });
        }
        self.write(buf);
        Ok(())
    }

    fn write(&self, buf: &mut [u8]) {
        buf[0..8].copy_from_slice(&self.sequence_number.to_ne_bytes());
        buf[8..16].copy_from_slice(&self.send_timestamp_ns.to_ne_bytes());
    }

    /// parses the header from the front of a received datagram
    ///
    /// anything shorter than the header is not a flow packet and is rejected;
    /// trailing bytes are not inspected.
    pub fn decode(datagram: &[u8]) -> Result<PacketHeader> {
        if datagram.len() < HEADER_SIZE {
            return Err(Error::Decode {
                len: datagram.len(),
                required: HEADER_SIZE,
            });
        }
        let mut sequence_number = [0_u8; 8];
        sequence_number.copy_from_slice(&datagram[0..8]);
        let mut send_timestamp_ns = [0_u8; 8];
        send_timestamp_ns.copy_from_slice(&datagram[8..16]);
        Ok(PacketHeader {
            sequence_number: u64::from_ne_bytes(sequence_number),
            send_timestamp_ns: u64::from_ne_bytes(send_timestamp_ns),
        })
    }
}

/// a reusable outbound packet; the filler is written once and only the
/// header is restamped per send
pub struct Packet {
    buf: Box<[u8; PACKET_SIZE]>,
}

impl Default for Packet {
    fn default() -> Self {
        Packet::new()
    }
}

impl Packet {
    pub fn new() -> Packet {
        let mut buf = Box::new([0_u8; PACKET_SIZE]);
        for (i, b) in buf.iter_mut().enumerate().skip(HEADER_SIZE) {
            //fill the payload with a fixed sequence
            *b = (i % 256) as u8;
        }
        Packet { buf }
    }

    pub fn stamp(&mut self, header: &PacketHeader) -> &[u8] {
        header.write(&mut self.buf[..]);
        &self.buf[..]
    }

    pub fn header(&self) -> Result<PacketHeader> {
        PacketHeader::decode(&self.buf[..])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..]
    }
}
