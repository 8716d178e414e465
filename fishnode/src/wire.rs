// Fishnode: a distance-vector routed Layer-3 node for fishnet
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! On-wire message formats. Every multi-byte field is big-endian; all
//! in-memory values are host order. Byte order is converted here, at the
//! buffer boundary, and nowhere else.

use crate::types::{FishAddr, WireError};

/// Size of the packed Layer-3 header.
pub const L3_HEADER_LENGTH: usize = 14;
/// Size of a neighbor protocol payload.
pub const NEIGH_LENGTH: usize = 2;
/// Size of an FCMP payload.
pub const FCMP_LENGTH: usize = 8;
/// Size of one record in a DV advertisement payload.
pub const DV_RECORD_LENGTH: usize = 12;

const NEIGH_REQUEST: u16 = 1;
const NEIGH_RESPONSE: u16 = 2;

fn be32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

/// The Layer-3 packet header.
///
/// Wire layout: `ttl:u8, proto:u8, id:u32, src:u32, dest:u32`, packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L3Header {
    /// Remaining hop budget.
    pub ttl: u8,
    /// Protocol number of the payload.
    pub proto: u8,
    /// Per-sender packet id.
    pub id: u32,
    /// Originating node.
    pub src: FishAddr,
    /// Final destination.
    pub dest: FishAddr,
}

impl L3Header {
    /// Decode the leading header of `frame`.
    pub fn parse(frame: &[u8]) -> Result<L3Header, WireError> {
        if frame.len() < L3_HEADER_LENGTH {
            return Err(WireError::Truncated { need: L3_HEADER_LENGTH, got: frame.len() });
        }
        Ok(L3Header {
            ttl: frame[0],
            proto: frame[1],
            id: be32(&frame[2..6]),
            src: FishAddr(be32(&frame[6..10])),
            dest: FishAddr(be32(&frame[10..14])),
        })
    }

    /// Encode into the first [`L3_HEADER_LENGTH`] bytes of `frame`, which
    /// must be large enough.
    pub fn write(&self, frame: &mut [u8]) {
        frame[0] = self.ttl;
        frame[1] = self.proto;
        frame[2..6].copy_from_slice(&self.id.to_be_bytes());
        frame[6..10].copy_from_slice(&self.src.raw().to_be_bytes());
        frame[10..14].copy_from_slice(&self.dest.raw().to_be_bytes());
    }
}

/// A neighbor protocol message, carried as a single big-endian `u16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborMessage {
    /// Broadcast probe asking all neighbors to identify themselves.
    Request,
    /// Unicast answer to a probe.
    Response,
}

impl NeighborMessage {
    /// Encode as a 2-byte payload.
    pub fn encode(self) -> [u8; NEIGH_LENGTH] {
        let raw = match self {
            NeighborMessage::Request => NEIGH_REQUEST,
            NeighborMessage::Response => NEIGH_RESPONSE,
        };
        raw.to_be_bytes()
    }

    /// Decode a neighbor payload.
    pub fn decode(payload: &[u8]) -> Result<NeighborMessage, WireError> {
        if payload.len() < NEIGH_LENGTH {
            return Err(WireError::Truncated { need: NEIGH_LENGTH, got: payload.len() });
        }
        match u16::from_be_bytes([payload[0], payload[1]]) {
            NEIGH_REQUEST => Ok(NeighborMessage::Request),
            NEIGH_RESPONSE => Ok(NeighborMessage::Response),
            other => Err(WireError::UnknownNeighborType(other)),
        }
    }
}

/// One record of a DV advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DvRecord {
    /// The advertised destination.
    pub dest: FishAddr,
    /// Netmask selecting the advertised prefix. The all-ones mask means a
    /// host route.
    pub netmask: FishAddr,
    /// Advertised metric. The unreachable sentinel poisons the route.
    pub metric: u32,
}

/// Encode a DV payload: `num_adv` followed by the records. An empty record
/// list yields the 2-byte blank advertisement.
pub fn encode_dv_advertisement(records: &[DvRecord]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(2 + records.len() * DV_RECORD_LENGTH);
    buf.extend_from_slice(&(records.len() as u16).to_be_bytes());
    for rec in records {
        buf.extend_from_slice(&rec.dest.raw().to_be_bytes());
        buf.extend_from_slice(&rec.netmask.raw().to_be_bytes());
        buf.extend_from_slice(&rec.metric.to_be_bytes());
    }
    buf
}

/// Decode a DV payload. Bytes beyond the advertised record count are
/// ignored.
pub fn decode_dv_advertisement(payload: &[u8]) -> Result<Vec<DvRecord>, WireError> {
    if payload.len() < 2 {
        return Err(WireError::Truncated { need: 2, got: payload.len() });
    }
    let num = u16::from_be_bytes([payload[0], payload[1]]) as usize;
    let need = 2 + num * DV_RECORD_LENGTH;
    if payload.len() < need {
        return Err(WireError::Truncated { need, got: payload.len() });
    }
    let mut records = Vec::with_capacity(num);
    for i in 0..num {
        let off = 2 + i * DV_RECORD_LENGTH;
        records.push(DvRecord {
            dest: FishAddr(be32(&payload[off..off + 4])),
            netmask: FishAddr(be32(&payload[off + 4..off + 8])),
            metric: be32(&payload[off + 8..off + 12]),
        });
    }
    Ok(records)
}

/// An FCMP error report payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FcmpMessage {
    /// The error code.
    pub error: u32,
    /// Packet id of the frame the report is about.
    pub seq_num: u32,
}

impl FcmpMessage {
    /// Encode as an 8-byte payload.
    pub fn encode(&self) -> [u8; FCMP_LENGTH] {
        let mut buf = [0u8; FCMP_LENGTH];
        buf[0..4].copy_from_slice(&self.error.to_be_bytes());
        buf[4..8].copy_from_slice(&self.seq_num.to_be_bytes());
        buf
    }

    /// Decode an FCMP payload.
    pub fn decode(payload: &[u8]) -> Result<FcmpMessage, WireError> {
        if payload.len() < FCMP_LENGTH {
            return Err(WireError::Truncated { need: FCMP_LENGTH, got: payload.len() });
        }
        Ok(FcmpMessage { error: be32(&payload[0..4]), seq_num: be32(&payload[4..8]) })
    }
}
