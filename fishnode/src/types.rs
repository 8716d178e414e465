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

//! Module containing all shared type definitions: addresses, protocol
//! numbers, and the error types of the crate.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use thiserror::Error;

/// Hop budget of a freshly sent packet, and the metric sentinel marking a
/// route as unreachable.
pub const MAX_TTL: u32 = 255;

/// Echo payloads.
pub const PROTO_ECHO: u8 = 2;
/// Neighbor probe and response messages.
pub const PROTO_NEIGH: u8 = 3;
/// Name resolution.
pub const PROTO_NAME: u8 = 4;
/// Distance-vector advertisements.
pub const PROTO_DV: u8 = 7;
/// Fishnet control message protocol (error reports).
pub const PROTO_FCMP: u8 = 8;
/// Address resolution.
pub const PROTO_ARP: u8 = 9;

/// A 32-bit fishnet address (simple representation, host order in memory).
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy)]
pub struct FishAddr(pub u32);

impl FishAddr {
    /// The zero address. Returned by a longest-prefix-match lookup when no
    /// route matches; never a valid node address.
    pub const ZERO: FishAddr = FishAddr(0);
    /// The all-neighbors address. Packets sent here are flooded.
    pub const BROADCAST: FishAddr = FishAddr(0xffff_ffff);

    /// The raw 32-bit value, host order.
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Returns true for the zero address.
    pub fn is_zero(self) -> bool {
        self == Self::ZERO
    }

    /// Returns true for the all-neighbors address.
    pub fn is_broadcast(self) -> bool {
        self == Self::BROADCAST
    }
}

impl fmt::Display for FishAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0.to_be_bytes();
        write!(f, "{}.{}.{}.{}", b[0], b[1], b[2], b[3])
    }
}

impl FromStr for FishAddr {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 4];
        let mut parts = s.split('.');
        for octet in octets.iter_mut() {
            *octet = parts.next().ok_or(AddrParseError::BadShape)?.parse()?;
        }
        if parts.next().is_some() {
            return Err(AddrParseError::BadShape);
        }
        Ok(FishAddr(u32::from_be_bytes(octets)))
    }
}

/// Error parsing a dotted-quad fishnet address.
#[derive(Error, Debug, PartialEq)]
pub enum AddrParseError {
    /// The string did not consist of four dot-separated parts.
    #[error("expected four dot-separated octets")]
    BadShape,
    /// One of the parts was not an 8-bit number.
    #[error("invalid octet: {0}")]
    BadOctet(#[from] ParseIntError),
}

/// FCMP error report codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FcmpCode {
    /// The packet's ttl reached zero before the destination.
    TtlExceeded = 1,
    /// No route matched the packet's destination.
    NetUnreachable = 2,
    /// The destination network is known, but the host is not.
    HostUnreachable = 3,
}

/// Malformed on-wire data.
#[derive(Error, Debug, PartialEq)]
pub enum WireError {
    /// The buffer ended before the advertised content.
    #[error("frame truncated: need {need} bytes, got {got}")]
    Truncated {
        /// Bytes required by the format.
        need: usize,
        /// Bytes actually present.
        got: usize,
    },
    /// A neighbor message carried a type other than request or response.
    #[error("unknown neighbor message type {0}")]
    UnknownNeighborType(u16),
}

/// Misuse of a table handle.
#[derive(Error, Debug, PartialEq)]
pub enum TableError {
    /// A handle referred to an entry that was removed, or whose slot has
    /// been reused since.
    #[error("stale forwarding table handle")]
    StaleRouteKey,
}

/// Any failure surfaced by a node entry point. Packet drops that the
/// protocol requires (unroutable, expired, duplicate) are not errors; this
/// type covers structural problems only.
#[derive(Error, Debug, PartialEq)]
pub enum NodeError {
    /// Malformed on-wire data.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),
    /// Cross-table bookkeeping failure.
    #[error("table error: {0}")]
    Table(#[from] TableError),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_addr_display_parse() {
        let addr = FishAddr(0x0a00_01ff);
        assert_eq!(addr.to_string(), "10.0.1.255");
        assert_eq!("10.0.1.255".parse::<FishAddr>(), Ok(addr));
        assert_eq!(
            "255.255.255.255".parse::<FishAddr>(),
            Ok(FishAddr::BROADCAST)
        );
        assert_eq!(
            "10.0.1".parse::<FishAddr>(),
            Err(AddrParseError::BadShape)
        );
        assert_eq!(
            "10.0.1.2.3".parse::<FishAddr>(),
            Err(AddrParseError::BadShape)
        );
        assert!("10.0.1.256".parse::<FishAddr>().is_err());
    }
}
