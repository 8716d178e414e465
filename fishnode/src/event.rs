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

//! Actions a node hands back to its environment, and the timer taxonomy.
//!
//! The node never calls into its environment directly. Every entry point
//! takes an [`Outbox`] and pushes the side effects it wants performed;
//! whatever owns the node (the simulated fishnet, a test, an embedding)
//! drains the queue. Within one entry point the node's state transitions
//! are atomic: nothing is delivered or rescheduled until the call returns.

use crate::types::FishAddr;
use std::collections::VecDeque;

/// The five periodic tasks of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Broadcast a neighbor probe.
    NeighborProbe,
    /// Broadcast a blank DV advertisement (keepalive).
    DvBlank,
    /// Unicast a full DV advertisement to every neighbor.
    DvFull,
    /// Decrement the neighbor table ttls.
    NeighborAge,
    /// Decrement the DV table ttls.
    DvAge,
}

impl TimerKind {
    /// All timers, in the order they are armed at start-up.
    pub const ALL: [TimerKind; 5] = [
        TimerKind::NeighborProbe,
        TimerKind::DvBlank,
        TimerKind::DvFull,
        TimerKind::NeighborAge,
        TimerKind::DvAge,
    ];

    /// Interval between two firings, in milliseconds.
    pub fn period_ms(self) -> u64 {
        match self {
            TimerKind::NeighborProbe | TimerKind::DvBlank | TimerKind::DvFull => 30_000,
            TimerKind::NeighborAge | TimerKind::DvAge => 1_000,
        }
    }
}

/// One side effect requested by the node.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Hand a finished frame to the Layer-2 transport. Ownership of the
    /// buffer passes with the action.
    L2Send {
        /// The complete frame, Layer-3 header included.
        frame: Vec<u8>,
        /// One-hop target; the broadcast address reaches every neighbor.
        next_hop: FishAddr,
    },
    /// Deliver a decapsulated payload to Layer 4.
    L4Deliver {
        /// Payload with the Layer-3 header stripped.
        payload: Vec<u8>,
        /// Protocol number from the header.
        proto: u8,
        /// Originating node.
        src: FishAddr,
    },
    /// Arm a one-shot timer; timer tasks re-arm themselves at their tail.
    Schedule {
        /// Delay until the timer fires, in milliseconds.
        delay_ms: u64,
        /// Which task to run.
        kind: TimerKind,
    },
}

/// Queue of actions produced by one node entry point.
pub type Outbox = VecDeque<Action>;
