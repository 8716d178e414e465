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

#![deny(missing_docs)]

//! # Fishnode
//!
//! A Layer-3 node for fishnet, a simulated packet-switched network. Each
//! node has a 32-bit address, exchanges frames with one-hop neighbors, and
//! together the nodes form a multi-hop routed network.
//!
//! The node implements the core Layer-3 responsibilities itself:
//!
//! - **[`wire`]**: the packet codec for L3 headers, neighbor messages, DV
//!   advertisements and FCMP error reports (big-endian on the wire, host
//!   order in memory);
//! - **[`forwarding`]**: the growable forwarding table with
//!   longest-prefix-match lookup;
//! - **[`seen`]**: the bounded duplicate-suppression set for broadcast
//!   floods;
//! - **[`neighbor`]**: the probe/response protocol that maintains the set
//!   of one-hop reachable nodes;
//! - **[`dv`]**: distance-vector routing with active, backup and withdrawn
//!   routes, ageing, and split-horizon/poison-reverse advertising;
//! - **[`node`]**: the send/receive/forward engine tying the state
//!   machines together, [`Fishnode`];
//! - **[`event`]**: the action queue through which a node talks to its
//!   environment, and the periodic task taxonomy;
//! - **[`fishnet`]**: a simulated fishnet ([`Fishnet`]) providing links,
//!   frame propagation and the timed event loop;
//! - **[`printer`]**: formatted views of a node's tables.
//!
//! Everything runs single-threaded: a node mutates its state only inside
//! an entry point, and hands requested side effects back through an
//! outbox.
//!
//! ## Example
//!
//! ```rust
//! use fishnode::types::FishAddr;
//! use fishnode::Fishnet;
//!
//! let a = FishAddr(0x0a00_0001);
//! let b = FishAddr(0x0a00_0002);
//!
//! let mut net = Fishnet::new();
//! net.add_node(a);
//! net.add_node(b);
//! net.add_link(a, b);
//!
//! net.start();
//! net.run_for(60_000);
//!
//! // the probe/response exchange has discovered the neighbor and set up
//! // a one-hop route for it
//! assert!(net.node(a).neighbors().contains(b));
//! assert_eq!(net.node(a).forwarding().longest_prefix_match(b), b);
//! ```

pub mod dv;
pub mod event;
pub mod fishnet;
pub mod forwarding;
pub mod neighbor;
pub mod node;
pub mod printer;
pub mod seen;
pub mod types;
pub mod wire;

mod test;

pub use fishnet::Fishnet;
pub use node::Fishnode;
pub use types::{FishAddr, NodeError};
