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

//! A simulated fishnet: the topology, link-delayed frame propagation, and
//! the timed event loop that drives the nodes' timers.
//!
//! The simulation is single-threaded and deterministic. Events fire no
//! earlier than their deadline; events due at the same instant run in the
//! order they were scheduled.

use crate::event::{Action, Outbox, TimerKind};
use crate::node::Fishnode;
use crate::types::FishAddr;
use log::*;
use petgraph::graph::{NodeIndex, UnGraph};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

/// Propagation delay of one link, in simulated milliseconds.
pub const LINK_DELAY_MS: u64 = 10;

/// A payload that reached Layer 4 on some node.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// The decapsulated payload.
    pub payload: Vec<u8>,
    /// Protocol number from the Layer-3 header.
    pub proto: u8,
    /// Originating node.
    pub src: FishAddr,
}

#[derive(Debug, Clone)]
enum SimEvent {
    Frame { node: FishAddr, frame: Vec<u8> },
    Timer { node: FishAddr, kind: TimerKind },
}

#[derive(Debug)]
struct Scheduled {
    at: u64,
    seq: u64,
    event: SimEvent,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq))
    }
}

/// The simulated network: nodes, links, and the event queue.
#[derive(Debug)]
pub struct Fishnet {
    topology: UnGraph<FishAddr, ()>,
    indices: HashMap<FishAddr, NodeIndex>,
    nodes: HashMap<FishAddr, Fishnode>,
    queue: BinaryHeap<Reverse<Scheduled>>,
    deliveries: HashMap<FishAddr, Vec<Delivery>>,
    now: u64,
    seq: u64,
}

impl Default for Fishnet {
    fn default() -> Self {
        Self::new()
    }
}

impl Fishnet {
    /// An empty network at time zero.
    pub fn new() -> Self {
        Self {
            topology: UnGraph::new_undirected(),
            indices: HashMap::new(),
            nodes: HashMap::new(),
            queue: BinaryHeap::new(),
            deliveries: HashMap::new(),
            now: 0,
            seq: 0,
        }
    }

    /// Add a node with the given address to the network.
    pub fn add_node(&mut self, addr: FishAddr) {
        let index = self.topology.add_node(addr);
        self.indices.insert(addr, index);
        self.nodes.insert(addr, Fishnode::new(addr));
    }

    /// Connect two nodes with a bidirectional link.
    pub fn add_link(&mut self, a: FishAddr, b: FishAddr) {
        let (ia, ib) = (self.indices[&a], self.indices[&b]);
        self.topology.add_edge(ia, ib, ());
    }

    /// Take the link between two nodes down, if it exists.
    pub fn remove_link(&mut self, a: FishAddr, b: FishAddr) {
        let (ia, ib) = (self.indices[&a], self.indices[&b]);
        if let Some(edge) = self.topology.find_edge(ia, ib) {
            self.topology.remove_edge(edge);
        }
    }

    /// Start every node: each runs its periodic tasks once and arms its
    /// timers. Nodes start in address order.
    pub fn start(&mut self) {
        let mut addrs: Vec<FishAddr> = self.nodes.keys().copied().collect();
        addrs.sort();
        for addr in addrs {
            let mut out = Outbox::new();
            if let Err(e) = self.nodes.get_mut(&addr).unwrap().start(&mut out) {
                warn!("node {} failed to start: {}", addr, e);
            }
            self.drain(addr, out);
        }
    }

    /// Current simulated time in milliseconds.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Advance the clock by `ms`, dispatching everything that comes due.
    pub fn run_for(&mut self, ms: u64) {
        let deadline = self.now + ms;
        self.run_until(deadline);
    }

    /// Dispatch all events scheduled up to and including `deadline`, then
    /// set the clock to it.
    pub fn run_until(&mut self, deadline: u64) {
        loop {
            match self.queue.peek() {
                Some(Reverse(next)) if next.at <= deadline => {}
                _ => break,
            }
            let Reverse(scheduled) = self.queue.pop().unwrap();
            self.now = scheduled.at;
            self.dispatch(scheduled.event);
        }
        if deadline > self.now {
            self.now = deadline;
        }
    }

    /// Inject an application send on `from`. Returns the packet id.
    pub fn send(&mut self, from: FishAddr, payload: &[u8], dest: FishAddr, proto: u8, ttl: u8) -> u32 {
        let mut out = Outbox::new();
        let id = self
            .nodes
            .get_mut(&from)
            .unwrap()
            .l3_send(payload, dest, proto, ttl, &mut out)
            .unwrap();
        self.drain(from, out);
        id
    }

    /// The node at `addr`.
    pub fn node(&self, addr: FishAddr) -> &Fishnode {
        &self.nodes[&addr]
    }

    /// Everything delivered to Layer 4 on `addr` so far.
    pub fn deliveries(&self, addr: FishAddr) -> &[Delivery] {
        self.deliveries.get(&addr).map(|v| v.as_slice()).unwrap_or(&[])
    }

    // -----------------
    // Private functions
    // -----------------

    fn dispatch(&mut self, event: SimEvent) {
        match event {
            SimEvent::Frame { node, frame } => {
                let mut out = Outbox::new();
                match self.nodes.get_mut(&node) {
                    Some(n) => {
                        if let Err(e) = n.l3_receive(&frame, &mut out) {
                            warn!("node {} dropped a frame: {}", node, e);
                        }
                    }
                    None => return,
                }
                self.drain(node, out);
            }
            SimEvent::Timer { node, kind } => {
                let mut out = Outbox::new();
                match self.nodes.get_mut(&node) {
                    Some(n) => {
                        if let Err(e) = n.handle_timer(kind, &mut out) {
                            warn!("node {} timer task failed: {}", node, e);
                        }
                    }
                    None => return,
                }
                self.drain(node, out);
            }
        }
    }

    fn drain(&mut self, from: FishAddr, mut out: Outbox) {
        while let Some(action) = out.pop_front() {
            match action {
                Action::L2Send { frame, next_hop } => self.transmit(from, frame, next_hop),
                Action::L4Deliver { payload, proto, src } => {
                    self.deliveries.entry(from).or_default().push(Delivery { payload, proto, src });
                }
                Action::Schedule { delay_ms, kind } => {
                    let at = self.now + delay_ms;
                    self.push(at, SimEvent::Timer { node: from, kind });
                }
            }
        }
    }

    fn transmit(&mut self, from: FishAddr, frame: Vec<u8>, next_hop: FishAddr) {
        let at = self.now + LINK_DELAY_MS;
        let ifrom = self.indices[&from];
        if next_hop.is_broadcast() {
            let targets: Vec<FishAddr> =
                self.topology.neighbors(ifrom).map(|i| self.topology[i]).collect();
            for target in targets {
                self.push(at, SimEvent::Frame { node: target, frame: frame.clone() });
            }
        } else {
            match self.indices.get(&next_hop) {
                Some(&ito) if self.topology.find_edge(ifrom, ito).is_some() => {
                    self.push(at, SimEvent::Frame { node: next_hop, frame });
                }
                _ => warn!("{} has no link to {}, frame lost", from, next_hop),
            }
        }
    }

    fn push(&mut self, at: u64, event: SimEvent) {
        let seq = self.seq;
        self.seq += 1;
        self.queue.push(Reverse(Scheduled { at, seq, event }));
    }
}
