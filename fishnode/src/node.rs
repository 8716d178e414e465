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

//! The Layer-3 engine: send, forward and receive pipelines, control
//! traffic dispatch, FCMP generation, and the periodic tasks.

use crate::dv::{DvTable, FwdTable};
use crate::event::{Action, Outbox, TimerKind};
use crate::neighbor::NeighborTable;
use crate::seen::SeenIds;
use crate::types::{FcmpCode, FishAddr, NodeError, MAX_TTL, PROTO_DV, PROTO_FCMP, PROTO_NEIGH};
use crate::wire::{self, FcmpMessage, L3Header, NeighborMessage, L3_HEADER_LENGTH};
use log::*;

/// TTL of single-hop control traffic (neighbor and DV messages).
const CONTROL_TTL: u8 = 1;

/// A fishnode: one Layer-3 participant of a fishnet.
///
/// The node owns its four state tables (forwarding, neighbor, DV, seen
/// ids) and a packet id counter. It performs no I/O itself: every entry
/// point pushes the side effects it wants onto the given [`Outbox`].
#[derive(Debug)]
pub struct Fishnode {
    addr: FishAddr,
    forwarding: FwdTable,
    neighbors: NeighborTable,
    dv: DvTable,
    seen: SeenIds,
    next_id: u32,
}

impl Fishnode {
    /// A node with the given address and empty tables.
    pub fn new(addr: FishAddr) -> Self {
        Self {
            addr,
            forwarding: FwdTable::new(),
            neighbors: NeighborTable::new(),
            dv: DvTable::new(),
            seen: SeenIds::new(),
            next_id: 1,
        }
    }

    /// The node's own address.
    pub fn address(&self) -> FishAddr {
        self.addr
    }

    /// The forwarding table.
    pub fn forwarding(&self) -> &FwdTable {
        &self.forwarding
    }

    /// The distance-vector route table.
    pub fn dv(&self) -> &DvTable {
        &self.dv
    }

    /// The neighbor table.
    pub fn neighbors(&self) -> &NeighborTable {
        &self.neighbors
    }

    /// Run every periodic task once and arm its timer. The first neighbor
    /// probe and DV advertisements go out here.
    pub fn start(&mut self, out: &mut Outbox) -> Result<(), NodeError> {
        for &kind in TimerKind::ALL.iter() {
            self.handle_timer(kind, out)?;
        }
        Ok(())
    }

    /// Run one periodic task. The task re-arms itself at its tail.
    pub fn handle_timer(&mut self, kind: TimerKind, out: &mut Outbox) -> Result<(), NodeError> {
        match kind {
            TimerKind::NeighborProbe => {
                let probe = NeighborMessage::Request.encode();
                self.l3_send(&probe, FishAddr::BROADCAST, PROTO_NEIGH, CONTROL_TTL, out)?;
            }
            TimerKind::DvBlank => {
                let blank = wire::encode_dv_advertisement(&[]);
                self.l3_send(&blank, FishAddr::BROADCAST, PROTO_DV, CONTROL_TTL, out)?;
            }
            TimerKind::DvFull => self.send_full_advertisements(out)?,
            TimerKind::NeighborAge => {
                for n in self.neighbors.age_tick() {
                    debug!("neighbor {} timed out", n);
                }
            }
            TimerKind::DvAge => self.dv.age_tick(&mut self.forwarding)?,
        }
        out.push_back(Action::Schedule { delay_ms: kind.period_ms(), kind });
        Ok(())
    }

    /// Encapsulate an L4 payload and hand it to the forwarding pipeline.
    /// A requested ttl of zero is promoted to the full hop budget. Returns
    /// the packet id assigned to the frame.
    pub fn l3_send(
        &mut self,
        payload: &[u8],
        dest: FishAddr,
        proto: u8,
        ttl: u8,
        out: &mut Outbox,
    ) -> Result<u32, NodeError> {
        let ttl = if ttl == 0 { MAX_TTL as u8 } else { ttl };
        let id = self.next_packet_id();
        let header = L3Header { ttl, proto, id, src: self.addr, dest };
        let mut frame = vec![0u8; L3_HEADER_LENGTH + payload.len()];
        header.write(&mut frame);
        frame[L3_HEADER_LENGTH..].copy_from_slice(payload);
        self.seen.remember(self.addr, id);
        self.l3_forward(frame, out)?;
        Ok(id)
    }

    /// Forward a complete frame toward its destination: check the hop
    /// budget, resolve the next hop, and submit to Layer 2. Failures
    /// produce an FCMP report toward the frame's source and drop it.
    pub fn l3_forward(&mut self, frame: Vec<u8>, out: &mut Outbox) -> Result<(), NodeError> {
        let header = L3Header::parse(&frame)?;
        if header.ttl == 0 && header.dest != self.addr {
            debug!("ttl exceeded on the way to {}", header.dest);
            self.fcmp_response(&header, FcmpCode::TtlExceeded, out)?;
            return Ok(());
        }
        let next_hop = if header.dest.is_broadcast() {
            FishAddr::BROADCAST
        } else {
            self.forwarding.longest_prefix_match(header.dest)
        };
        if next_hop.is_zero() {
            debug!("no route to {}, dropping", header.dest);
            self.fcmp_response(&header, FcmpCode::NetUnreachable, out)?;
            return Ok(());
        }
        self.seen.remember(header.src, header.id);
        out.push_back(Action::L2Send { frame, next_hop });
        Ok(())
    }

    /// Classify a received frame.
    ///
    /// Frames for this node are decapsulated and delivered to Layer 4,
    /// with DV and neighbor payloads dispatched to their protocols first.
    /// Broadcast frames are additionally deduplicated and flooded onward.
    /// Everything else is transit: decrement the ttl and forward. The
    /// frame buffer is borrowed for the duration of the call.
    pub fn l3_receive(&mut self, frame: &[u8], out: &mut Outbox) -> Result<(), NodeError> {
        let header = L3Header::parse(frame)?;
        let payload = &frame[L3_HEADER_LENGTH..];
        if header.src.is_broadcast() {
            debug!("dropping frame with broadcast source");
            return Ok(());
        }
        if header.dest == self.addr {
            self.process_control(&header, payload, out)?;
            out.push_back(Action::L4Deliver {
                payload: payload.to_vec(),
                proto: header.proto,
                src: header.src,
            });
        } else if header.dest.is_broadcast() {
            if self.seen.has(header.src, header.id) {
                trace!("duplicate broadcast {} id {}", header.src, header.id);
                return Ok(());
            }
            // record before the flood re-submit so the packet can never be
            // reprocessed by this node
            self.seen.remember(header.src, header.id);
            self.process_control(&header, payload, out)?;
            out.push_back(Action::L4Deliver {
                payload: payload.to_vec(),
                proto: header.proto,
                src: header.src,
            });
            let mut copy = frame.to_vec();
            copy[0] = header.ttl.saturating_sub(1);
            self.l3_forward(copy, out)?;
        } else {
            let mut copy = frame.to_vec();
            copy[0] = header.ttl.saturating_sub(1);
            self.l3_forward(copy, out)?;
        }
        Ok(())
    }

    fn process_control(
        &mut self,
        header: &L3Header,
        payload: &[u8],
        out: &mut Outbox,
    ) -> Result<(), NodeError> {
        match header.proto {
            PROTO_DV => {
                let records = wire::decode_dv_advertisement(payload)?;
                self.dv
                    .process_advertisement(header.src, &records, &mut self.forwarding, self.addr)?;
            }
            PROTO_NEIGH => self.process_neighbor(header.src, payload, out)?,
            _ => {}
        }
        Ok(())
    }

    fn process_neighbor(
        &mut self,
        src: FishAddr,
        payload: &[u8],
        out: &mut Outbox,
    ) -> Result<(), NodeError> {
        let msg = NeighborMessage::decode(payload)?;
        // hearing either message type proves src is one hop away
        if self.neighbors.register(src) {
            info!("new neighbor {}", src);
        }
        self.dv.learn_neighbor(src, &mut self.forwarding)?;
        if let NeighborMessage::Request = msg {
            let reply = NeighborMessage::Response.encode();
            self.l3_send(&reply, src, PROTO_NEIGH, CONTROL_TTL, out)?;
        }
        Ok(())
    }

    fn send_full_advertisements(&mut self, out: &mut Outbox) -> Result<(), NodeError> {
        for n in self.neighbors.addrs() {
            for records in self.dv.build_advertisements(n) {
                let payload = wire::encode_dv_advertisement(&records);
                self.l3_send(&payload, n, PROTO_DV, CONTROL_TTL, out)?;
            }
        }
        Ok(())
    }

    /// Report a delivery failure back toward the frame's source. Reports
    /// about error reports are suppressed, as are reports toward sources
    /// that cannot be replied to. A locally originated failure is handed
    /// straight to Layer 4.
    fn fcmp_response(
        &mut self,
        header: &L3Header,
        code: FcmpCode,
        out: &mut Outbox,
    ) -> Result<(), NodeError> {
        if header.proto == PROTO_FCMP {
            trace!("not reporting a failed error report");
            return Ok(());
        }
        if header.src.is_broadcast() || header.src.is_zero() {
            return Ok(());
        }
        let report = FcmpMessage { error: code as u32, seq_num: header.id };
        if header.src == self.addr {
            out.push_back(Action::L4Deliver {
                payload: report.encode().to_vec(),
                proto: PROTO_FCMP,
                src: self.addr,
            });
        } else {
            self.l3_send(&report.encode(), header.src, PROTO_FCMP, MAX_TTL as u8, out)?;
        }
        Ok(())
    }

    fn next_packet_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }
}
