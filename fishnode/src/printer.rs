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

//! Helper (printer) functions formatting a node's tables for diagnostics.
//! Each function returns one header line followed by one line per valid
//! entry.

use crate::node::Fishnode;

/// Render the forwarding table. The first column is the route type tag
/// (C = connected, L = loopback, B = broadcast, N = neighbor, D =
/// distance-vector, Z = link-state), with `>` marking the best route.
pub fn forwarding_table(node: &Fishnode) -> String {
    let mut s = String::from(" T  Destination           Next Hop          Metric\n");
    for (_, entry) in node.forwarding().iter() {
        s.push_str(&format!(
            " {}{} {:<21} {:<17} {:>6}\n",
            entry.route_type.symbol(),
            if entry.best { '>' } else { ' ' },
            format!("{}/{}", entry.dest, entry.prefix_len),
            entry.next_hop.to_string(),
            entry.metric,
        ));
    }
    s
}

/// Render the distance-vector routing state. The first column is the
/// entry state (A = active, B = backup, W = withdrawn), with `>` marking
/// entries that are in the forwarding table.
pub fn dv_table(node: &Fishnode) -> String {
    let mut s = String::from(" S  Destination        Next Hop           Dist  TTL\n");
    for entry in node.dv().iter() {
        s.push_str(&format!(
            " {}{} {:<18} {:<18} {:>4} {:>4}\n",
            entry.state.symbol(),
            if entry.fw_key.is_some() { '>' } else { ' ' },
            entry.dest.to_string(),
            entry.next_hop.to_string(),
            entry.metric,
            entry.ttl,
        ));
    }
    s
}

/// Render the neighbor table.
pub fn neighbor_table(node: &Fishnode) -> String {
    let mut s = String::from(" Neighbor            TTL\n");
    for entry in node.neighbors().iter() {
        s.push_str(&format!(" {:<18} {:>4}\n", entry.addr.to_string(), entry.ttl));
    }
    s
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::event::Outbox;
    use crate::types::FishAddr;
    use crate::wire::{L3Header, NeighborMessage, L3_HEADER_LENGTH, NEIGH_LENGTH};

    #[test]
    fn test_tables_render_one_line_per_entry() {
        let a = FishAddr(0x0a00_0001);
        let b = FishAddr(0x0a00_0002);
        let mut node = Fishnode::new(a);
        let mut frame = vec![0u8; L3_HEADER_LENGTH + NEIGH_LENGTH];
        L3Header { ttl: 1, proto: crate::types::PROTO_NEIGH, id: 1, src: b, dest: a }
            .write(&mut frame);
        frame[L3_HEADER_LENGTH..].copy_from_slice(&NeighborMessage::Response.encode());
        node.l3_receive(&frame, &mut Outbox::new()).unwrap();

        let fwd = forwarding_table(&node);
        assert_eq!(fwd.lines().count(), 2);
        assert!(fwd.contains("N> 10.0.0.2/32"));
        let dv = dv_table(&node);
        assert_eq!(dv.lines().count(), 2);
        assert!(dv.contains("A> 10.0.0.2"));
        let neigh = neighbor_table(&node);
        assert_eq!(neigh.lines().count(), 2);
        assert!(neigh.contains("10.0.0.2"));
        assert!(neigh.contains("120"));
    }
}
