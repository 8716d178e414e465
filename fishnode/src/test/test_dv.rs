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

//! State machine tests for the distance-vector table and its coupling to
//! the forwarding table.

use crate::dv::{DvState, DvTable, FwdTable, MAX_ADV_IN_PACKET};
use crate::forwarding::RouteType;
use crate::types::{FishAddr, MAX_TTL};
use crate::wire::DvRecord;
use maplit::hashmap;
use std::collections::HashMap;

const LOCAL: FishAddr = FishAddr(0x0a00_0001);
const B: FishAddr = FishAddr(0x0a00_0002);
const C: FishAddr = FishAddr(0x0a00_0003);
const D: FishAddr = FishAddr(0x0a00_0007);

fn adv(dv: &mut DvTable, fw: &mut FwdTable, from: FishAddr, dest: FishAddr, metric: u32) {
    let rec = DvRecord { dest, netmask: FishAddr::BROADCAST, metric };
    dv.process_advertisement(from, &[rec], fw, LOCAL).unwrap();
}

fn age(dv: &mut DvTable, fw: &mut FwdTable, ticks: u32) {
    for _ in 0..ticks {
        dv.age_tick(fw).unwrap();
    }
}

#[test]
fn test_learn_installs_route() {
    let mut dv = DvTable::new();
    let mut fw = FwdTable::new();
    adv(&mut dv, &mut fw, B, D, 2);

    let entry = dv.lookup(D, B).unwrap();
    assert_eq!(entry.state, DvState::Active);
    assert_eq!(entry.metric, 3);
    assert_eq!(entry.ttl, 180);
    let fw_entry = fw.get(entry.fw_key.unwrap()).unwrap();
    assert_eq!(fw_entry.metric, 2);
    assert_eq!(fw_entry.prefix_len, 32);
    assert_eq!(fw_entry.next_hop, B);
    assert_eq!(fw_entry.route_type, RouteType::Dv);
    assert_eq!(fw.longest_prefix_match(D), B);
}

#[test]
fn test_route_to_self_never_recorded() {
    let mut dv = DvTable::new();
    let mut fw = FwdTable::new();
    adv(&mut dv, &mut fw, B, LOCAL, 2);
    assert!(dv.is_empty());
    assert!(fw.is_empty());
}

#[test]
fn test_unknown_withdrawn_route_is_noop() {
    let mut dv = DvTable::new();
    let mut fw = FwdTable::new();
    adv(&mut dv, &mut fw, B, D, MAX_TTL);
    assert!(dv.is_empty());
    assert!(fw.is_empty());
}

#[test]
fn test_same_metric_refreshes_ttl() {
    let mut dv = DvTable::new();
    let mut fw = FwdTable::new();
    adv(&mut dv, &mut fw, B, D, 2);
    age(&mut dv, &mut fw, 10);
    assert_eq!(dv.lookup(D, B).unwrap().ttl, 170);
    adv(&mut dv, &mut fw, B, D, 2);
    assert_eq!(dv.lookup(D, B).unwrap().ttl, 180);
    assert_eq!(dv.len(), 1);
}

#[test]
fn test_metric_update_propagates_to_forwarding() {
    let mut dv = DvTable::new();
    let mut fw = FwdTable::new();
    adv(&mut dv, &mut fw, B, D, 2);
    adv(&mut dv, &mut fw, B, D, 4);

    let entry = dv.lookup(D, B).unwrap();
    assert_eq!(entry.metric, 5);
    assert_eq!(entry.state, DvState::Active);
    assert_eq!(fw.get(entry.fw_key.unwrap()).unwrap().metric, 4);
    assert_eq!(dv.len(), 1);
}

#[test]
fn test_second_next_hop_becomes_backup() {
    let mut dv = DvTable::new();
    let mut fw = FwdTable::new();
    adv(&mut dv, &mut fw, B, D, 2);
    adv(&mut dv, &mut fw, C, D, 4);

    let backup = dv.lookup(D, C).unwrap();
    assert_eq!(backup.state, DvState::Backup);
    assert_eq!(backup.metric, 5);
    assert!(backup.fw_key.is_none());
    assert_eq!(dv.active_route(D).unwrap().next_hop, B);
    assert_eq!(fw.len(), 1);
    assert_eq!(fw.longest_prefix_match(D), B);
}

#[test]
fn test_poison_promotes_backup() {
    let mut dv = DvTable::new();
    let mut fw = FwdTable::new();
    adv(&mut dv, &mut fw, B, D, 2);
    adv(&mut dv, &mut fw, C, D, 4);

    // B poisons its route; the backup through C takes over
    adv(&mut dv, &mut fw, B, D, MAX_TTL);

    let old = dv.lookup(D, B).unwrap();
    assert_eq!(old.state, DvState::Withdrawn);
    assert_eq!(old.metric, MAX_TTL);
    assert!(old.fw_key.is_none());

    let promoted = dv.active_route(D).unwrap();
    assert_eq!(promoted.next_hop, C);
    assert_eq!(promoted.metric, 5);
    assert_eq!(fw.get(promoted.fw_key.unwrap()).unwrap().metric, 4);
    assert_eq!(fw.len(), 1);
    assert_eq!(fw.longest_prefix_match(D), C);
}

#[test]
fn test_poison_without_backup_drops_route() {
    let mut dv = DvTable::new();
    let mut fw = FwdTable::new();
    adv(&mut dv, &mut fw, B, D, 2);
    adv(&mut dv, &mut fw, B, D, MAX_TTL);
    assert!(dv.is_empty());
    assert!(fw.is_empty());
    assert_eq!(fw.longest_prefix_match(D), FishAddr::ZERO);
}

#[test]
fn test_stale_route_ages_out_completely() {
    let mut dv = DvTable::new();
    let mut fw = FwdTable::new();
    adv(&mut dv, &mut fw, B, D, 2);
    age(&mut dv, &mut fw, 179);
    assert_eq!(dv.lookup(D, B).unwrap().ttl, 1);
    age(&mut dv, &mut fw, 1);
    // no backup existed, so the route disappears with its forwarding entry
    assert!(dv.is_empty());
    assert!(fw.is_empty());
}

#[test]
fn test_ageing_promotes_backup_and_route_recovers() {
    let mut dv = DvTable::new();
    let mut fw = FwdTable::new();
    adv(&mut dv, &mut fw, B, D, 2);
    adv(&mut dv, &mut fw, C, D, 4);

    // keep the backup alive while the active route goes stale
    age(&mut dv, &mut fw, 90);
    adv(&mut dv, &mut fw, C, D, 4);
    age(&mut dv, &mut fw, 90);

    let old = dv.lookup(D, B).unwrap();
    assert_eq!(old.state, DvState::Withdrawn);
    assert_eq!(old.metric, MAX_TTL);
    assert_eq!(old.ttl, 180);
    let promoted = dv.active_route(D).unwrap();
    assert_eq!(promoted.next_hop, C);
    assert_eq!(promoted.metric, 5);
    assert_eq!(fw.get(promoted.fw_key.unwrap()).unwrap().metric, 4);
    assert_eq!(fw.longest_prefix_match(D), C);

    // the promoted route goes stale as well; nothing is left to promote
    age(&mut dv, &mut fw, 90);
    assert!(dv.active_route(D).is_none());
    assert_eq!(fw.longest_prefix_match(D), FishAddr::ZERO);
    assert!(fw.is_empty());
    assert_eq!(dv.lookup(D, B).unwrap().state, DvState::Withdrawn);
    assert!(dv.lookup(D, C).is_none());

    // a fresh advertisement classifies as backup (the withdrawn sibling
    // still knows the destination) but must take over immediately
    adv(&mut dv, &mut fw, C, D, 4);
    let revived = dv.active_route(D).unwrap();
    assert_eq!(revived.next_hop, C);
    assert_eq!(revived.metric, 5);
    assert_eq!(fw.longest_prefix_match(D), C);

    // the withdrawn route coming back while another is active stays aside
    adv(&mut dv, &mut fw, B, D, 2);
    let returned = dv.lookup(D, B).unwrap();
    assert_eq!(returned.state, DvState::Backup);
    assert_eq!(returned.metric, 3);
    assert!(returned.fw_key.is_none());
    assert_eq!(dv.active_route(D).unwrap().next_hop, C);
}

#[test]
fn test_neighbor_route_lifecycle() {
    let mut dv = DvTable::new();
    let mut fw = FwdTable::new();
    dv.learn_neighbor(B, &mut fw).unwrap();

    let entry = dv.lookup(B, B).unwrap();
    assert_eq!(entry.state, DvState::Active);
    assert_eq!(entry.metric, 1);
    let fw_entry = fw.get(entry.fw_key.unwrap()).unwrap();
    assert_eq!(fw_entry.metric, 1);
    assert_eq!(fw_entry.route_type, RouteType::Neighbor);
    assert_eq!(fw.longest_prefix_match(B), B);

    // refreshing does not duplicate anything
    age(&mut dv, &mut fw, 10);
    dv.learn_neighbor(B, &mut fw).unwrap();
    assert_eq!(dv.len(), 1);
    assert_eq!(fw.len(), 1);
    assert_eq!(dv.lookup(B, B).unwrap().ttl, 180);

    // a two-hop alternative to the neighbor is kept as backup
    adv(&mut dv, &mut fw, C, B, 3);
    assert_eq!(dv.lookup(B, C).unwrap().state, DvState::Backup);

    // the neighbor dies; the alternative takes over
    age(&mut dv, &mut fw, 90);
    adv(&mut dv, &mut fw, C, B, 3);
    age(&mut dv, &mut fw, 90);
    let promoted = dv.active_route(B).unwrap();
    assert_eq!(promoted.next_hop, C);
    assert_eq!(promoted.metric, 4);
    assert_eq!(fw.longest_prefix_match(B), C);
    assert_eq!(fw.get(promoted.fw_key.unwrap()).unwrap().route_type, RouteType::Dv);

    // the neighbor comes back within the withdrawn grace period
    dv.learn_neighbor(B, &mut fw).unwrap();
    let revived = dv.lookup(B, B).unwrap();
    assert_eq!(revived.state, DvState::Active);
    assert_eq!(revived.metric, 1);
    let fw_entry = fw.get(revived.fw_key.unwrap()).unwrap();
    assert_eq!(fw_entry.route_type, RouteType::Neighbor);
    assert_eq!(fw_entry.metric, 1);
    assert_eq!(dv.lookup(B, C).unwrap().state, DvState::Backup);
    assert_eq!(fw.len(), 1);
    assert_eq!(fw.longest_prefix_match(B), B);
}

#[test]
fn test_split_horizon_with_poison_reverse() {
    let mut dv = DvTable::new();
    let mut fw = FwdTable::new();
    dv.learn_neighbor(B, &mut fw).unwrap();
    dv.learn_neighbor(C, &mut fw).unwrap();
    adv(&mut dv, &mut fw, B, D, 2);

    let to_b = dv.build_advertisements(B);
    assert_eq!(to_b.len(), 1);
    let metrics: HashMap<FishAddr, u32> =
        to_b[0].iter().map(|r| (r.dest, r.metric)).collect();
    // everything learned from B goes back to B as unreachable
    assert_eq!(metrics, hashmap! { B => MAX_TTL, C => 1, D => MAX_TTL });

    let to_c = dv.build_advertisements(C);
    let metrics: HashMap<FishAddr, u32> =
        to_c[0].iter().map(|r| (r.dest, r.metric)).collect();
    assert_eq!(metrics, hashmap! { B => 1, C => MAX_TTL, D => 3 });
    assert!(to_c[0].iter().all(|r| r.netmask == FishAddr::BROADCAST));
}

#[test]
fn test_advertisements_are_chunked() {
    let mut dv = DvTable::new();
    let mut fw = FwdTable::new();
    for i in 0..40u32 {
        adv(&mut dv, &mut fw, B, FishAddr(0x0b00_0000 + i), 2);
    }
    let packets = dv.build_advertisements(C);
    assert_eq!(packets.len(), 2);
    assert_eq!(packets[0].len(), MAX_ADV_IN_PACKET);
    assert_eq!(packets[1].len(), 40 - MAX_ADV_IN_PACKET);
    assert!(packets.iter().flatten().all(|r| r.metric == 3));
}

#[test]
fn test_no_advertisement_without_active_routes() {
    let dv = DvTable::new();
    assert!(dv.build_advertisements(B).is_empty());
}
