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

//! Distance-vector routing: the route table with Active/Backup/Withdrawn
//! states, advertisement processing, ageing, and the policy that keeps the
//! forwarding table consistent with it.
//!
//! Metric bookkeeping: a DV entry stores the hop-inclusive metric
//! `advertised + 1` (clamped to the unreachable sentinel). When a route is
//! installed, the forwarding table receives `metric - 2` and re-adds the
//! hop on insertion, so the installed metric is always one below the DV
//! metric for learned routes and exactly 1 for neighbor routes.
//!
//! Invariants upheld across every operation:
//!  - at most one Active entry per destination;
//!  - only Active entries hold a forwarding-table handle;
//!  - Withdrawn implies metric equals the unreachable sentinel;
//!  - ttl stays positive while an entry is valid.

use crate::forwarding::{ForwardingTable, RouteKey, RouteType};
use crate::types::{FishAddr, TableError, MAX_TTL};
use crate::wire::DvRecord;
use itertools::Itertools;
use log::*;

/// Lifetime of a DV route in seconds; also the grace period of a
/// withdrawn route.
pub const DV_ENTRY_TTL: u32 = 180;
/// Upper bound of records in one advertisement packet.
pub const MAX_ADV_IN_PACKET: usize = 32;

const HOST_PREFIX: u8 = 32;

/// The forwarding table as the node instantiates it: the opaque user slot
/// carries the back-reference into the DV table.
pub type FwdTable = ForwardingTable<Option<DvKey>>;

/// Stable handle to a DV entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DvKey {
    index: usize,
    generation: u32,
}

/// State of a DV route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DvState {
    /// The route currently in use for its destination.
    Active,
    /// A reserve route, kept in case the active one is lost.
    Backup,
    /// A dead route kept for a grace period before final removal.
    Withdrawn,
}

impl DvState {
    /// Single-letter tag used in table listings.
    pub fn symbol(self) -> char {
        match self {
            DvState::Active => 'A',
            DvState::Backup => 'B',
            DvState::Withdrawn => 'W',
        }
    }
}

/// One distance-vector route.
#[derive(Debug, Clone, PartialEq)]
pub struct DvEntry {
    /// Destination the route reaches.
    pub dest: FishAddr,
    /// Neighbor the traffic is handed to.
    pub next_hop: FishAddr,
    /// Hop-inclusive metric in `1..=MAX_TTL`; the maximum marks the route
    /// unreachable.
    pub metric: u32,
    /// Route state.
    pub state: DvState,
    /// Remaining lifetime in seconds.
    pub ttl: u32,
    /// Forwarding entry owned by this route, when installed.
    pub fw_key: Option<RouteKey>,
}

/// Outcome of matching an advertisement record against the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Nothing is known about the destination.
    Absent,
    /// The exact `(dest, next hop)` route is present with the same metric.
    Present(DvKey),
    /// The exact route is present with a different metric.
    Update(DvKey),
    /// The destination is known, but only through other next hops.
    Backup,
}

#[derive(Debug)]
struct DvSlot {
    generation: u32,
    entry: Option<DvEntry>,
}

/// The distance-vector route table.
#[derive(Debug, Default)]
pub struct DvTable {
    slots: Vec<DvSlot>,
}

impl DvTable {
    /// An empty table.
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Number of valid entries.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.entry.is_some()).count()
    }

    /// True when the table holds no valid entry.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.entry.is_none())
    }

    /// Iterator over all valid entries.
    pub fn iter(&self) -> impl Iterator<Item = &DvEntry> {
        self.slots.iter().filter_map(|s| s.entry.as_ref())
    }

    /// The entry for the exact `(dest, next_hop)` pair, if valid.
    pub fn lookup(&self, dest: FishAddr, next_hop: FishAddr) -> Option<&DvEntry> {
        self.iter().find(|e| e.dest == dest && e.next_hop == next_hop)
    }

    /// The Active entry for `dest`, if one exists.
    pub fn active_route(&self, dest: FishAddr) -> Option<&DvEntry> {
        self.active_index(dest).and_then(|i| self.slots[i].entry.as_ref())
    }

    /// The entry behind `key`, if it is still valid.
    pub fn get(&self, key: DvKey) -> Option<&DvEntry> {
        let slot = self.slots.get(key.index)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    /// Match a route against the table. `metric` is the hop-inclusive
    /// metric the route would be stored with. Classification is pure; any
    /// refresh is a separate step.
    pub fn classify(&self, dest: FishAddr, next_hop: FishAddr, metric: u32) -> RouteClass {
        let mut dest_known = false;
        for (index, slot) in self.slots.iter().enumerate() {
            let entry = match slot.entry.as_ref() {
                Some(e) => e,
                None => continue,
            };
            if entry.dest != dest {
                continue;
            }
            if entry.next_hop == next_hop {
                let key = DvKey { index, generation: slot.generation };
                return if entry.metric == metric {
                    RouteClass::Present(key)
                } else {
                    RouteClass::Update(key)
                };
            }
            dest_known = true;
        }
        if dest_known {
            RouteClass::Backup
        } else {
            RouteClass::Absent
        }
    }

    /// Digest an advertisement received from neighbor `from`. `local` is
    /// the node's own address; routes to it are never recorded.
    pub fn process_advertisement(
        &mut self,
        from: FishAddr,
        records: &[DvRecord],
        fw: &mut FwdTable,
        local: FishAddr,
    ) -> Result<(), TableError> {
        for rec in records {
            if rec.dest == local {
                continue;
            }
            let metric = rec.metric.saturating_add(1).min(MAX_TTL);
            match self.classify(rec.dest, from, metric) {
                RouteClass::Present(key) => {
                    self.entry_mut(key.index).ttl = DV_ENTRY_TTL;
                }
                RouteClass::Update(key) => self.update_route(key, metric, fw)?,
                RouteClass::Backup => {
                    let key = self.insert(DvEntry {
                        dest: rec.dest,
                        next_hop: from,
                        metric,
                        state: DvState::Backup,
                        ttl: DV_ENTRY_TTL,
                        fw_key: None,
                    });
                    // the destination may have lost its active route while
                    // a withdrawn sibling lingered; the fresh route takes
                    // over instead of hiding behind it
                    if metric < MAX_TTL && self.active_index(rec.dest).is_none() {
                        self.install(key.index, RouteType::Dv, fw);
                    }
                }
                RouteClass::Absent => {
                    if rec.metric >= MAX_TTL {
                        trace!("ignoring withdrawn route to {} from {}", rec.dest, from);
                        continue;
                    }
                    let key = self.insert(DvEntry {
                        dest: rec.dest,
                        next_hop: from,
                        metric,
                        state: DvState::Active,
                        ttl: DV_ENTRY_TTL,
                        fw_key: None,
                    });
                    if fw.has_destination(rec.dest) {
                        debug!("{} already has a forwarding entry, not installing", rec.dest);
                    } else {
                        let prefix_len = find_prefix_length(rec.netmask.raw());
                        let fw_key = fw.add(
                            rec.dest,
                            prefix_len,
                            from,
                            metric.saturating_sub(2),
                            RouteType::Dv,
                            Some(key),
                        );
                        self.entry_mut(key.index).fw_key = Some(fw_key);
                        debug!("learned route to {} via {} (metric {})", rec.dest, from, metric);
                    }
                }
            }
        }
        Ok(())
    }

    /// Refresh or create the Active route backing neighbor `n`: `dest=n`,
    /// `next_hop=n`, metric 1. A promoted alternative route to `n` is
    /// demoted back to Backup, and a route still in its withdrawn grace
    /// period is revived in place.
    pub fn learn_neighbor(&mut self, n: FishAddr, fw: &mut FwdTable) -> Result<(), TableError> {
        match self.find_index(n, n) {
            Some(i) => {
                let state = {
                    let entry = self.entry_mut(i);
                    entry.ttl = DV_ENTRY_TTL;
                    entry.state
                };
                if state != DvState::Active {
                    self.demote_active(n, fw)?;
                    self.entry_mut(i).metric = 1;
                    self.install(i, RouteType::Neighbor, fw);
                    debug!("revived neighbor route to {}", n);
                }
            }
            None => {
                self.demote_active(n, fw)?;
                let key = self.insert(DvEntry {
                    dest: n,
                    next_hop: n,
                    metric: 1,
                    state: DvState::Active,
                    ttl: DV_ENTRY_TTL,
                    fw_key: None,
                });
                self.install(key.index, RouteType::Neighbor, fw);
            }
        }
        Ok(())
    }

    /// One second of ageing. Expired Active and Backup routes move to
    /// Withdrawn (metric poisoned, grace ttl); expired Withdrawn routes
    /// are finally invalidated. An Active route leaving the forwarding
    /// table is replaced by its best backup, when one exists.
    pub fn age_tick(&mut self, fw: &mut FwdTable) -> Result<(), TableError> {
        for i in 0..self.slots.len() {
            let (expired, state) = match self.slots[i].entry.as_mut() {
                Some(e) => {
                    e.ttl -= 1;
                    (e.ttl == 0, e.state)
                }
                None => continue,
            };
            if !expired {
                continue;
            }
            match state {
                DvState::Active | DvState::Backup => {
                    debug!("route to {} went stale", self.slots[i].entry.as_ref().unwrap().dest);
                    self.withdraw(i, fw)?;
                }
                DvState::Withdrawn => {
                    debug!(
                        "dropping withdrawn route to {}",
                        self.slots[i].entry.as_ref().unwrap().dest
                    );
                    self.invalidate(i);
                }
            }
        }
        Ok(())
    }

    /// Build the advertisement packets for neighbor `n`: one record per
    /// Active entry, netmask all-ones, split into packets of at most
    /// [`MAX_ADV_IN_PACKET`] records. Split horizon with poison reverse:
    /// routes learned from `n` are advertised back to it as unreachable.
    pub fn build_advertisements(&self, n: FishAddr) -> Vec<Vec<DvRecord>> {
        let chunks = self
            .iter()
            .filter(|e| e.state == DvState::Active)
            .map(|e| DvRecord {
                dest: e.dest,
                netmask: FishAddr::BROADCAST,
                metric: if e.next_hop == n { MAX_TTL } else { e.metric },
            })
            .chunks(MAX_ADV_IN_PACKET);
        (&chunks).into_iter().map(|chunk| chunk.collect()).collect()
    }

    // -----------------
    // Private functions
    // -----------------

    fn entry_mut(&mut self, index: usize) -> &mut DvEntry {
        self.slots[index].entry.as_mut().unwrap()
    }

    fn find_index(&self, dest: FishAddr, next_hop: FishAddr) -> Option<usize> {
        self.slots.iter().position(|s| {
            s.entry
                .as_ref()
                .map(|e| e.dest == dest && e.next_hop == next_hop)
                .unwrap_or(false)
        })
    }

    fn active_index(&self, dest: FishAddr) -> Option<usize> {
        self.slots.iter().position(|s| {
            s.entry
                .as_ref()
                .map(|e| e.dest == dest && e.state == DvState::Active)
                .unwrap_or(false)
        })
    }

    fn insert(&mut self, entry: DvEntry) -> DvKey {
        match self.slots.iter().position(|s| s.entry.is_none()) {
            Some(index) => {
                self.slots[index].entry = Some(entry);
                DvKey { index, generation: self.slots[index].generation }
            }
            None => {
                self.slots.push(DvSlot { generation: 0, entry: Some(entry) });
                DvKey { index: self.slots.len() - 1, generation: 0 }
            }
        }
    }

    fn invalidate(&mut self, index: usize) {
        self.slots[index].entry = None;
        self.slots[index].generation += 1;
    }

    /// Apply a metric change to the entry at `key`, refreshing its ttl.
    fn update_route(&mut self, key: DvKey, metric: u32, fw: &mut FwdTable) -> Result<(), TableError> {
        let i = key.index;
        {
            let entry = self.entry_mut(i);
            entry.ttl = DV_ENTRY_TTL;
            entry.metric = metric;
        }
        if metric == MAX_TTL {
            return self.withdraw(i, fw);
        }
        let (state, dest, fw_key) = {
            let entry = self.slots[i].entry.as_ref().unwrap();
            (entry.state, entry.dest, entry.fw_key)
        };
        match state {
            DvState::Active => {
                if let Some(k) = fw_key {
                    fw.update_metric(k, metric.saturating_sub(1))?;
                }
            }
            DvState::Backup => {
                if self.active_index(dest).is_none() {
                    self.install(i, RouteType::Dv, fw);
                }
            }
            DvState::Withdrawn => {
                // the route came back within its grace period
                if self.active_index(dest).is_some() {
                    self.entry_mut(i).state = DvState::Backup;
                } else {
                    self.install(i, RouteType::Dv, fw);
                }
            }
        }
        Ok(())
    }

    /// Move the entry at `index` to Withdrawn: metric poisoned, ttl reset
    /// to the grace period. If the route was in the forwarding table, run
    /// the replacement.
    fn withdraw(&mut self, index: usize, fw: &mut FwdTable) -> Result<(), TableError> {
        let in_fw = {
            let entry = self.entry_mut(index);
            entry.state = DvState::Withdrawn;
            entry.metric = MAX_TTL;
            entry.ttl = DV_ENTRY_TTL;
            entry.fw_key.is_some()
        };
        if in_fw {
            self.replace_active(index, MAX_TTL, fw)?;
        }
        Ok(())
    }

    /// The entry at `index` leaves the forwarding table. Its entry there
    /// is removed, and the best backup with a metric strictly below
    /// `current_metric` is promoted in its place. With no such backup the
    /// entry itself is invalidated.
    fn replace_active(
        &mut self,
        index: usize,
        current_metric: u32,
        fw: &mut FwdTable,
    ) -> Result<(), TableError> {
        let dest = self.slots[index].entry.as_ref().unwrap().dest;
        if let Some(key) = self.entry_mut(index).fw_key.take() {
            fw.remove(key)?;
        }
        let best = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(j, s)| s.entry.as_ref().map(|e| (j, e)))
            .filter(|(_, e)| {
                e.dest == dest && e.state == DvState::Backup && e.metric < current_metric
            })
            .min_by_key(|&(_, e)| e.metric)
            .map(|(j, _)| j);
        match best {
            Some(j) => {
                debug!("promoting backup route to {}", dest);
                self.install(j, RouteType::Dv, fw);
            }
            None => {
                debug!("no backup route to {}", dest);
                self.invalidate(index);
            }
        }
        Ok(())
    }

    /// Make the entry at `index` the Active route for its destination and
    /// install it into the forwarding table.
    fn install(&mut self, index: usize, route_type: RouteType, fw: &mut FwdTable) {
        let key = DvKey { index, generation: self.slots[index].generation };
        let entry = self.entry_mut(index);
        entry.state = DvState::Active;
        let fw_key = fw.add(
            entry.dest,
            HOST_PREFIX,
            entry.next_hop,
            entry.metric.saturating_sub(2),
            route_type,
            Some(key),
        );
        entry.fw_key = Some(fw_key);
    }

    /// Demote the current Active route for `dest` (if any) back to Backup
    /// and take it out of the forwarding table.
    fn demote_active(&mut self, dest: FishAddr, fw: &mut FwdTable) -> Result<(), TableError> {
        if let Some(j) = self.active_index(dest) {
            let entry = self.entry_mut(j);
            entry.state = DvState::Backup;
            if let Some(key) = entry.fw_key.take() {
                fw.remove(key)?;
            }
        }
        Ok(())
    }
}

/// Prefix length encoded by a netmask in host order: the number of
/// right-shifts until the value reaches zero. The all-ones broadcast mask
/// therefore denotes a host route.
pub fn find_prefix_length(netmask: u32) -> u8 {
    (32 - netmask.leading_zeros()) as u8
}
