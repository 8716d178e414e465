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

//! The forwarding table: a growable slot array of routes with
//! longest-prefix-match lookup.
//!
//! A flat array with a linear scan is enough here: a fishnet keeps the
//! table in the hundreds of entries, and each Layer-3 send costs at most
//! one full scan.

use crate::types::{FishAddr, TableError};
use log::*;

const INITIAL_TABLE_SIZE: usize = 256;

/// Origin tag of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteType {
    /// Directly connected network.
    Connected,
    /// The node's own address.
    Loopback,
    /// The all-neighbors pseudo-route.
    Broadcast,
    /// One-hop route maintained by the neighbor protocol.
    Neighbor,
    /// Route learned from distance-vector advertisements.
    Dv,
    /// Route learned from link-state routing.
    LinkState,
}

impl RouteType {
    /// Single-letter tag used in table listings.
    pub fn symbol(self) -> char {
        match self {
            RouteType::Connected => 'C',
            RouteType::Loopback => 'L',
            RouteType::Broadcast => 'B',
            RouteType::Neighbor => 'N',
            RouteType::Dv => 'D',
            RouteType::LinkState => 'Z',
        }
    }
}

/// Stable handle to a forwarding entry. A key is valid exactly as long as
/// its entry; using it after removal is detected, not undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteKey {
    index: usize,
    generation: u32,
}

/// One route of the forwarding table.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardingEntry<U> {
    /// Destination network or host address.
    pub dest: FishAddr,
    /// Number of leading bits of `dest` that must match, 0 to 32.
    pub prefix_len: u8,
    /// Neighbor that matching packets are handed to.
    pub next_hop: FishAddr,
    /// Route cost. Insertion adds the hop to the next hop on top of the
    /// metric given by the caller.
    pub metric: u32,
    /// Origin of the route.
    pub route_type: RouteType,
    /// Marks the route chosen among alternatives to the same destination.
    pub best: bool,
    /// Opaque data stored by the owning protocol, handed back on removal.
    pub user_data: U,
}

#[derive(Debug)]
struct Slot<U> {
    generation: u32,
    entry: Option<ForwardingEntry<U>>,
}

/// Verdict returned by an [`ForwardingTable::iterate`] visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterAction {
    /// Leave the entry in place.
    Keep,
    /// Invalidate the entry after the visit.
    Remove,
}

/// Growable table of routes.
///
/// Entries occupy the first invalid slot; slots are reused after removal.
/// When the table is full it doubles its slot count and never shrinks.
#[derive(Debug)]
pub struct ForwardingTable<U> {
    slots: Vec<Slot<U>>,
    occupied: usize,
}

impl<U> Default for ForwardingTable<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U> ForwardingTable<U> {
    /// An empty table with the initial slot count.
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(INITIAL_TABLE_SIZE);
        slots.resize_with(INITIAL_TABLE_SIZE, || Slot { generation: 0, entry: None });
        Self { slots, occupied: 0 }
    }

    /// Insert a route and return its handle. The stored metric is
    /// `metric + 1`: the hop to the next hop is added on insertion.
    pub fn add(
        &mut self,
        dest: FishAddr,
        prefix_len: u8,
        next_hop: FishAddr,
        metric: u32,
        route_type: RouteType,
        user_data: U,
    ) -> RouteKey {
        let index = match self.slots.iter().position(|s| s.entry.is_none()) {
            Some(i) => i,
            None => self.grow(),
        };
        let generation = self.slots[index].generation;
        self.slots[index].entry = Some(ForwardingEntry {
            dest,
            prefix_len,
            next_hop,
            metric: metric.saturating_add(1),
            route_type,
            best: true,
            user_data,
        });
        self.occupied += 1;
        trace!("installed route {}/{} via {}", dest, prefix_len, next_hop);
        RouteKey { index, generation }
    }

    fn grow(&mut self) -> usize {
        let old = self.slots.len();
        debug!("forwarding table full, doubling to {} slots", old * 2);
        self.slots.resize_with(old * 2, || Slot { generation: 0, entry: None });
        old
    }

    /// Invalidate the entry behind `key`. The slot becomes reusable, and
    /// the user data stored with the entry is handed back.
    pub fn remove(&mut self, key: RouteKey) -> Result<U, TableError> {
        let slot = self.slots.get_mut(key.index).ok_or(TableError::StaleRouteKey)?;
        if slot.generation != key.generation {
            return Err(TableError::StaleRouteKey);
        }
        let entry = slot.entry.take().ok_or(TableError::StaleRouteKey)?;
        slot.generation += 1;
        self.occupied -= 1;
        Ok(entry.user_data)
    }

    /// Overwrite the metric of an existing entry in place.
    pub fn update_metric(&mut self, key: RouteKey, new_metric: u32) -> Result<(), TableError> {
        self.get_mut(key).ok_or(TableError::StaleRouteKey)?.metric = new_metric;
        Ok(())
    }

    /// The entry behind `key`, if it is still valid.
    pub fn get(&self, key: RouteKey) -> Option<&ForwardingEntry<U>> {
        let slot = self.slots.get(key.index)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn get_mut(&mut self, key: RouteKey) -> Option<&mut ForwardingEntry<U>> {
        let slot = self.slots.get_mut(key.index)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    /// Next hop of the best route matching `addr`.
    ///
    /// An entry matches when the leading `prefix_len` bits of `addr` equal
    /// the entry's destination under the same mask. Among the matches, the
    /// greatest prefix length wins; ties break on the smallest metric. The
    /// zero address is returned when nothing matches.
    pub fn longest_prefix_match(&self, addr: FishAddr) -> FishAddr {
        let mut best: Option<&ForwardingEntry<U>> = None;
        for (_, entry) in self.iter() {
            let mask = prefix_mask(entry.prefix_len);
            if addr.raw() & mask != entry.dest.raw() & mask {
                continue;
            }
            let better = match best {
                None => true,
                Some(b) => {
                    entry.prefix_len > b.prefix_len
                        || (entry.prefix_len == b.prefix_len && entry.metric < b.metric)
                }
            };
            if better {
                best = Some(entry);
            }
        }
        best.map(|e| e.next_hop).unwrap_or(FishAddr::ZERO)
    }

    /// True when some valid entry routes exactly to `dest`.
    pub fn has_destination(&self, dest: FishAddr) -> bool {
        self.iter().any(|(_, e)| e.dest == dest)
    }

    /// Visit every valid entry of the given type. The visitor may ask for
    /// the entry to be removed.
    pub fn iterate<F>(&mut self, route_type: RouteType, mut visitor: F)
    where
        F: FnMut(RouteKey, &ForwardingEntry<U>) -> IterAction,
    {
        for index in 0..self.slots.len() {
            let key = RouteKey { index, generation: self.slots[index].generation };
            let remove = match self.slots[index].entry.as_ref() {
                Some(e) if e.route_type == route_type => visitor(key, e) == IterAction::Remove,
                _ => false,
            };
            if remove {
                let _ = self.remove(key);
            }
        }
    }

    /// Iterator over all valid entries together with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (RouteKey, &ForwardingEntry<U>)> {
        self.slots.iter().enumerate().filter_map(|(index, s)| {
            s.entry
                .as_ref()
                .map(|e| (RouteKey { index, generation: s.generation }, e))
        })
    }

    /// Number of valid entries.
    pub fn len(&self) -> usize {
        self.occupied
    }

    /// True when the table holds no valid entry.
    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    /// Current slot count.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

fn prefix_mask(prefix_len: u8) -> u32 {
    match prefix_len {
        0 => 0,
        len if len >= 32 => u32::MAX,
        len => u32::MAX << (32 - len),
    }
}
