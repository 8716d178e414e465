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

//! Bounded record of recently observed `(source, packet id)` pairs, used
//! to suppress broadcast loops.

use crate::types::FishAddr;
use log::*;

/// Capacity of the seen-ID set. When an insertion finds the set full, the
/// whole history is discarded; at worst a few duplicates propagate once.
pub const MAX_IDS_SEEN: usize = 512;

/// Append-only set of `(source, packet id)` pairs.
#[derive(Debug, Default)]
pub struct SeenIds {
    ids: Vec<(FishAddr, u32)>,
}

impl SeenIds {
    /// An empty set with full capacity reserved.
    pub fn new() -> Self {
        Self { ids: Vec::with_capacity(MAX_IDS_SEEN) }
    }

    /// True when `(src, id)` was recorded since the last wholesale clear.
    pub fn has(&self, src: FishAddr, id: u32) -> bool {
        self.ids.iter().any(|&(s, i)| s == src && i == id)
    }

    /// Record `(src, id)`. Idempotent: a pair that is already present is
    /// not recorded twice.
    pub fn remember(&mut self, src: FishAddr, id: u32) {
        if self.has(src, id) {
            return;
        }
        if self.ids.len() == MAX_IDS_SEEN {
            debug!("seen-id set full, clearing {} entries", self.ids.len());
            self.ids.clear();
        }
        self.ids.push((src, id));
    }

    /// Number of recorded pairs.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when nothing is recorded.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_remember_and_has() {
        let mut seen = SeenIds::new();
        let src = FishAddr(0x0a00_0001);
        assert!(!seen.has(src, 7));
        seen.remember(src, 7);
        assert!(seen.has(src, 7));
        // same id from a different source is a different pair
        assert!(!seen.has(FishAddr(0x0a00_0002), 7));
    }

    #[test]
    fn test_remember_is_idempotent() {
        let mut seen = SeenIds::new();
        let src = FishAddr(0x0a00_0001);
        seen.remember(src, 1);
        seen.remember(src, 1);
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_cleared_when_full() {
        let mut seen = SeenIds::new();
        let src = FishAddr(0x0a00_0001);
        for id in 0..MAX_IDS_SEEN as u32 {
            seen.remember(src, id);
        }
        assert_eq!(seen.len(), MAX_IDS_SEEN);
        assert!(seen.has(src, 0));
        // the next insertion discards the history wholesale
        seen.remember(src, MAX_IDS_SEEN as u32);
        assert_eq!(seen.len(), 1);
        assert!(!seen.has(src, 0));
        assert!(seen.has(src, MAX_IDS_SEEN as u32));
    }
}
