// Dweve Pathweave - Multi-Path Grammar Parsing Engine
//
// Copyright (c) 2025 Dweve IP B.V. and individual contributors.
//
// SPDX-License-Identifier: Apache-2.0
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE file at the
// root of this repository or at: http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Dense terminal sets.

use std::fmt;

use fixedbitset::FixedBitSet;

use super::TerminalId;

/// A set of terminals, one bit per terminal of a grammar.
///
/// Admissible sets are computed for every path on every step, so the set is
/// a flat bitset sized to the grammar's terminal count.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct TerminalSet {
    bits: FixedBitSet,
}

impl TerminalSet {
    /// An empty set able to hold `capacity` terminals.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bits: FixedBitSet::with_capacity(capacity),
        }
    }

    /// A set holding every terminal below `capacity`.
    pub fn full(capacity: usize) -> Self {
        let mut bits = FixedBitSet::with_capacity(capacity);
        bits.insert_range(..);
        Self { bits }
    }

    /// Add a terminal, growing the set if needed.
    pub fn insert(&mut self, terminal: TerminalId) -> bool {
        let index = terminal.index();
        if index >= self.bits.len() {
            self.bits.grow(index + 1);
        }
        !self.bits.put(index)
    }

    pub fn remove(&mut self, terminal: TerminalId) {
        let index = terminal.index();
        if index < self.bits.len() {
            self.bits.set(index, false);
        }
    }

    #[inline]
    pub fn contains(&self, terminal: TerminalId) -> bool {
        self.bits.contains(terminal.index())
    }

    /// Number of terminals in the set.
    pub fn len(&self) -> usize {
        self.bits.count_ones(..)
    }

    pub fn is_empty(&self) -> bool {
        self.bits.ones().next().is_none()
    }

    /// Terminals in ascending id (declaration) order.
    pub fn iter(&self) -> impl Iterator<Item = TerminalId> + '_ {
        self.bits.ones().map(|i| TerminalId(i as u16))
    }

    /// In-place union.
    pub fn union_with(&mut self, other: &TerminalSet) {
        if other.bits.len() > self.bits.len() {
            self.bits.grow(other.bits.len());
        }
        self.bits.union_with(&other.bits);
    }

    /// In-place intersection.
    pub fn intersect_with(&mut self, other: &TerminalSet) {
        self.bits.intersect_with(&other.bits);
    }

    /// Whether the two sets share a terminal.
    pub fn intersects(&self, other: &TerminalSet) -> bool {
        !self.bits.is_disjoint(&other.bits)
    }

    pub fn clear(&mut self) {
        self.bits.clear();
    }
}

impl fmt::Debug for TerminalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|t| t.0)).finish()
    }
}

impl FromIterator<TerminalId> for TerminalSet {
    fn from_iter<I: IntoIterator<Item = TerminalId>>(iter: I) -> Self {
        let mut set = TerminalSet::default();
        for terminal in iter {
            set.insert(terminal);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_contains() {
        let mut set = TerminalSet::with_capacity(4);
        assert!(set.insert(TerminalId(1)));
        assert!(!set.insert(TerminalId(1)));
        assert!(set.contains(TerminalId(1)));
        assert!(!set.contains(TerminalId(2)));
        assert!(!set.contains(TerminalId(100)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_insert_grows() {
        let mut set = TerminalSet::default();
        set.insert(TerminalId(70));
        assert!(set.contains(TerminalId(70)));
    }

    #[test]
    fn test_union_intersection() {
        let a: TerminalSet = [TerminalId(0), TerminalId(2)].into_iter().collect();
        let b: TerminalSet = [TerminalId(2), TerminalId(9)].into_iter().collect();
        let mut union = a.clone();
        union.union_with(&b);
        assert_eq!(union.iter().map(|t| t.0).collect::<Vec<_>>(), vec![0, 2, 9]);
        let mut inter = a.clone();
        inter.intersect_with(&b);
        assert_eq!(inter.iter().map(|t| t.0).collect::<Vec<_>>(), vec![2]);
        assert!(a.intersects(&b));
    }

    #[test]
    fn test_full_and_remove() {
        let mut set = TerminalSet::full(3);
        assert_eq!(set.len(), 3);
        set.remove(TerminalId(1));
        assert!(!set.contains(TerminalId(1)));
        set.clear();
        assert!(set.is_empty());
    }
}
