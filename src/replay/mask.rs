/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

use std::ops::{BitOr, BitOrAssign};

/// A set of purposes for which a hash can be consumed.
///
/// Two masks overlap if they share a bit. Consuming a hash for one purpose only blocks later
/// consumption for overlapping purposes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ReplayMask(u64);

impl ReplayMask {
    /// Messages produced by this node.
    pub const INTERNAL: ReplayMask = ReplayMask(1);

    /// Messages received from peers.
    pub const NETWORK: ReplayMask = ReplayMask(1 << 1);

    /// Entry reveals.
    pub const REVEAL: ReplayMask = ReplayMask(1 << 3);

    pub const fn new(bits: u64) -> ReplayMask {
        ReplayMask(bits)
    }

    pub const fn empty() -> ReplayMask {
        ReplayMask(0)
    }

    pub const fn bits(&self) -> u64 {
        self.0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub const fn intersects(&self, other: ReplayMask) -> bool {
        self.0 & other.0 != 0
    }

    /// Return `self` with every bit of `other` cleared.
    pub const fn without(&self, other: ReplayMask) -> ReplayMask {
        ReplayMask(self.0 & !other.0)
    }
}

impl BitOr for ReplayMask {
    type Output = ReplayMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        ReplayMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for ReplayMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0
    }
}
