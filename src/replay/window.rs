/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The unsynchronized window that a [`ReplayCache`](super::ReplayCache) guards with its mutex.

use std::collections::{BTreeMap, VecDeque};

use crate::types::data_types::CryptoHash;

use super::mask::ReplayMask;

/// One minute of the window.
pub(crate) type Bucket = BTreeMap<CryptoHash, ReplayMask>;

/// Outcome of [`ReplayCache::check_window`](super::ReplayCache::check_window).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowCheck {
    /// The hash has not been consumed for an overlapping purpose. Carries the index of the event's
    /// bucket.
    Accepted(usize),

    /// The cache is configured to bypass all checks.
    Bypassed,

    /// The event is more than the configured range away from now, or falls outside the buckets.
    OutsideWindow,

    /// The hash has already been consumed for an overlapping purpose in the event's bucket.
    AlreadySeen(usize),
}

impl WindowCheck {
    pub fn is_accepted(&self) -> bool {
        matches!(self, WindowCheck::Accepted(_) | WindowCheck::Bypassed)
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            WindowCheck::Accepted(index) | WindowCheck::AlreadySeen(index) => Some(*index),
            WindowCheck::Bypassed | WindowCheck::OutsideWindow => None,
        }
    }
}

/// Buckets of hashes, one per minute, from `basetime` to `basetime + buckets.len() - 1`.
///
/// `center` is the minute the window was last advanced to. A `center` of 0 means the window has not
/// been used yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ReplayWindow {
    pub(crate) buckets: VecDeque<Bucket>,
    pub(crate) basetime: i64,
    pub(crate) center: i64,
}

impl ReplayWindow {
    pub(crate) fn new(num_buckets: usize) -> ReplayWindow {
        ReplayWindow {
            buckets: (0..num_buckets).map(|_| Bucket::new()).collect(),
            basetime: 0,
            center: 0,
        }
    }

    pub(crate) fn check(
        &mut self,
        range_minutes: i64,
        mask: ReplayMask,
        hash: &CryptoHash,
        event_secs: i64,
        now_secs: i64,
    ) -> WindowCheck {
        let now = minutes(now_secs);
        let event = minutes(event_secs);

        let diff = now - event;
        if diff > range_minutes || diff < -range_minutes {
            return WindowCheck::OutsideWindow;
        }

        // The clock never goes backwards.
        let now = now.max(self.center);
        if self.center == 0 {
            self.center = now;
            self.basetime = now - self.num_buckets() / 2;
        }
        self.advance_to(now);

        let index = match self.index_of(event) {
            Some(index) => index,
            None => return WindowCheck::OutsideWindow,
        };
        if self.buckets[index]
            .get(hash)
            .map_or(false, |seen| seen.intersects(mask))
        {
            WindowCheck::AlreadySeen(index)
        } else {
            WindowCheck::Accepted(index)
        }
    }

    pub(crate) fn mark(&mut self, index: usize, mask: ReplayMask, hash: &CryptoHash) {
        if let Some(bucket) = self.buckets.get_mut(index) {
            *bucket.entry(*hash).or_default() |= mask;
        }
    }

    pub(crate) fn is_unique(&self, mask: ReplayMask, hash: &CryptoHash) -> bool {
        !self
            .buckets
            .iter()
            .any(|bucket| bucket.get(hash).map_or(false, |seen| seen.intersects(mask)))
    }

    /// Mark `hash` in the bucket of `now_secs`, without checking the window, if no bucket has it marked
    /// for an overlapping purpose. Does nothing if `now_secs` falls outside the buckets.
    pub(crate) fn set_now(&mut self, mask: ReplayMask, hash: &CryptoHash, now_secs: i64) {
        if !self.is_unique(mask, hash) {
            return;
        }
        if let Some(index) = self.index_of(minutes(now_secs)) {
            self.mark(index, mask, hash);
        }
    }

    pub(crate) fn clear(&mut self, mask: ReplayMask, hash: &CryptoHash) {
        for bucket in self.buckets.iter_mut() {
            if let Some(seen) = bucket.get_mut(hash) {
                *seen = seen.without(mask);
            }
        }
    }

    pub(crate) fn num_buckets(&self) -> i64 {
        self.buckets.len() as i64
    }

    /// Slide the window forward until `center == now`, dropping the oldest bucket and opening a fresh
    /// one for every minute.
    fn advance_to(&mut self, now: i64) {
        let steps = now - self.center;
        if steps <= 0 {
            return;
        }

        if steps >= self.num_buckets() {
            self.buckets.iter_mut().for_each(Bucket::clear);
        } else {
            for _ in 0..steps {
                self.buckets.pop_front();
                self.buckets.push_back(Bucket::new());
            }
        }
        self.center += steps;
        self.basetime += steps;
    }

    fn index_of(&self, minute: i64) -> Option<usize> {
        let index = minute - self.basetime;
        if index < 0 || index >= self.num_buckets() {
            None
        } else {
            Some(index as usize)
        }
    }
}

/// Whole minutes since the Unix Epoch.
pub(crate) fn minutes(unix_secs: i64) -> i64 {
    unix_secs.div_euclid(60)
}
