/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Time-windowed replay protection for timestamped, hashable messages.
//!
//! # The window
//!
//! A [`ReplayCache`] remembers which hashes it has seen, grouped into one bucket per minute. The
//! buckets cover `range_minutes` into the past and into the future around the current minute (the
//! window's *center*), plus `buffer_minutes` of spare capacity, for a total of
//! `2 * range_minutes + buffer_minutes` buckets. The first bucket holds the minute called the
//! *basetime*.
//!
//! The window only moves forward. When a check is made at a minute later than the center, the oldest
//! buckets are dropped and fresh ones are opened until the center has caught up. When a check is made
//! at a minute earlier than the center, the center is used instead, so that turning the system clock
//! back cannot re-open buckets that have already been dropped.
//!
//! # Masks
//!
//! Every hash in a bucket carries a [`ReplayMask`]: the set of purposes the hash has been consumed
//! for. A hash that was consumed for one purpose can still be consumed for another, as long as the two
//! masks do not overlap.
//!
//! # Concurrency
//!
//! The window is behind a single mutex. Every public method takes the lock once, so a check and the
//! mark that follows it (see [`consume_at`](ReplayCache::consume_at)) can never be interleaved with
//! another caller's.
//!
//! # Encoding
//!
//! [`encode`](ReplayCache::encode) produces a canonical byte string, described in the `codec` module.
//! Two caches with the same contents always encode to the same bytes.

mod codec;

pub mod mask;

pub mod window;

use std::{
    fmt,
    io,
    sync::{Mutex, MutexGuard, PoisonError},
    time::SystemTime,
};

use borsh::BorshSerialize;
use typed_builder::TypedBuilder;

use crate::{logging, types::data_types::CryptoHash};

use self::{
    mask::ReplayMask,
    window::{ReplayWindow, WindowCheck},
};

/// Stores the user-defined parameters of a [`ReplayCache`].
///
/// ## Bypass
///
/// If `bypass_checks` is set, every check is accepted and nothing is ever marked. This is meant for
/// tests and for bootstrapping a node from trusted data.
#[derive(Clone, Debug, PartialEq, Eq, TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [ReplayConfiguration]. On the builder call the following methods to construct a valid [ReplayConfiguration].

    Optional:
    - `.range_minutes(...)`
    - `.buffer_minutes(...)`
    - `.bypass_checks(...)`
    - `.log_events(...)`
"))]
pub struct ReplayConfiguration {
    #[builder(
        default = 60,
        setter(doc = "How far into the past and into the future of now an event may be, in minutes. Optional, defaults to `60`.")
    )]
    pub range_minutes: i64,

    #[builder(
        default = 60,
        setter(doc = "Extra buckets on top of the two ranges. Optional, defaults to `60`.")
    )]
    pub buffer_minutes: i64,

    #[builder(default = false, setter(doc = "Accept everything? Optional, defaults to `false`."))]
    pub bypass_checks: bool,

    #[builder(default = false, setter(doc = "Enable logging of rejections? Optional, defaults to `false`."))]
    pub log_events: bool,
}

impl ReplayConfiguration {
    /// `2 * range_minutes + buffer_minutes`, or 0 if that does not fit in a `usize`.
    pub fn num_buckets(&self) -> usize {
        self.range_minutes
            .checked_mul(2)
            .and_then(|ranges| ranges.checked_add(self.buffer_minutes))
            .and_then(|num_buckets| usize::try_from(num_buckets).ok())
            .unwrap_or(0)
    }

    /// Check that the window this configuration describes holds every event within `range_minutes` of
    /// its center.
    ///
    /// The first bucket is `num_buckets / 2` minutes before the center, so at least one buffer minute is
    /// needed for the last bucket to reach `range_minutes` after it.
    pub fn validate(&self) -> Result<(), ReplayConfigurationError> {
        if self.range_minutes < 0 {
            return Err(ReplayConfigurationError::NegativeRange(self.range_minutes));
        }
        if self.buffer_minutes < 1 {
            return Err(ReplayConfigurationError::BufferTooSmall(self.buffer_minutes));
        }
        if self.num_buckets() == 0 {
            return Err(ReplayConfigurationError::TooManyBuckets);
        }
        Ok(())
    }
}

/// Why a [`ReplayConfiguration`] was rejected by [`ReplayConfiguration::validate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplayConfigurationError {
    NegativeRange(i64),
    BufferTooSmall(i64),

    /// `2 * range_minutes + buffer_minutes` overflows.
    TooManyBuckets,
}

impl fmt::Display for ReplayConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayConfigurationError::NegativeRange(range_minutes) => {
                write!(f, "range_minutes must not be negative, got {}", range_minutes)
            }
            ReplayConfigurationError::BufferTooSmall(buffer_minutes) => {
                write!(f, "buffer_minutes must be at least 1, got {}", buffer_minutes)
            }
            ReplayConfigurationError::TooManyBuckets => {
                write!(f, "2 * range_minutes + buffer_minutes overflows")
            }
        }
    }
}

impl std::error::Error for ReplayConfigurationError {}

impl Default for ReplayConfiguration {
    fn default() -> Self {
        ReplayConfiguration::builder().build()
    }
}

pub struct ReplayCache {
    config: ReplayConfiguration,
    window: Mutex<ReplayWindow>,
}

impl ReplayCache {
    pub fn new(config: ReplayConfiguration) -> Result<ReplayCache, ReplayConfigurationError> {
        config.validate()?;
        let window = ReplayWindow::new(config.num_buckets());
        Ok(ReplayCache {
            config,
            window: Mutex::new(window),
        })
    }

    pub fn config(&self) -> &ReplayConfiguration {
        &self.config
    }

    /// Check whether `hash`, stamped with `event_secs`, could be consumed for `mask` at `now_secs`,
    /// advancing the window to `now_secs` on the way. Does not mark `hash`.
    ///
    /// Both times are in seconds since the Unix Epoch.
    pub fn check_window(
        &self,
        mask: ReplayMask,
        hash: &CryptoHash,
        event_secs: i64,
        now_secs: i64,
    ) -> WindowCheck {
        if self.config.bypass_checks {
            return WindowCheck::Bypassed;
        }
        let check = self.lock().check(
            self.config.range_minutes,
            mask,
            hash,
            event_secs,
            now_secs,
        );
        self.log_if_rejected(hash, &check);
        check
    }

    /// Consume `hash` for `mask`, using the system clock as now. Returns whether it was accepted.
    pub fn consume(&self, mask: ReplayMask, hash: &CryptoHash, event_secs: i64) -> bool {
        self.consume_at(mask, hash, event_secs, secs_since_unix_epoch())
    }

    /// Check `hash` like [`check_window`](Self::check_window) and, if it is accepted, mark it as consumed
    /// for `mask` in the event's bucket. Returns whether it was accepted.
    pub fn consume_at(
        &self,
        mask: ReplayMask,
        hash: &CryptoHash,
        event_secs: i64,
        now_secs: i64,
    ) -> bool {
        if self.config.bypass_checks {
            return true;
        }

        let check = {
            let mut window = self.lock();
            let check = window.check(self.config.range_minutes, mask, hash, event_secs, now_secs);
            if let WindowCheck::Accepted(index) = check {
                window.mark(index, mask, hash);
            }
            check
        };

        self.log_if_rejected(hash, &check);
        check.is_accepted()
    }

    /// Whether no bucket has `hash` marked for a purpose overlapping `mask`. Does not mark `hash`.
    pub fn is_unique(&self, mask: ReplayMask, hash: &CryptoHash) -> bool {
        self.lock().is_unique(mask, hash)
    }

    /// If [`is_unique`](Self::is_unique) holds, mark `hash` for `mask` in the bucket of `now_secs`,
    /// without checking the window. Does nothing if `now_secs` falls outside the buckets.
    pub fn set_now(&self, mask: ReplayMask, hash: &CryptoHash, now_secs: i64) {
        self.lock().set_now(mask, hash, now_secs)
    }

    /// Unmark `mask` from `hash` in every bucket.
    pub fn clear(&self, mask: ReplayMask, hash: &CryptoHash) {
        self.lock().clear(mask, hash)
    }

    /// The mask `hash` carries in bucket `index`, if it is in that bucket at all.
    pub fn mask_at(&self, index: usize, hash: &CryptoHash) -> Option<ReplayMask> {
        self.lock()
            .buckets
            .get(index)
            .and_then(|bucket| bucket.get(hash).copied())
    }

    /// The minute the window is currently centered on, or 0 if it has not been used yet.
    pub fn center(&self) -> i64 {
        self.lock().center
    }

    /// The minute of the first bucket.
    pub fn basetime(&self) -> i64 {
        self.lock().basetime
    }

    /// Get a copy of this cache that is not affected by later changes to it.
    pub fn snapshot(&self) -> ReplayCache {
        ReplayCache {
            config: self.config.clone(),
            window: Mutex::new(self.lock().clone()),
        }
    }

    pub fn encode(&self) -> io::Result<Vec<u8>> {
        self.lock().try_to_vec()
    }

    /// Decode `bytes` produced by [`encode`](Self::encode) on a cache with the same number of buckets as
    /// `config` describes.
    pub fn decode(config: ReplayConfiguration, bytes: &[u8]) -> io::Result<ReplayCache> {
        config
            .validate()
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
        let mut reader = bytes;
        let window = ReplayWindow::deserialize_reader(config.num_buckets(), &mut reader)?;
        if !reader.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} trailing bytes after the replay window", reader.len()),
            ));
        }
        Ok(ReplayCache {
            config,
            window: Mutex::new(window),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ReplayWindow> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn log_if_rejected(&self, hash: &CryptoHash, check: &WindowCheck) {
        if !self.config.log_events {
            return;
        }
        match check {
            WindowCheck::OutsideWindow => logging::log_replay_reject(hash, "OutsideWindow"),
            WindowCheck::AlreadySeen(_) => logging::log_replay_reject(hash, "AlreadySeen"),
            WindowCheck::Accepted(_) | WindowCheck::Bypassed => (),
        }
    }
}

/// Two caches are equal if their windows hold the same hashes with the same masks in the same buckets,
/// and have the same basetime and center.
impl PartialEq for ReplayCache {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        let this = self.lock().clone();
        let that = other.lock();
        this == *that
    }
}

impl fmt::Debug for ReplayCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let window = self.lock();
        f.debug_struct("ReplayCache")
            .field("config", &self.config)
            .field("basetime", &window.basetime)
            .field("center", &window.center)
            .field(
                "hashes",
                &window.buckets.iter().map(|bucket| bucket.len()).sum::<usize>(),
            )
            .finish()
    }
}

fn secs_since_unix_epoch() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_secs() as i64)
        .unwrap_or(0)
}
