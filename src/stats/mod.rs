//! Stats Module - region arena counters
//!
//! The upward operations in §6 take a stats handle as an input. This
//! module defines its shape: a small set of named atomic counters
//! updated alongside the atomics the operations already touch, with a
//! `snapshot()` for reporting.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters tracking region arena activity. Cheap to share: every
/// field is an independent `AtomicU64` updated with relaxed
/// fetch-add/fetch-sub, matching the "no extra synchronization for
/// statistics alone" rule.
#[derive(Debug, Default)]
pub struct RegionStats {
    regions_reserved: AtomicU64,
    bytes_committed: AtomicU64,
    bytes_decommitted: AtomicU64,
    blocks_claimed: AtomicU64,
    blocks_freed: AtomicU64,
    direct_os_allocations: AtomicU64,
    direct_os_bytes: AtomicU64,
    commit_failures: AtomicU64,
    oom_count: AtomicU64,
    no_fit_count: AtomicU64,
}

impl RegionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_region_reserved(&self) {
        self.regions_reserved.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self, bytes: usize) {
        self.bytes_committed.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_decommit(&self, bytes: usize) {
        self.bytes_decommitted.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_claim(&self, blocks: usize) {
        self.blocks_claimed.fetch_add(blocks as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_free(&self, blocks: usize) {
        self.blocks_freed.fetch_add(blocks as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_direct_os(&self, bytes: usize) {
        self.direct_os_allocations.fetch_add(1, Ordering::Relaxed);
        self.direct_os_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_commit_failure(&self) {
        self.commit_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_oom(&self) {
        self.oom_count.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_no_fit(&self) {
        self.no_fit_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot the current counters into a plain, `Copy` struct.
    pub fn snapshot(&self) -> RegionStatsSnapshot {
        RegionStatsSnapshot {
            regions_reserved: self.regions_reserved.load(Ordering::Relaxed),
            bytes_committed: self.bytes_committed.load(Ordering::Relaxed),
            bytes_decommitted: self.bytes_decommitted.load(Ordering::Relaxed),
            blocks_claimed: self.blocks_claimed.load(Ordering::Relaxed),
            blocks_freed: self.blocks_freed.load(Ordering::Relaxed),
            direct_os_allocations: self.direct_os_allocations.load(Ordering::Relaxed),
            direct_os_bytes: self.direct_os_bytes.load(Ordering::Relaxed),
            commit_failures: self.commit_failures.load(Ordering::Relaxed),
            oom_count: self.oom_count.load(Ordering::Relaxed),
            no_fit_count: self.no_fit_count.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RegionStats`], safe to log or export without
/// holding a reference to the live counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RegionStatsSnapshot {
    pub regions_reserved: u64,
    pub bytes_committed: u64,
    pub bytes_decommitted: u64,
    pub blocks_claimed: u64,
    pub blocks_freed: u64,
    pub direct_os_allocations: u64,
    pub direct_os_bytes: u64,
    pub commit_failures: u64,
    pub oom_count: u64,
    pub no_fit_count: u64,
}
