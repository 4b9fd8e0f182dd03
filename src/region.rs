//! Region descriptor: one bitmap word plus a lazily-reserved backing
//! chunk of virtual address space (§3, §4.2 of the design).

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::bitmap::{self, good_commit_size};
use crate::config::RegionOptions;
use crate::error::Result;
use crate::os;
use crate::ptr::BlockPtr;
use crate::stats::RegionStats;

/// A single region: a `map` bitmap (bit k set iff block k is claimed)
/// and a `start` address (0 until the backing chunk is reserved).
///
/// Both fields are accessed only with atomic operations — no lock
/// guards this structure, matching §5's lock-free requirement.
#[derive(Debug)]
pub struct Region {
    map: AtomicUsize,
    start: AtomicUsize,
}

impl Region {
    /// A region with no blocks claimed and no backing memory reserved.
    pub const fn new() -> Self {
        Region {
            map: AtomicUsize::new(0),
            start: AtomicUsize::new(0),
        }
    }

    /// Current bitmap snapshot. Bit k set iff block k is live.
    pub fn map(&self) -> usize {
        self.map.load(Ordering::Acquire)
    }

    /// Current backing address, or 0 if not yet reserved.
    pub fn start(&self) -> usize {
        self.start.load(Ordering::Acquire)
    }

    /// Whether this region's backing memory has ever been reserved.
    pub fn is_initialized(&self) -> bool {
        self.start() != 0
    }

    /// §4.2 Step 1 + Step 2: find a run of `count` zero bits and claim
    /// it with a CAS-retry loop. Returns the claimed bit index, or
    /// `None` if the region currently has no fitting run ("no fit",
    /// not an error).
    fn try_claim(&self, count: usize) -> Option<usize> {
        loop {
            let map = self.map.load(Ordering::Acquire);
            if map == usize::MAX {
                return None;
            }
            let i = bitmap::find_run(map, count)?;
            let new_map = map | bitmap::block_mask(count, i);
            match self.map.compare_exchange_weak(
                map,
                new_map,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(i),
                Err(_) => continue, // map changed under us; restart Step 1
            }
        }
    }

    /// §4.4 Step 5: clear `count` bits starting at `bit_index` with a
    /// CAS-retry loop.
    fn unclaim(&self, count: usize, bit_index: usize) {
        let mask = bitmap::block_mask(count, bit_index);
        loop {
            let map = self.map.load(Ordering::Acquire);
            let new_map = map & !mask;
            match self.map.compare_exchange_weak(
                map,
                new_map,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(_) => continue,
            }
        }
    }

    /// §4.2 Step 3: ensure this region's backing memory is reserved,
    /// resolving the race where two threads both observe `start == 0`.
    /// The loser frees its own reservation and adopts the winner's
    /// `start` (no donation to another descriptor — see the design's
    /// open-question note on losing-race memory).
    ///
    /// Returns `(start_addr, won_the_race)`, where `won_the_race` tells
    /// the caller whether *this* call was the one that published
    /// `start` (used upstream to advance `regions_count` exactly once
    /// per newly-initialized region).
    fn ensure_backing(&self, options: &RegionOptions, stats: &RegionStats) -> Result<(usize, bool)> {
        let existing = self.start.load(Ordering::Acquire);
        if existing != 0 {
            return Ok((existing, false));
        }

        let region_size = options.region_size();
        let reserved = os::reserve_aligned(region_size, region_size, options.eager_region_commit)?;

        match self
            .start
            .compare_exchange(0, reserved, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                stats.record_region_reserved();
                log::info!(
                    "region backing reserved at {:#x} ({} bytes, eager_commit={})",
                    reserved,
                    region_size,
                    options.eager_region_commit
                );
                Ok((reserved, true))
            }
            Err(winner) => {
                if let Err(err) = os::free(reserved, region_size) {
                    log::warn!("failed to free losing region reservation: {err}");
                }
                Ok((winner, false))
            }
        }
    }

    /// Full claim protocol (§4.2): find + claim a run, ensure backing
    /// memory, and commit the sub-range unless eager-commit already
    /// committed the whole region. A post-claim commit failure is
    /// logged but not propagated — the block stays claimed and the
    /// caller gets a valid (if perhaps unbacked) pointer, matching the
    /// documented default behavior for this open question.
    ///
    /// Returns `Ok(None)` for "no fit"; `Ok(Some((bit_index,
    /// newly_reserved)))` on success, where `newly_reserved` is true iff
    /// this call was the one that reserved the region's backing memory
    /// (the table uses this to advance `regions_count` exactly once);
    /// `Err` only for a hard OOM during backing reservation (in which
    /// case the claimed bits have already been rolled back).
    pub fn claim(
        &self,
        block_count: usize,
        request_size: usize,
        options: &RegionOptions,
        want_commit: bool,
        stats: &RegionStats,
    ) -> Result<Option<(usize, bool)>> {
        let bit_index = match self.try_claim(block_count) {
            Some(i) => i,
            None => return Ok(None),
        };

        let (start, newly_reserved) = match self.ensure_backing(options, stats) {
            Ok(result) => result,
            Err(err) => {
                self.unclaim(block_count, bit_index);
                stats.record_oom();
                return Err(err);
            }
        };

        stats.record_claim(block_count);

        if want_commit && !options.eager_region_commit {
            let addr = BlockPtr::at(start, bit_index, options.block_size).addr();
            let commit_size = good_commit_size(request_size, options.large_page_size);
            match os::commit(addr, commit_size) {
                Ok(()) => stats.record_commit(commit_size),
                Err(err) => {
                    stats.record_commit_failure();
                    log::warn!(
                        "post-claim commit failed at {addr:#x} ({commit_size} bytes): {err} \
                         (block stays claimed, first access may fault)"
                    );
                }
            }
        }

        log::debug!("claimed {block_count} block(s) at bit {bit_index}");
        Ok(Some((bit_index, newly_reserved)))
    }

    /// §4.4 Steps 3-5: release backing memory for the sub-range, then
    /// unclaim the bits. Order matters — decommit/reset happens
    /// *before* the bits clear, so a racing claimant can never observe
    /// the block as free while our release is still in flight.
    pub fn release(
        &self,
        bit_index: usize,
        block_count: usize,
        request_size: usize,
        options: &RegionOptions,
        stats: &RegionStats,
    ) {
        let start = self.start.load(Ordering::Acquire);
        let addr = BlockPtr::at(start, bit_index, options.block_size).addr();
        let size = good_commit_size(request_size, options.large_page_size);

        let result = if options.eager_region_commit {
            os::reset(addr, size)
        } else {
            os::decommit(addr, size)
        };
        match result {
            Ok(()) => stats.record_decommit(size),
            Err(err) => log::warn!("failed to release backing at {addr:#x}: {err}"),
        }

        self.unclaim(block_count, bit_index);
        stats.record_free(block_count);
    }

    /// §4.4 Step 2: validate that `(bit_index, block_count, addr)` is
    /// consistent with this region's current state. A mismatch means
    /// the caller is passing an inconsistent (pointer, id, size) triple
    /// — a contract violation the free path handles by silently
    /// refusing to unclaim anything.
    pub fn validate(
        &self,
        bit_index: usize,
        block_count: usize,
        addr: usize,
        block_size: usize,
    ) -> bool {
        if bit_index + block_count > bitmap::W {
            return false;
        }
        let map = self.map.load(Ordering::Acquire);
        let mask = bitmap::block_mask(block_count, bit_index);
        if map & mask != mask {
            return false;
        }
        let start = self.start.load(Ordering::Acquire);
        start != 0 && start + bit_index * block_size == addr
    }
}

impl Default for Region {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_options() -> RegionOptions {
        RegionOptions {
            block_size: os::page_size(),
            ..Default::default()
        }
    }

    #[test]
    fn claim_then_release_clears_the_map() {
        let region = Region::new();
        let options = test_options();
        let stats = RegionStats::new();

        let (bit, newly_reserved) = region
            .claim(1, options.block_size, &options, true, &stats)
            .unwrap()
            .expect("fits");
        assert_eq!(bit, 0);
        assert!(newly_reserved);
        assert_eq!(region.map(), 0b1);

        let start = region.start();
        let addr = start + bit * options.block_size;
        assert!(region.validate(bit, 1, addr, options.block_size));

        region.release(bit, 1, options.block_size, &options, &stats);
        assert_eq!(region.map(), 0);
    }

    #[test]
    fn adjacent_claims_pack_from_lsb() {
        let region = Region::new();
        let options = test_options();
        let stats = RegionStats::new();

        let (b0, _) = region
            .claim(1, options.block_size, &options, false, &stats)
            .unwrap()
            .unwrap();
        let (b1, _) = region
            .claim(1, options.block_size, &options, false, &stats)
            .unwrap()
            .unwrap();
        assert_eq!(b0, 0);
        assert_eq!(b1, 1);
        assert_eq!(region.map(), 0b11);
    }

    #[test]
    fn claim_larger_than_capacity_is_no_fit() {
        let region = Region::new();
        let options = test_options();
        let stats = RegionStats::new();

        let result = region
            .claim(bitmap::W + 1, options.block_size, &options, false, &stats)
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn validate_rejects_wrong_address() {
        let region = Region::new();
        let options = test_options();
        let stats = RegionStats::new();

        let (bit, _) = region
            .claim(1, options.block_size, &options, false, &stats)
            .unwrap()
            .unwrap();
        let start = region.start();
        assert!(!region.validate(bit, 1, start + 1, options.block_size));
    }

    #[test]
    fn validate_rejects_unclaimed_bit() {
        let region = Region::new();
        let options = test_options();
        assert!(!region.validate(0, 1, 0, options.block_size));
    }

    #[test]
    fn backing_start_is_stable_across_repeated_claims() {
        let region = Region::new();
        let options = test_options();
        let stats = RegionStats::new();

        region
            .claim(1, options.block_size, &options, false, &stats)
            .unwrap();
        let start_after_first = region.start();
        region
            .claim(1, options.block_size, &options, false, &stats)
            .unwrap();
        assert_eq!(region.start(), start_after_first);
    }
}
