//! Shared fixtures for the region_arena integration test suite.
//!
//! ============================================================================
//! These helpers exist to FIND BUGS, not to make tests pass. Do not
//! weaken an assertion here to get a test green.
//! ============================================================================

use region_arena::{Arena, AllocId, RegionOptions};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

/// Initialize `env_logger` once for the whole test binary, so a failing
/// assertion's surrounding `log::debug!`/`log::warn!` trail is visible
/// with `--nocapture`. Safe to call from every test; only the first
/// call takes effect.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A small address-space ceiling so tests can fill and extend the
/// region table in a handful of allocations instead of needing
/// gigabytes of virtual address space.
pub fn small_options() -> RegionOptions {
    let block_size = region_arena::os::page_size();
    RegionOptions {
        block_size,
        heap_address_limit: block_size * region_arena::bitmap::W * 4,
        ..Default::default()
    }
}

pub fn small_arena() -> Arena {
    Arena::new(small_options()).expect("small_options() must validate")
}

pub fn eager_commit_arena() -> Arena {
    let options = RegionOptions {
        eager_region_commit: true,
        ..small_options()
    };
    Arena::new(options).expect("options must validate")
}

/// **Bug this finds:** race conditions in the claim protocol returning
/// the same block to two callers.
#[track_caller]
pub fn assert_all_addresses_unique(addresses: &[usize], context: &str) {
    let unique: HashSet<_> = addresses.iter().collect();
    assert_eq!(
        unique.len(),
        addresses.len(),
        "{context}: {} duplicate address(es) out of {} - two callers claimed the same block",
        addresses.len() - unique.len(),
        addresses.len()
    );
}

/// **Bug this finds:** `allocate_aligned` returning a pointer that
/// does not honor the requested alignment.
#[track_caller]
pub fn assert_address_aligned(address: usize, alignment: usize, context: &str) {
    assert_eq!(
        address % alignment,
        0,
        "{context}: address {address:#x} is not {alignment}-byte aligned"
    );
}

/// Run `thread_count` threads each performing `allocations_per_thread`
/// allocations of `size` bytes, and hand every returned `(addr, id)`
/// pair to `validator` once all threads complete.
///
/// **Bug this finds:** races in the claim/extend/publish protocol under
/// real concurrent pressure.
pub fn run_concurrent_allocations<F>(
    arena: &Arc<Arena>,
    thread_count: usize,
    allocations_per_thread: usize,
    size: usize,
    validator: F,
) where
    F: FnOnce(Vec<(usize, AllocId)>),
{
    let barrier = Arc::new(Barrier::new(thread_count));
    let mut handles = Vec::with_capacity(thread_count);

    for _ in 0..thread_count {
        let arena = Arc::clone(arena);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            let mut results = Vec::with_capacity(allocations_per_thread);
            for _ in 0..allocations_per_thread {
                let (addr, id) = arena
                    .allocate(size, false)
                    .unwrap_or_else(|e| panic!("allocation failed: {e}"));
                results.push((addr, id));
            }
            results
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.join().expect("allocator thread panicked"));
    }
    validator(all);
}
