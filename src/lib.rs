//! # region_arena - lock-free region arena layer
//!
//! `region_arena` is the region layer of a general-purpose memory
//! allocator: it amortizes the cost of OS virtual-memory operations for
//! medium-large blocks (roughly 4 MiB-64 MiB) by maintaining a
//! process-wide pool of coarse virtual-memory regions, each subdivided
//! by a single-word bitmap into fixed-size blocks that callers claim
//! and release with atomic operations.
//!
//! This crate does not implement a general-purpose allocator by itself
//! — no size classes, no thread-local free lists, no object headers.
//! It is the layer those things sit on top of: given a size, an
//! alignment, and a commit flag, it hands back a pointer and an opaque
//! id; given that id back, it releases the block. Requests too large
//! or too aligned for the region layer fall straight through to a
//! direct OS allocation.
//!
//! ## Quick start
//!
//! ```rust
//! use region_arena::{Arena, RegionOptions};
//!
//! let arena = Arena::new(RegionOptions::default())?;
//!
//! let (addr, id) = arena.allocate(4 * 1024 * 1024, true)?;
//! unsafe {
//!     std::ptr::write_bytes(addr as *mut u8, 0, 64);
//! }
//! arena.free(addr, 4 * 1024 * 1024, id)?;
//! # Ok::<(), region_arena::RegionError>(())
//! ```
//!
//! Most embedders don't need more than one arena; [`allocate`],
//! [`allocate_aligned`], and [`free`] operate on a lazily-initialized
//! process-wide default arena built from [`RegionOptions::from_env`].
//! Use [`Arena`] directly when you need an independent table — tests,
//! or multiple isolated heaps in one process.
//!
//! ## Modules
//!
//! - [`bitmap`]: word-sized bitmap arithmetic (block counts, masks, the
//!   first-fit-from-LSB zero-run search).
//! - [`region`]: a single region descriptor and its claim/unclaim/
//!   release protocol.
//! - [`table`]: the fixed-size region table and the two-sweep
//!   allocation scan over it.
//! - [`arena`]: the top-level API — allocate-aligned/allocate/free and
//!   the pass-through OS operations.
//! - [`os`]: platform virtual-memory adapters (reserve/commit/decommit/
//!   reset/protect) consumed by the layers above.
//! - [`ptr`]: the typed allocation id and block-pointer wrappers.
//! - [`config`]: [`RegionOptions`] and its validation/env-overlay.
//! - [`error`]: [`RegionError`] and the crate's [`Result`] alias.
//! - [`stats`]: atomic counters tracking arena activity.
//!
//! ## Concurrency
//!
//! Every operation is lock-free: atomic load/store, compare-and-swap,
//! and fetch-add only. No mutex or condition variable appears anywhere
//! in this crate. See `region::Region` and `table::RegionTable` for the
//! exact ordering contracts.
//!
//! ## Safety
//!
//! This crate is `unsafe`-free at its public API boundary (the
//! underlying `os` adapters use `unsafe` to call into `mmap`/
//! `VirtualAlloc`, but that is encapsulated). Callers must still honor
//! the allocator contract: pass the exact `(addr, size, id)` triple
//! that [`Arena::allocate`]/[`Arena::allocate_aligned`] returned back
//! to [`Arena::free`]; passing a mismatched triple is a contract
//! violation (see [`arena::Arena::free`]'s documentation).

pub mod arena;
pub mod bitmap;
pub mod config;
pub mod error;
pub mod os;
pub mod ptr;
pub mod region;
pub mod stats;
pub mod table;

pub use arena::Arena;
pub use config::RegionOptions;
pub use error::{RegionError, Result};
pub use ptr::AllocId;
pub use stats::{RegionStats, RegionStatsSnapshot};

use std::sync::OnceLock;

static DEFAULT_ARENA: OnceLock<Arena> = OnceLock::new();

/// The process-wide default arena, built from [`RegionOptions::from_env`]
/// on first use.
///
/// Panics only if the environment-derived options themselves fail
/// [`RegionOptions::validate`] — a misconfiguration, not a runtime
/// condition.
pub fn default_arena() -> &'static Arena {
    DEFAULT_ARENA.get_or_init(|| {
        let options = RegionOptions::from_env();
        log::info!(
            "region_arena default arena initialized (block_size={}, heap_address_limit={}, eager_region_commit={})",
            options.block_size,
            options.heap_address_limit,
            options.eager_region_commit
        );
        Arena::new(options).expect("default RegionOptions must validate")
    })
}

/// Allocate `size` bytes aligned to `alignment` from the default arena.
/// See [`Arena::allocate_aligned`].
pub fn allocate_aligned(size: usize, alignment: usize, commit: bool) -> Result<(usize, AllocId)> {
    default_arena().allocate_aligned(size, alignment, commit)
}

/// Allocate `size` bytes from the default arena at the region layer's
/// natural alignment. See [`Arena::allocate`].
pub fn allocate(size: usize, commit: bool) -> Result<(usize, AllocId)> {
    default_arena().allocate(size, commit)
}

/// Free a block previously returned by [`allocate`]/[`allocate_aligned`]
/// on the default arena. See [`Arena::free`].
pub fn free(addr: usize, size: usize, id: AllocId) -> Result<()> {
    default_arena().free(addr, size, id)
}

/// Explicitly initialize the default arena with the given options.
///
/// Only meaningful if called before any of [`allocate`], [`allocate_aligned`],
/// [`free`], or [`default_arena`] — the default arena is built at most
/// once. Returns `Err` if another thread already raced this call to
/// initialize it with different options (the first caller wins).
pub fn init_with_config(options: RegionOptions) -> Result<()> {
    options
        .validate()
        .map_err(|e| RegionError::Configuration(e.to_string()))?;
    match DEFAULT_ARENA.set(Arena::new(options)?) {
        Ok(()) => Ok(()),
        Err(_) => Err(RegionError::Internal(
            "default arena was already initialized".to_string(),
        )),
    }
}
