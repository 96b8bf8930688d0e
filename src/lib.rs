//! # rallocator — a user-space general-purpose allocator
//!
//! This crate implements the classical allocate/free/zeroed-allocate/
//! resize quartet for a single process, routing between two backing
//! stores depending on request size:
//!
//! ```text
//!   Allocator
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │                                                                  │
//!   │   size < HEAP_POOL            size >= HEAP_POOL                  │
//!   │        │                            │                           │
//!   │        ▼                            ▼                           │
//!   │  ┌───────────────┐           ┌───────────────────┐              │
//!   │  │  heap list    │           │   mapped list      │              │
//!   │  │ (program      │           │ (one mmap() region  │              │
//!   │  │  break, grows │           │  per allocation,    │              │
//!   │  │  monotonic)   │           │  unmapped on free)  │              │
//!   │  └───────────────┘           └───────────────────┘              │
//!   │                                                                  │
//!   └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   rallocator
//!   ├── align   - align_up(), header_size()
//!   ├── block   - Block header record, BlockStatus
//!   ├── list    - sentinel doubly-linked list primitives
//!   ├── heap    - preallocation, coalescing, best-fit, tail extension
//!   ├── mmap    - per-allocation anonymous mappings
//!   ├── kernel  - sbrk/mmap/munmap/page_size wrappers, fatal-error reporter
//!   └── primitives - Allocator: the four public primitives and routing
//! ```
//!
//! ## In-band metadata
//!
//! Every allocation, heap or mapped, is prefixed by a [`block::Block`]
//! header living immediately before the payload:
//!
//! ```text
//!   Single Allocation:
//!   ┌────────────────────────┬─────────────────────────────────┐
//!   │       Block Header     │           User Data             │
//!   │  ┌───────────────────┐ │                                 │
//!   │  │ status: Allocated │ │  ┌───────────────────────────┐  │
//!   │  │ size:   N         │ │  │                           │  │
//!   │  │ prev / next       │ │  │      N bytes usable       │  │
//!   │  └───────────────────┘ │  │                           │  │
//!   │                        │  └───────────────────────────┘  │
//!   └────────────────────────┴─────────────────────────────────┘
//!                            ▲
//!                            └── Pointer returned to the caller
//! ```
//!
//! Given a payload pointer, the owning header is found by subtracting the
//! (aligned) header size — no out-of-band map is kept.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rallocator::Allocator;
//!
//! let allocator = Allocator::new();
//!
//! let p = allocator.allocate(64);
//! assert!(!p.is_null());
//! unsafe { p.write(42) };
//!
//! let p = allocator.resize(p, 4096);
//! allocator.free(p);
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded only**: every field is reached through raw
//!   pointers with no synchronization; see [`Allocator`]'s docs.
//! - **Heap never shrinks**: the program break only ever moves forward;
//!   large transient allocations should go through the mapped path
//!   instead (automatic once their aligned size reaches `heap_pool`).
//! - **POSIX-like targets only**: built on `sbrk`/`mmap` via `libc`.
//!
//! ## Safety
//!
//! This crate is inherently unsafe as it deals with raw memory
//! management. The four public primitives on [`Allocator`] are
//! safe to *call*, but every byte they hand back or accept is raw,
//! unmanaged memory — the usual pointer-validity obligations apply to
//! whatever the caller does with it.

pub mod align;
pub mod block;
pub mod heap;
pub mod kernel;
mod list;
pub mod mmap;
mod primitives;

pub use crate::block::BlockStatus;
pub use crate::primitives::{Allocator, AllocatorConfig};
