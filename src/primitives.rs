//! The public primitives: `allocate`, `free`, `zeroed_allocate`, and
//! `resize`, plus the routing and resize state machine that tie the heap
//! manager (`heap.rs`) and the mapped-region manager (`mmap.rs`)
//! together.

use crate::align;
use crate::block::{Block, BlockStatus};
use crate::heap::HeapManager;
use crate::kernel;
use crate::mmap::MmapManager;
use std::alloc::{GlobalAlloc, Layout};
use std::ptr;

/// The two tunables spec'd by name: the heap/map routing threshold and,
/// separately, the (usually smaller) threshold used only by
/// [`Allocator::zeroed_allocate`].
///
/// `calloc_mmap_threshold: None` means "derive it from the system page
/// size the first time it's needed", matching the spec's `min(page_size,
/// 4080)` formula; `Some(n)` overrides it outright, e.g. for tests that
/// want deterministic routing independent of the host's page size.
#[derive(Debug, Clone, Copy)]
pub struct AllocatorConfig {
  pub heap_pool: usize,
  pub calloc_mmap_threshold: Option<usize>,
}

impl Default for AllocatorConfig {
  fn default() -> Self {
    Self {
      heap_pool: 128 * 1024,
      calloc_mmap_threshold: None,
    }
  }
}

impl AllocatorConfig {
  fn calloc_threshold(&self) -> usize {
    self
      .calloc_mmap_threshold
      .unwrap_or_else(|| kernel::page_size().min(4080))
  }
}

/// A user-space allocator servicing a single process's allocate/free/
/// zeroed-allocate/resize requests by routing between a program-break
/// heap (small/medium requests) and individually-mapped anonymous
/// regions (large requests).
///
/// # Thread safety
///
/// Not thread-safe: every field is reached through raw pointers with no
/// synchronization, so `Allocator` is `!Sync` and cannot itself back a
/// `#[global_allocator]` static. Wrap it in your own mutual-exclusion
/// newtype (a `Mutex<Allocator>` forwarding `GlobalAlloc`, for instance)
/// if you need one — that wrapper is deliberately this crate's caller's
/// responsibility, not this crate's, the same way `rallocator::BumpAllocator`
/// leaves synchronization to its caller.
///
/// # Lifecycle
///
/// Heap memory is never returned to the kernel once obtained; mapped
/// regions are released exactly when their owning block is freed or
/// resized away. Dropping an `Allocator` does not unmap or shrink
/// anything it had not already released — it is meant to live for the
/// process's lifetime, same as the global allocator it can stand in for.
pub struct Allocator {
  heap: HeapManager,
  mmap: MmapManager,
  config: AllocatorConfig,
}

impl Default for Allocator {
  fn default() -> Self {
    Self::new()
  }
}

impl Allocator {
  pub fn new() -> Self {
    Self::with_config(AllocatorConfig::default())
  }

  pub fn with_config(config: AllocatorConfig) -> Self {
    Self {
      heap: HeapManager::new(),
      mmap: MmapManager::new(),
      config,
    }
  }

  pub fn config(&self) -> &AllocatorConfig {
    &self.config
  }

  /// Requests `size` bytes. Returns null for a zero-sized request.
  /// Requests whose aligned size is at least `heap_pool` are mapped
  /// directly; everything else is serviced from the heap (preallocating
  /// it on first use, coalescing, then best-fit or extending).
  pub fn allocate(&self, size: usize) -> *mut u8 {
    if size == 0 {
      return ptr::null_mut();
    }
    let aligned = align::align_up(size);
    if aligned >= self.config.heap_pool {
      return self.mmap.mmap_new(aligned);
    }
    self.heap_allocate(aligned)
  }

  /// Releases a pointer previously returned by `allocate`,
  /// `zeroed_allocate`, or `resize`. A no-op on null.
  pub fn free(&self, ptr: *mut u8) {
    if ptr.is_null() {
      return;
    }
    let header_size = align::header_size();
    unsafe {
      let node = Block::header_of(ptr, header_size);
      match (*node).status {
        BlockStatus::Allocated => (*node).status = BlockStatus::Free,
        BlockStatus::Mapped => self.mmap.mmap_release(node),
        // Freeing an already-FREE block is undefined on well-formed
        // input; left as a no-op rather than corrupting the list further.
        BlockStatus::Free => {}
      }
    }
  }

  /// Requests zeroed storage for `count * size` bytes. Routed by
  /// `min(page_size, 4080)` rather than `heap_pool`, since mapped memory
  /// arrives kernel-zeroed for free while heap memory must be cleared
  /// manually.
  pub fn zeroed_allocate(&self, count: usize, size: usize) -> *mut u8 {
    let total = count.wrapping_mul(size);
    if total == 0 {
      return ptr::null_mut();
    }
    let aligned = align::align_up(total);
    let payload = if total >= self.config.calloc_threshold() {
      self.mmap.mmap_new(aligned)
    } else {
      self.heap_allocate(aligned)
    };
    unsafe { ptr::write_bytes(payload, 0, aligned) };
    payload
  }

  /// Resizes the allocation at `ptr` to `size` bytes, per the state
  /// machine in the module-level design notes. `ptr == null` behaves as
  /// `allocate(size)`; `size == 0` behaves as `free(ptr)` followed by a
  /// null return; resizing a FREE (already-released) pointer returns
  /// null rather than attempting recovery.
  pub fn resize(&self, ptr: *mut u8, size: usize) -> *mut u8 {
    if ptr.is_null() {
      return self.allocate(size);
    }
    if size == 0 {
      self.free(ptr);
      return ptr::null_mut();
    }

    let header_size = align::header_size();
    let aligned = align::align_up(size);
    let node = unsafe { Block::header_of(ptr, header_size) };

    match unsafe { (*node).status } {
      BlockStatus::Free => ptr::null_mut(),
      BlockStatus::Mapped => self.resize_mapped(node, aligned, ptr),
      BlockStatus::Allocated => self.resize_allocated(node, aligned, ptr),
    }
  }

  fn heap_allocate(&self, aligned: usize) -> *mut u8 {
    if !self.heap.is_initialized() {
      self.heap.preallocate(self.config.heap_pool);
    }
    self.heap.coalesce_all();
    if let Some(ptr) = unsafe { self.heap.best_fit_alloc(aligned) } {
      return ptr;
    }
    self.heap.extend_heap(aligned)
  }

  fn resize_mapped(&self, node: *mut Block, aligned: usize, old_ptr: *mut u8) -> *mut u8 {
    unsafe {
      let old_size = (*node).size;
      let new_ptr = if aligned >= self.config.heap_pool {
        self.mmap.mmap_new(aligned)
      } else {
        self.heap_allocate(aligned)
      };
      ptr::copy(old_ptr, new_ptr, old_size.min(aligned));
      self.mmap.mmap_release(node);
      new_ptr
    }
  }

  fn resize_allocated(&self, node: *mut Block, aligned: usize, old_ptr: *mut u8) -> *mut u8 {
    unsafe {
      let old_size = (*node).size;

      // Growth that crosses into mapped-region territory always
      // relocates, regardless of how much trailing free space might be
      // available on the heap.
      if aligned >= self.config.heap_pool {
        (*node).status = BlockStatus::Free;
        let new_ptr = self.mmap.mmap_new(aligned);
        ptr::copy(old_ptr, new_ptr, old_size.min(aligned));
        return new_ptr;
      }

      // Shrinking (or staying the same size): truncate in place.
      if aligned <= old_size {
        (*node).size = aligned;
        self.heap.reclaim_tail(node, aligned);
        return old_ptr;
      }

      // Growing within the heap: first see how far `node` can extend by
      // absorbing immediately-following FREE space without relocating.
      self.heap.coalesce_from(node);
      if (*node).size >= aligned {
        (*node).size = aligned;
        self.heap.reclaim_tail(node, aligned);
        return old_ptr;
      }

      let sentinel = self.heap.list().sentinel();
      if (*node).next == sentinel {
        // Last block on the heap: just push the break out further.
        let header_size = align::header_size();
        let payload_end = (node as *mut u8).add(header_size).add((*node).size);
        let brk = kernel::current_break();
        let slack = (brk as usize).saturating_sub(payload_end as usize);
        let needed = aligned - (*node).size;
        if needed > slack {
          kernel::move_break((needed - slack) as isize);
        }
        (*node).size = aligned;
        return old_ptr;
      }

      // Interior block, coalescing wasn't enough: relocate via the
      // ordinary heap-allocation path (we already know `aligned <
      // heap_pool`, so this never escapes to a mapping), copy, then
      // retire the source. `node` must stay ALLOCATED until the copy is
      // done — freeing it first would let the allocation below coalesce
      // it with a FREE neighbor and carve a new header into bytes this
      // copy still has to read.
      let copy_len = old_size.min(aligned);
      let new_ptr = self.heap_allocate(aligned);
      ptr::copy(old_ptr, new_ptr, copy_len);
      (*node).status = BlockStatus::Free;
      new_ptr
    }
  }
}

unsafe impl GlobalAlloc for Allocator {
  unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
    self.allocate(layout.size())
  }

  unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
    self.free(ptr);
  }

  unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
    self.zeroed_allocate(1, layout.size())
  }

  unsafe fn realloc(&self, ptr: *mut u8, _layout: Layout, new_size: usize) -> *mut u8 {
    self.resize(ptr, new_size)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn is_aligned(ptr: *mut u8) -> bool {
    (ptr as usize) % align::ALIGNMENT == 0
  }

  #[test]
  fn zero_size_requests_return_null() {
    let a = Allocator::new();
    assert!(a.allocate(0).is_null());
    assert!(a.zeroed_allocate(0, 8).is_null());
    assert!(a.zeroed_allocate(8, 0).is_null());
  }

  #[test]
  fn first_heap_allocation_triggers_preallocation_once() {
    let a = Allocator::new();
    assert!(!a.heap.is_initialized());
    let p = a.allocate(100);
    assert!(!p.is_null());
    assert!(a.heap.is_initialized());
    assert!(is_aligned(p));
  }

  #[test]
  fn large_request_routes_to_mapped_list() {
    let a = Allocator::new();
    let p = a.allocate(200_000);
    assert!(!p.is_null());
    assert!(a.heap.list().is_empty());
    assert_eq!(a.mmap.list().iter_addresses().len(), 1);
    a.free(p);
    assert!(a.mmap.list().is_empty());
  }

  #[test]
  fn free_then_allocate_reuses_freed_block() {
    let a = Allocator::new();
    let p = a.allocate(100);
    let q = a.allocate(200);
    a.free(p);
    let r = a.allocate(96);
    assert_eq!(r, p, "best-fit should reuse the freed 100-byte block for a 96-byte request");
    a.free(q);
    a.free(r);
  }

  #[test]
  fn free_of_null_is_noop() {
    let a = Allocator::new();
    a.free(ptr::null_mut());
  }

  #[test]
  fn zeroed_allocate_clears_payload() {
    let a = Allocator::new();
    let p = a.zeroed_allocate(1000, 1);
    assert!(!p.is_null());
    unsafe {
      for i in 0..1000 {
        assert_eq!(*p.add(i), 0);
      }
      ptr::write_bytes(p, 0xAB, 1000);
    }
    a.free(p);
  }

  #[test]
  fn resize_null_is_allocate() {
    let a = Allocator::new();
    let p = a.resize(ptr::null_mut(), 64);
    assert!(!p.is_null());
    a.free(p);
  }

  #[test]
  fn resize_to_zero_frees_and_returns_null() {
    let a = Allocator::new();
    let p = a.allocate(64);
    let q = a.resize(p, 0);
    assert!(q.is_null());
  }

  #[test]
  fn resize_identity_returns_same_pointer() {
    let a = Allocator::new();
    let p = a.allocate(50);
    let q = a.resize(p, 50);
    assert_eq!(p, q);
    a.free(q);
  }

  #[test]
  fn resize_preserves_bytes_on_truncate_and_grow() {
    let a = Allocator::new();
    let p = a.allocate(50);
    unsafe {
      for i in 0..50 {
        p.add(i).write(b'A');
      }
    }

    let q = a.resize(p, 5000);
    assert!(!q.is_null());
    unsafe {
      for i in 0..50 {
        assert_eq!(q.add(i).read(), b'A');
      }
    }
    a.free(q);
  }

  #[test]
  fn resize_of_freed_pointer_returns_null() {
    let a = Allocator::new();
    let p = a.allocate(64);
    a.free(p);
    let q = a.resize(p, 128);
    assert!(q.is_null());
  }

  #[test]
  fn resize_mapped_to_mapped_preserves_bytes() {
    let a = Allocator::new();
    let p = a.allocate(200_000);
    unsafe { ptr::write_bytes(p, 0x42, 200_000) };
    let q = a.resize(p, 300_000);
    assert!(!q.is_null());
    unsafe {
      for i in 0..200_000 {
        assert_eq!(q.add(i).read(), 0x42);
      }
    }
    a.free(q);
  }

  #[test]
  fn resize_mapped_down_into_heap_preserves_bytes() {
    let a = Allocator::new();
    let p = a.allocate(200_000);
    unsafe { ptr::write_bytes(p, 0x7, 64) };
    let q = a.resize(p, 64);
    assert!(!q.is_null());
    unsafe {
      for i in 0..64 {
        assert_eq!(q.add(i).read(), 0x7);
      }
    }
    a.free(q);
  }

  #[test]
  fn allocating_entire_preallocated_pool_does_not_grow_break() {
    let a = Allocator::new();
    let header_size = align::header_size();
    let whole = a.config.heap_pool - header_size;
    let brk_before_alloc_call = {
      a.heap.preallocate(a.config.heap_pool); // force preallocation without consuming it
      kernel::current_break()
    };
    let p = a.allocate(whole);
    assert!(!p.is_null());
    assert_eq!(kernel::current_break(), brk_before_alloc_call);
    a.free(p);
  }

  #[test]
  fn resize_interior_block_relocates_and_copies() {
    let a = Allocator::new();
    let first = a.allocate(64);
    let second = a.allocate(64);
    // `first` is no longer the heap tail once `second` exists; shrinking
    // then growing it past its own capacity forces relocation rather
    // than in-place break extension.
    unsafe {
      for i in 0..64 {
        first.add(i).write(b'Z');
      }
    }
    let grown = a.resize(first, 5000);
    assert_ne!(grown, first);
    unsafe {
      for i in 0..64 {
        assert_eq!(grown.add(i).read(), b'Z');
      }
    }
    a.free(grown);
    a.free(second);
  }
}
