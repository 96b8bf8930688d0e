//! Circular doubly-linked list with a sentinel node, used for both the
//! heap list and the mapped list.
//!
//! Two primitives only, as spec'd: `link_after` and `unlink`. Both are
//! constant-time and preserve the circular invariant. For the heap list
//! the caller always passes the address-order predecessor to
//! `link_after`; for the mapped list the caller always passes the
//! sentinel itself (tail insertion via insertion before the sentinel,
//! i.e. after the current last element).

use crate::block::{Block, BlockStatus};
use std::ptr;

/// Owns a sentinel node and exposes the two list primitives. The sentinel
/// itself is never visible to callers outside this module: its `status`
/// and `size` are never inspected by heap/mmap logic, only its `prev`/
/// `next` links.
pub struct SentinelList {
  sentinel: *mut Block,
}

impl SentinelList {
  /// Allocates a sentinel node (on the Rust heap, via `Box`) and wires it
  /// into a one-element circular list pointing at itself.
  pub fn new() -> Self {
    let sentinel = Box::into_raw(Box::new(Block::new(BlockStatus::Free, 0)));
    unsafe {
      (*sentinel).prev = sentinel;
      (*sentinel).next = sentinel;
    }
    Self { sentinel }
  }

  pub fn sentinel(&self) -> *mut Block {
    self.sentinel
  }

  pub fn is_empty(&self) -> bool {
    unsafe { (*self.sentinel).next == self.sentinel }
  }

  pub fn head(&self) -> *mut Block {
    unsafe { (*self.sentinel).next }
  }

  pub fn tail(&self) -> *mut Block {
    unsafe { (*self.sentinel).prev }
  }

  /// Links `node` into the list immediately after `anchor`.
  ///
  /// `anchor` may be the sentinel itself (inserting at the head) or any
  /// live node (inserting after it, preserving address order for the heap
  /// list when the caller chooses `anchor` correctly).
  ///
  /// # Safety
  /// `anchor` and `node` must be live nodes belonging to lists with
  /// compatible layout (both sentinel-headed circular lists). `node` must
  /// not already be linked into any list.
  pub unsafe fn link_after(anchor: *mut Block, node: *mut Block) {
    unsafe {
      let after = (*anchor).next;
      (*node).prev = anchor;
      (*node).next = after;
      (*anchor).next = node;
      (*after).prev = node;
    }
  }

  /// Removes `node` from whatever list it is currently linked into.
  /// Does not free or otherwise touch `node`'s own memory; it is the
  /// caller's responsibility to relink or release it afterward.
  ///
  /// # Safety
  /// `node` must be currently linked into a circular list (its `prev`/
  /// `next` must be valid).
  pub unsafe fn unlink(node: *mut Block) {
    unsafe {
      let prev = (*node).prev;
      let next = (*node).next;
      (*prev).next = next;
      (*next).prev = prev;
    }
  }

  /// Inserts `node` as the new tail (just before the sentinel).
  ///
  /// # Safety
  /// Same obligations as `link_after`.
  pub unsafe fn push_back(&self, node: *mut Block) {
    unsafe { Self::link_after(self.tail(), node) }
  }

  /// Returns the addresses of every node in the list in forward order,
  /// not including the sentinel. Intended for tests and invariant
  /// checking, not hot paths.
  pub fn iter_addresses(&self) -> Vec<*mut Block> {
    let mut out = Vec::new();
    let mut cur = self.head();
    while cur != self.sentinel {
      out.push(cur);
      unsafe { cur = (*cur).next };
    }
    out
  }
}

impl Drop for SentinelList {
  fn drop(&mut self) {
    // Process-lifetime allocator: the sentinel is intentionally leaked
    // for the process's duration rather than torn down, mirroring the
    // fact that heap/mmap state is never unwound block-by-block on exit.
    // `Allocator` never actually drops its lists in practice (it lives
    // for the life of the process), but this keeps `SentinelList` sound
    // if it ever is.
    unsafe {
      drop(Box::from_raw(self.sentinel));
    }
    self.sentinel = ptr::null_mut();
  }
}
