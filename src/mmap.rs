//! The mapped-region manager: each large allocation gets its own
//! anonymous mapping, sized exactly `header + aligned_payload`, with the
//! header written in-band at the start of the mapping itself.

use crate::align;
use crate::block::{Block, BlockStatus};
use crate::kernel;
use crate::list::SentinelList;
use log::debug;

pub struct MmapManager {
  list: SentinelList,
}

impl MmapManager {
  pub fn new() -> Self {
    Self {
      list: SentinelList::new(),
    }
  }

  pub fn list(&self) -> &SentinelList {
    &self.list
  }

  /// Maps a fresh anonymous region sized to hold `size_aligned` payload
  /// bytes plus one header, installs a MAPPED header at its start, links
  /// it onto the tail of the mapped list, and returns the payload
  /// address.
  pub fn mmap_new(&self, size_aligned: usize) -> *mut u8 {
    let header_size = align::header_size();
    let total = header_size + size_aligned;
    let addr = kernel::map_anonymous(total);
    let header = addr as *mut Block;
    unsafe {
      header.write(Block::new(BlockStatus::Mapped, size_aligned));
      self.list.push_back(header);
      debug!("mapped new region: {size_aligned} payload bytes ({total} total) at {addr:?}");
      Block::payload(header, header_size)
    }
  }

  /// Unlinks `node` from the mapped list and releases exactly the range
  /// the mapping occupies.
  ///
  /// # Safety
  /// `node` must be a live MAPPED node created by [`Self::mmap_new`].
  pub unsafe fn mmap_release(&self, node: *mut Block) {
    unsafe {
      debug_assert_eq!((*node).status, BlockStatus::Mapped);
      let header_size = align::header_size();
      let total = header_size + (*node).size;
      SentinelList::unlink(node);
      kernel::unmap(node as *mut u8, total);
      debug!("unmapped region: {total} bytes at {:?}", node as *mut u8);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mmap_new_installs_mapped_header_and_links_tail() {
    let mgr = MmapManager::new();
    let size = align::align_up(200_000);
    let payload = mgr.mmap_new(size);
    assert!(!payload.is_null());
    assert_eq!(payload as usize % align::ALIGNMENT, 0);

    unsafe {
      let header = Block::header_of(payload, align::header_size());
      assert_eq!((*header).status, BlockStatus::Mapped);
      assert_eq!((*header).size, size);
      mgr.mmap_release(header);
    }
    assert!(mgr.list().is_empty());
  }

  #[test]
  fn multiple_mappings_have_no_ordering_requirement() {
    let mgr = MmapManager::new();
    let a = mgr.mmap_new(align::align_up(150_000));
    let b = mgr.mmap_new(align::align_up(300_000));
    assert_eq!(mgr.list().iter_addresses().len(), 2);

    unsafe {
      mgr.mmap_release(Block::header_of(a, align::header_size()));
      mgr.mmap_release(Block::header_of(b, align::header_size()));
    }
    assert!(mgr.list().is_empty());
  }
}
