use std::ptr;

/// Which of the two lists a block belongs to, and whether it is currently
/// handed out to a caller.
///
/// `Free` and `Allocated` only ever appear on the heap list; `Mapped` only
/// ever appears on the mapped list. A block never transitions directly
/// between `Allocated` (heap) and `Mapped` — crossing that boundary always
/// goes through a fresh allocation and a copy (see `core::resize`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
  Free,
  Allocated,
  Mapped,
}

/// In-band header immediately preceding every payload, heap or mapped.
///
/// `size` is always the aligned payload length that follows this header —
/// never the header's own size, never an unaligned request size. `prev`
/// and `next` link the block into whichever sentinel list owns it.
pub struct Block {
  pub status: BlockStatus,
  pub size: usize,
  pub prev: *mut Block,
  pub next: *mut Block,
}

impl Block {
  pub fn new(status: BlockStatus, size: usize) -> Self {
    Self {
      status,
      size,
      prev: ptr::null_mut(),
      next: ptr::null_mut(),
    }
  }

  /// Address of the payload this header owns, given the header's own
  /// address and the crate-wide header size.
  ///
  /// # Safety
  /// `header` must point at a live `Block`.
  pub unsafe fn payload(header: *mut Block, header_size: usize) -> *mut u8 {
    unsafe { (header as *mut u8).add(header_size) }
  }

  /// Recovers the header address from a payload pointer. This is the sole
  /// mechanism by which `free`/`resize` resolve a caller's pointer back to
  /// its metadata.
  ///
  /// # Safety
  /// `payload` must have been returned by this allocator's `allocate`,
  /// `zeroed_allocate`, or `resize`.
  pub unsafe fn header_of(payload: *mut u8, header_size: usize) -> *mut Block {
    unsafe { payload.sub(header_size) as *mut Block }
  }
}
