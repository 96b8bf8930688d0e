//! The kernel-level collaborators: moving the program break, mapping and
//! unmapping anonymous memory, reading the page size, and the
//! fatal-error reporter. Everything here is a thin wrapper around
//! `libc`; the rest of the crate never touches `libc` directly, only
//! these named call sites.

use libc::{c_void, intptr_t};
use log::error;

/// Advances the program break by `delta` bytes (negative shrinks it,
/// zero queries it) and returns the previous break address.
///
/// # Panics / Aborts
/// Calls [`die`] (never returns) if the kernel reports failure.
pub fn move_break(delta: isize) -> *mut u8 {
  let prev = unsafe { libc::sbrk(delta as intptr_t) };
  if prev == usize::MAX as *mut c_void {
    die("sbrk");
  }
  prev as *mut u8
}

/// Queries the current program break without moving it.
pub fn current_break() -> *mut u8 {
  move_break(0)
}

/// Requests a fresh, zeroed, private anonymous mapping of `length` bytes.
///
/// # Panics / Aborts
/// Calls [`die`] (never returns) if the kernel reports failure.
pub fn map_anonymous(length: usize) -> *mut u8 {
  let addr = unsafe {
    libc::mmap(
      std::ptr::null_mut(),
      length,
      libc::PROT_READ | libc::PROT_WRITE,
      libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
      -1,
      0,
    )
  };
  if addr == libc::MAP_FAILED {
    die("mmap");
  }
  addr as *mut u8
}

/// Releases exactly the range `[addr, addr + length)` from a prior
/// [`map_anonymous`] call.
///
/// # Safety
/// `addr`/`length` must describe a currently-mapped range obtained from
/// [`map_anonymous`].
pub unsafe fn unmap(addr: *mut u8, length: usize) {
  let rc = unsafe { libc::munmap(addr as *mut c_void, length) };
  if rc != 0 {
    die("munmap");
  }
}

/// System page size, in bytes.
pub fn page_size() -> usize {
  unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}

/// Reports a fatal, unrecoverable kernel-primitive failure and aborts the
/// process. `label` names the failing syscall. Never returns.
///
/// The allocator's own data structures may be half-committed at this
/// point and no recovery is attempted: losing the ability to obtain
/// backing memory is unrecoverable for an allocator.
pub fn die(label: &str) -> ! {
  let errno = std::io::Error::last_os_error();
  error!("fatal allocator error: {label} failed: {errno}");
  eprintln!("rallocator: fatal: {label} failed: {errno}");
  std::process::abort();
}
