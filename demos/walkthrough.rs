//! Interactive walkthrough of `Allocator`, adapted from the original
//! `rallocator` bump-allocator demo. Run with:
//!
//! ```text
//! cargo run --example walkthrough
//! ```
//!
//! Useful when you want to inspect memory state with tools like `pmap`,
//! `htop`, `gdb`, or just visually track how allocations move the program
//! break and come and go from the mapped-region list.

use std::io::Read;
use std::ptr;

use rallocator::Allocator;
use rallocator::kernel;

fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break = {:?}",
    label,
    std::process::id(),
    kernel::current_break(),
  );
}

fn main() {
  env_logger::init();

  let allocator = Allocator::new();

  print_program_break("start");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) A small heap allocation triggers preallocation of the whole pool.
  // --------------------------------------------------------------------
  println!("\n[1] allocate(100)");
  let p = allocator.allocate(100);
  println!("[1] payload = {p:?}");
  unsafe { (p as *mut u32).write(0xDEADBEEF) };
  println!(
    "[1] value written = 0x{:X}",
    unsafe { (p as *mut u32).read() }
  );
  print_program_break("after first allocation");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) A second allocation, then freeing the first and re-allocating a
  //    smaller size: best-fit should hand back the same address.
  // --------------------------------------------------------------------
  println!("\n[2] allocate(200), free(p), allocate(96)");
  let q = allocator.allocate(200);
  allocator.free(p);
  let r = allocator.allocate(96);
  println!(
    "[2] r == p? {} ({r:?} vs {p:?})",
    if r == p { "yes, best-fit reused the freed block" } else { "no" }
  );
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) A large request bypasses the heap entirely.
  // --------------------------------------------------------------------
  println!("\n[3] allocate(200_000) — routed to a fresh mapping");
  print_program_break("before large alloc");
  let m = allocator.allocate(200_000);
  println!("[3] payload = {m:?}");
  print_program_break("after large alloc (unchanged: mapped, not heap)");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Freeing the mapped region releases it immediately.
  // --------------------------------------------------------------------
  println!("\n[4] free(m) — unmaps the region");
  allocator.free(m);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) Resize that outgrows the current block: relocates or extends the
  //    break, and always preserves the original bytes.
  // --------------------------------------------------------------------
  println!("\n[5] fill q[0..50], resize(q, 5000)");
  unsafe { ptr::write_bytes(q, b'A', 50) };
  let grown = allocator.resize(q, 5000);
  let preserved = unsafe { (0..50).all(|i| *grown.add(i) == b'A') };
  println!("[5] grown = {grown:?}, bytes preserved = {preserved}");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 6) Zeroed allocation.
  // --------------------------------------------------------------------
  println!("\n[6] zeroed_allocate(1000, 1)");
  let c = allocator.zeroed_allocate(1000, 1);
  let all_zero = unsafe { (0..1000).all(|i| *c.add(i) == 0) };
  println!("[6] all 1000 bytes zero = {all_zero}");

  allocator.free(r);
  allocator.free(grown);
  allocator.free(c);

  println!("\n[7] End of walkthrough. Process will exit and the OS will reclaim all memory.");
}
