use std::{io::Read, ptr};

use libc::sbrk;
use rallocator::{ExplicitAllocator, SbrkGrower};

/// Waits until the user presses ENTER, if `RALLOC_PAUSE` is set.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change the program break.
fn block_until_enter_pressed() {
  if std::env::var_os("RALLOC_PAUSE").is_none() {
    return;
  }
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
/// The program break is the upper boundary of the heap managed via brk/sbrk.
unsafe fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn print_alloc(
  allocator: &ExplicitAllocator<SbrkGrower>,
  size: usize,
  address: *mut u8,
) {
  println!(
    "Allocated {} bytes ({} usable), address = {:?}, program break = {:?}",
    size,
    unsafe { allocator.usable_size(address) },
    address,
    unsafe { sbrk(0) }
  );
}

fn print_stats(allocator: &ExplicitAllocator<SbrkGrower>) {
  let stats = allocator.stats();
  println!(
    "    heap = {} bytes, {} allocated / {} free blocks, largest free = {} bytes, check = {:?}",
    stats.heap_bytes,
    stats.allocated_blocks,
    stats.free_blocks,
    stats.largest_free,
    allocator.check_heap(),
  );
}

fn main() {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  let mut allocator = match ExplicitAllocator::new(SbrkGrower::new()) {
    Ok(allocator) => allocator,
    Err(err) => {
      eprintln!("cannot set up the heap: {err}");
      std::process::exit(1);
    }
  };

  unsafe {
    print_program_break("start");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 1) Three neighbouring allocations: A, B, C.
    // --------------------------------------------------------------------
    println!("\n[1] Allocate A (u32), B ([u8; 40]), C ([u64; 8])");
    let a = allocator.allocate(4);
    print_alloc(&allocator, 4, a);
    let b = allocator.allocate(40);
    print_alloc(&allocator, 40, b);
    let c = allocator.allocate(64);
    print_alloc(&allocator, 64, c);

    (a as *mut u32).write(0xDEADBEEF);
    ptr::write_bytes(b, 0xAB, 40);
    println!("[1] A = 0x{:X}, B filled with 0xAB", (a as *mut u32).read());
    print_stats(&allocator);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 2) Free A and C, then B: the three blocks merge into one.
    // --------------------------------------------------------------------
    allocator.deallocate(a);
    allocator.deallocate(c);
    println!("\n[2] Freed A and C");
    print_stats(&allocator);

    allocator.deallocate(b);
    println!("[2] Freed B, neighbours coalesced");
    print_stats(&allocator);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 3) A small request reuses the start of the merged block and splits it.
    // --------------------------------------------------------------------
    let d = allocator.allocate(2);
    println!("\n[3] Allocate [u8; 2] (check reuse of freed block)");
    print_alloc(&allocator, 2, d);
    println!(
      "[3] d == a? {}",
      if d == a {
        "Yes, it reused the freed block"
      } else {
        "No, it allocated somewhere else"
      }
    );
    print_stats(&allocator);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 4) Grow d with reallocate and zero-allocate an array.
    // --------------------------------------------------------------------
    d.write(7);
    let d = allocator.reallocate(d, 1000);
    println!("\n[4] Reallocated d to 1000 bytes, first byte still {}", d.read());
    let zeroed = allocator.allocate_zeroed(16, 8);
    println!("[4] allocate_zeroed(16, 8) = {:?}", zeroed);
    print_stats(&allocator);

    // --------------------------------------------------------------------
    // 5) Allocate a large block to observe heap growth.
    // --------------------------------------------------------------------
    print_program_break("before large alloc");

    let big = allocator.allocate(64 * 1024);
    println!("\n[5] Allocate large 64 KiB block");
    print_alloc(&allocator, 64 * 1024, big);

    print_program_break("after large alloc");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 6) Free everything. The heap keeps its size: memory goes back to the
    //    free list, never to the OS.
    // --------------------------------------------------------------------
    allocator.deallocate(big);
    allocator.deallocate(zeroed);
    allocator.deallocate(d);
    println!("\n[6] Freed everything");
    print_stats(&allocator);
    print_program_break("end");
  }
}
