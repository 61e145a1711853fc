//! # rallocator - A Custom Memory Allocator Library
//!
//! This crate provides an **explicit free-list allocator** with boundary tags,
//! exposing `malloc`/`free`/`realloc`/`calloc` semantics over a single heap
//! that only ever grows, the way `sbrk(2)` grows the data segment.
//!
//! ## Overview
//!
//! ```text
//!   Explicit Free List:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                         HEAP MEMORY                                  │
//!   │                                                                      │
//!   │   ┌─────┬─────┬─────┬─────┬─────┬─────┐                              │
//!   │   │ A1  │ F1  │ A2  │ F2  │ A3  │ F3  │                              │
//!   │   └─────┴──┬──┴─────┴──┬──┴─────┴──┬──┘                              │
//!   │      ▲     │     ▲     │           │   ▲                             │
//!   │      │     └─────┼─────┼───────────┘   │                             │
//!   │    first         │     └─► free list   last                          │
//!   │                  │                                                   │
//!   │          heap start + padding                      Program Break     │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Free blocks are linked through their own payload bytes.
//!   Allocation: first fit over the free list, then grow the heap.
//!   Deallocation: push on the list, merge with free neighbours at once.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   rallocator
//!   ├── align      - Alignment unit and the align! macro
//!   ├── block      - Boundary-tagged block handle (internal)
//!   ├── free_list  - Intrusive doubly linked free list (internal)
//!   ├── grower     - Heap extension primitives (sbrk, arena)
//!   ├── explicit   - ExplicitAllocator: allocate, free, realloc, calloc
//!   ├── check      - Heap consistency checker and statistics
//!   ├── config     - Allocator configuration
//!   └── error      - HeapError and HeapViolation
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use rallocator::{ArenaGrower, ExplicitAllocator};
//!
//! let mut allocator = ExplicitAllocator::new(ArenaGrower::new(64 * 1024)).unwrap();
//!
//! unsafe {
//!     // Allocate memory for a u64
//!     let ptr = allocator.allocate(8) as *mut u64;
//!
//!     // Use the memory
//!     *ptr = 42;
//!     assert_eq!(*ptr, 42);
//!
//!     // Free the memory
//!     allocator.deallocate(ptr as *mut u8);
//! }
//!
//! assert!(allocator.check_heap().is_ok());
//! ```
//!
//! ## How It Works
//!
//! Every block carries its size and an allocation bit in a header word, and
//! the same word again in a footer:
//!
//! ```text
//!   Single Allocation:
//!   ┌───────────────┬────────────────────────────────┬───────────────┐
//!   │    Header     │         User Data              │    Footer     │
//!   │  size | 1     │                                │  size | 1     │
//!   │   8 bytes     │   N bytes usable, 16-aligned   │   8 bytes     │
//!   └───────────────┴────────────────────────────────┴───────────────┘
//!                   ▲
//!                   └── Pointer returned to user
//! ```
//!
//! The header lets the allocator step to the right neighbour, the footer
//! lets it step to the left one, so freeing a block merges it with free
//! neighbours in constant time. A free block reuses its payload for the
//! `prev`/`next` links of the free list, which is why the smallest block is
//! [`MIN_BLOCK_SIZE`] bytes.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: No synchronization primitives
//! - **Never shrinks**: Freed memory is reused but not returned to the OS
//! - **First fit**: Fast and simple, not the least fragmenting policy
//! - **Break contiguity**: a heap holding blocks stops growing once someone
//!   else moves the break past its end (freed blocks are still reused); an
//!   empty heap restarts at the new break
//!
//! ## Safety
//!
//! This crate is inherently unsafe as it deals with raw memory management.
//! All allocation and deallocation operations require `unsafe` blocks.

pub mod align;
mod block;
mod check;
mod config;
mod error;
mod explicit;
mod free_list;
mod grower;

pub use block::{HEADER_SIZE, MIN_BLOCK_SIZE, OVERHEAD};
pub use check::HeapStats;
pub use config::Config;
pub use error::{HeapError, HeapViolation};
pub use explicit::ExplicitAllocator;
pub use grower::{ArenaGrower, HeapGrower, SbrkGrower};
