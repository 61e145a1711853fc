//! Boundary-tagged heap blocks.
//!
//! Every raw read and write of heap metadata goes through [`Block`]. The rest
//! of the crate only moves `Block` handles around.
//!
//! ```text
//!   Allocated block:
//!   ┌──────────┬──────────────────────────────────┬──────────┐
//!   │ size | 1 │            payload               │ size | 1 │
//!   └──────────┴──────────────────────────────────┴──────────┘
//!
//!   Free block:
//!   ┌──────────┬──────────┬──────────┬────────────┬──────────┐
//!   │ size | 0 │   prev   │   next   │   unused   │ size | 0 │
//!   └──────────┴──────────┴──────────┴────────────┴──────────┘
//!   ▲          ▲                                             ▲
//!   block      payload                              block + size
//! ```

use core::{fmt, mem, ptr::NonNull};

use crate::align;

/// Size of the tag word at the start of a block.
pub const HEADER_SIZE: usize = mem::size_of::<usize>();

/// Size of the tag word at the end of a block.
pub const FOOTER_SIZE: usize = mem::size_of::<usize>();

/// Per-block bookkeeping bytes.
pub const OVERHEAD: usize = HEADER_SIZE + FOOTER_SIZE;

/// Smallest block able to hold the free list links once freed.
pub const MIN_BLOCK_SIZE: usize = align!(OVERHEAD + 2 * mem::size_of::<*mut u8>());

const ALLOCATED: usize = 1;

/// Layout of the first bytes of a free block.
#[repr(C)]
struct FreeNode {
  header: usize,
  prev: *mut FreeNode,
  next: *mut FreeNode,
}

/// Handle to a block on the heap, identified by the address of its header.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block(NonNull<usize>);

impl Block {
  /// Interprets `addr` as the header of a block.
  ///
  /// # Safety
  ///
  /// `addr` must be word aligned and point into heap memory owned by the
  /// allocator with at least `MIN_BLOCK_SIZE` bytes behind it.
  #[inline]
  pub unsafe fn from_addr(addr: usize) -> Self {
    Self(unsafe { NonNull::new_unchecked(addr as *mut usize) })
  }

  /// Recovers the block owning a payload pointer.
  ///
  /// # Safety
  ///
  /// `payload` must have been returned by [`Block::payload`].
  #[inline]
  pub unsafe fn from_payload(payload: NonNull<u8>) -> Self {
    unsafe { Self(payload.sub(HEADER_SIZE).cast()) }
  }

  #[inline]
  pub fn addr(self) -> usize {
    self.0.as_ptr() as usize
  }

  /// Address one past the last byte of this block.
  ///
  /// # Safety
  ///
  /// The header must be readable.
  #[inline]
  pub unsafe fn end(self) -> usize {
    self.addr() + unsafe { self.size() }
  }

  /// Raw header word, size and allocation bit together.
  ///
  /// # Safety
  ///
  /// The header must be readable.
  #[inline]
  pub unsafe fn header(self) -> usize {
    unsafe { self.0.as_ptr().read() }
  }

  /// Raw footer word. Only meaningful if the header holds a sane size.
  ///
  /// # Safety
  ///
  /// The whole block must be readable.
  #[inline]
  pub unsafe fn footer(self) -> usize {
    unsafe { (self.footer_addr() as *const usize).read() }
  }

  /// # Safety
  ///
  /// The header must be readable.
  #[inline]
  pub unsafe fn size(self) -> usize {
    unsafe { self.header() & !ALLOCATED }
  }

  /// # Safety
  ///
  /// The header must be readable.
  #[inline]
  pub unsafe fn is_allocated(self) -> bool {
    unsafe { self.header() & ALLOCATED != 0 }
  }

  /// Writes the header and the footer at `self + size - FOOTER_SIZE`.
  ///
  /// # Safety
  ///
  /// `[self, self + size)` must be heap memory owned by the allocator and
  /// `size` a multiple of the alignment unit.
  #[inline]
  pub unsafe fn set_header(
    self,
    size: usize,
    allocated: bool,
  ) {
    debug_assert!(align::is_aligned(size) && size >= MIN_BLOCK_SIZE);
    let word = size | allocated as usize;
    unsafe {
      self.0.as_ptr().write(word);
      ((self.addr() + size - FOOTER_SIZE) as *mut usize).write(word);
    }
  }

  #[inline]
  pub fn payload(self) -> NonNull<u8> {
    unsafe { self.0.cast::<u8>().add(HEADER_SIZE) }
  }

  /// Bytes a caller may use in this block.
  ///
  /// # Safety
  ///
  /// The header must be readable.
  #[inline]
  pub unsafe fn usable_size(self) -> usize {
    unsafe { self.size() - OVERHEAD }
  }

  /// The block physically following this one.
  ///
  /// # Safety
  ///
  /// The caller must know that `self.end()` lies before the heap end.
  #[inline]
  pub unsafe fn next_adjacent(self) -> Self {
    unsafe { Self::from_addr(self.end()) }
  }

  /// The block physically preceding this one, found through its footer.
  ///
  /// # Safety
  ///
  /// The caller must know that `self` is not the first block on the heap.
  #[inline]
  pub unsafe fn prev_adjacent(self) -> Self {
    unsafe {
      let footer = ((self.addr() - FOOTER_SIZE) as *const usize).read();
      Self::from_addr(self.addr() - (footer & !ALLOCATED))
    }
  }

  #[inline]
  fn footer_addr(self) -> usize {
    // SAFETY: callers of `footer` guarantee the header is readable.
    self.addr() + unsafe { self.size() } - FOOTER_SIZE
  }

  #[inline]
  fn node(self) -> *mut FreeNode {
    self.0.as_ptr().cast()
  }

  /// Previous entry in the free list.
  ///
  /// # Safety
  ///
  /// The block must be free and linked into a free list.
  #[inline]
  pub unsafe fn prev_free(self) -> Option<Self> {
    unsafe { NonNull::new((*self.node()).prev).map(|p| Self(p.cast())) }
  }

  /// Next entry in the free list.
  ///
  /// # Safety
  ///
  /// The block must be free and linked into a free list.
  #[inline]
  pub unsafe fn next_free(self) -> Option<Self> {
    unsafe { NonNull::new((*self.node()).next).map(|p| Self(p.cast())) }
  }

  /// # Safety
  ///
  /// The block must be free and at least `MIN_BLOCK_SIZE` bytes long.
  #[inline]
  pub unsafe fn set_prev_free(
    self,
    prev: Option<Self>,
  ) {
    unsafe { (*self.node()).prev = prev.map_or(core::ptr::null_mut(), Self::node) }
  }

  /// # Safety
  ///
  /// The block must be free and at least `MIN_BLOCK_SIZE` bytes long.
  #[inline]
  pub unsafe fn set_next_free(
    self,
    next: Option<Self>,
  ) {
    unsafe { (*self.node()).next = next.map_or(core::ptr::null_mut(), Self::node) }
  }
}

impl fmt::Debug for Block {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "Block({:#x})", self.addr())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::align::ALIGNMENT;

  #[repr(C, align(16))]
  struct Scratch([usize; 32]);

  fn scratch() -> Box<Scratch> {
    Box::new(Scratch([0; 32]))
  }

  #[test]
  fn test_min_block_holds_links() {
    assert!(MIN_BLOCK_SIZE >= OVERHEAD + 2 * mem::size_of::<usize>());
    assert_eq!(MIN_BLOCK_SIZE % ALIGNMENT, 0);
  }

  #[test]
  fn test_tags_written_at_both_ends() {
    let mut mem = scratch();
    let base = mem.0.as_mut_ptr() as usize;

    unsafe {
      let block = Block::from_addr(base);
      block.set_header(4 * ALIGNMENT, true);

      assert_eq!(block.size(), 4 * ALIGNMENT);
      assert!(block.is_allocated());
      assert_eq!(block.header(), block.footer());
      assert_eq!(block.end(), base + 4 * ALIGNMENT);
      assert_eq!(block.usable_size(), 4 * ALIGNMENT - OVERHEAD);

      block.set_header(4 * ALIGNMENT, false);
      assert!(!block.is_allocated());
      assert_eq!(block.header(), 4 * ALIGNMENT);
      assert_eq!(block.footer(), 4 * ALIGNMENT);
    }
  }

  #[test]
  fn test_payload_round_trip() {
    let mut mem = scratch();
    let base = mem.0.as_mut_ptr() as usize;

    unsafe {
      let block = Block::from_addr(base);
      let payload = block.payload();
      assert_eq!(payload.as_ptr() as usize, base + HEADER_SIZE);
      assert_eq!(Block::from_payload(payload), block);
    }
  }

  #[test]
  fn test_neighbours_through_tags() {
    let mut mem = scratch();
    let base = mem.0.as_mut_ptr() as usize;

    unsafe {
      let left = Block::from_addr(base);
      left.set_header(2 * ALIGNMENT, false);
      let right = Block::from_addr(base + 2 * ALIGNMENT);
      right.set_header(3 * ALIGNMENT, true);

      assert_eq!(left.next_adjacent(), right);
      assert_eq!(right.prev_adjacent(), left);

      // The allocation bit in the footer must not leak into the step size.
      left.set_header(2 * ALIGNMENT, true);
      assert_eq!(right.prev_adjacent(), left);
    }
  }

  #[test]
  fn test_free_links() {
    let mut mem = scratch();
    let base = mem.0.as_mut_ptr() as usize;

    unsafe {
      let a = Block::from_addr(base);
      let b = Block::from_addr(base + MIN_BLOCK_SIZE);
      a.set_header(MIN_BLOCK_SIZE, false);
      b.set_header(MIN_BLOCK_SIZE, false);

      a.set_next_free(Some(b));
      a.set_prev_free(None);
      b.set_prev_free(Some(a));
      b.set_next_free(None);

      assert_eq!(a.next_free(), Some(b));
      assert_eq!(a.prev_free(), None);
      assert_eq!(b.prev_free(), Some(a));
      assert_eq!(b.next_free(), None);
      // Links live in the payload; the tags are untouched.
      assert_eq!(a.header(), a.footer());
    }
  }
}
