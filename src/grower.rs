//! Heap extension primitives.
//!
//! A grower hands the allocator a contiguous region that only ever grows, the
//! way `sbrk(2)` moves the program break.

use std::{alloc, ptr::NonNull};

use libc::{c_void, intptr_t, sbrk};

use crate::{
  align::{ALIGNMENT, checked_align},
  error::HeapError,
};

/// A monotonic, contiguous heap.
///
/// # Safety
///
/// Implementors must return memory that is readable and writable for the
/// lifetime of the grower, and each successful `extend` must return the break
/// as it was before the call, so that consecutive extensions are contiguous
/// unless someone else moved the break in between.
pub unsafe trait HeapGrower {
  /// Current end of the heap.
  fn current_break(&self) -> usize;

  /// Moves the break forward by `delta` bytes and returns the old break.
  fn extend(
    &mut self,
    delta: usize,
  ) -> Result<NonNull<u8>, HeapError>;
}

/// Grows the process data segment with `sbrk(2)`.
///
/// The program break is shared with everything else in the process that calls
/// `sbrk`, so contiguity only holds as long as nobody else does.
#[derive(Debug, Default)]
pub struct SbrkGrower;

impl SbrkGrower {
  pub const fn new() -> Self {
    Self
  }
}

unsafe impl HeapGrower for SbrkGrower {
  fn current_break(&self) -> usize {
    unsafe { sbrk(0) as usize }
  }

  fn extend(
    &mut self,
    delta: usize,
  ) -> Result<NonNull<u8>, HeapError> {
    let increment =
      intptr_t::try_from(delta).map_err(|_| HeapError::TooLarge { requested: delta })?;

    let address = unsafe { sbrk(increment) };

    if address == usize::MAX as *mut c_void {
      return Err(HeapError::OutOfMemory { requested: delta });
    }

    NonNull::new(address.cast()).ok_or(HeapError::OutOfMemory { requested: delta })
  }
}

/// Grows inside a fixed, private buffer.
///
/// Useful for independent heaps and for tests: the buffer is aligned to
/// [`ALIGNMENT`] and running past its capacity fails like a real
/// out-of-memory condition.
pub struct ArenaGrower {
  base: NonNull<u8>,
  layout: alloc::Layout,
  used: usize,
}

impl ArenaGrower {
  /// Reserves a buffer of `capacity` bytes, rounded up to the alignment unit.
  ///
  /// # Panics
  ///
  /// Panics if the rounded capacity exceeds `isize::MAX` bytes.
  pub fn new(capacity: usize) -> Self {
    let layout = checked_align(capacity.max(ALIGNMENT))
      .and_then(|size| alloc::Layout::from_size_align(size, ALIGNMENT).ok());
    let Some(layout) = layout else {
      panic!("arena capacity of {capacity} bytes is too large");
    };

    let base = unsafe { alloc::alloc(layout) };
    let Some(base) = NonNull::new(base) else {
      alloc::handle_alloc_error(layout);
    };

    Self {
      base,
      layout,
      used: 0,
    }
  }

  pub fn capacity(&self) -> usize {
    self.layout.size()
  }

  /// Bytes handed out so far.
  pub fn used(&self) -> usize {
    self.used
  }

  pub fn base(&self) -> usize {
    self.base.as_ptr() as usize
  }
}

unsafe impl HeapGrower for ArenaGrower {
  fn current_break(&self) -> usize {
    self.base() + self.used
  }

  fn extend(
    &mut self,
    delta: usize,
  ) -> Result<NonNull<u8>, HeapError> {
    let remaining = self.capacity() - self.used;
    if delta > remaining {
      return Err(HeapError::OutOfMemory { requested: delta });
    }

    let old = unsafe { self.base.add(self.used) };
    self.used += delta;
    Ok(old)
  }
}

impl Drop for ArenaGrower {
  fn drop(&mut self) {
    unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) }
  }
}
