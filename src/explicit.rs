use std::ptr::{self, NonNull};

use log::{debug, error, trace, warn};

use crate::{
  align::{ALIGNMENT, checked_align},
  block::{Block, HEADER_SIZE, MIN_BLOCK_SIZE, OVERHEAD},
  config::Config,
  error::HeapError,
  free_list::FreeList,
  grower::HeapGrower,
};

/// Explicit free-list allocator with boundary tags and immediate coalescing.
///
/// All state lives in this value, so independent heaps can coexist. The
/// allocator is not thread safe; share it behind a lock if you must.
pub struct ExplicitAllocator<G: HeapGrower> {
  pub(crate) grower: G,
  pub(crate) config: Config,
  /// Where the first block starts (or will start).
  pub(crate) heap_start: usize,
  pub(crate) first: Option<Block>,
  pub(crate) last: Option<Block>,
  pub(crate) free: FreeList,
}

/// Block size needed to serve a request of `size` payload bytes.
fn block_size_for(size: usize) -> Option<usize> {
  size
    .checked_add(OVERHEAD)
    .and_then(checked_align)
    .map(|size| size.max(MIN_BLOCK_SIZE))
}

impl<G: HeapGrower> ExplicitAllocator<G> {
  /// Creates an allocator over `grower` and initializes it.
  pub fn new(grower: G) -> Result<Self, HeapError> {
    Self::with_config(grower, Config::default())
  }

  pub fn with_config(
    grower: G,
    config: Config,
  ) -> Result<Self, HeapError> {
    let mut allocator = Self {
      grower,
      config,
      heap_start: 0,
      first: None,
      last: None,
      free: FreeList::new(),
    };

    allocator.init()?;

    Ok(allocator)
  }

  /// Forgets every block and starts an empty heap at the current break.
  ///
  /// The break is padded so that the first payload lands on an alignment
  /// boundary. Memory of the previous heap is not given back.
  pub fn init(&mut self) -> Result<(), HeapError> {
    self.first = None;
    self.last = None;
    self.free = FreeList::new();

    self.start_at_break()
  }

  /// Moves `heap_start` to the current break, padded so that the first
  /// payload is aligned. Only valid while the heap holds no blocks.
  fn start_at_break(&mut self) -> Result<(), HeapError> {
    let brk = self.grower.current_break();
    let padding = (ALIGNMENT - (brk + HEADER_SIZE) % ALIGNMENT) % ALIGNMENT;

    self.heap_start = if padding > 0 {
      let old = self.grower.extend(padding)?.as_ptr() as usize;
      if old != brk {
        return Err(HeapError::Discontiguous {
          expected: brk,
          actual: old,
        });
      }
      old + padding
    } else {
      brk
    };

    debug!(
      "heap starts at {:#x} ({} bytes of padding)",
      self.heap_start, padding
    );

    Ok(())
  }

  pub fn config(&self) -> Config {
    self.config
  }

  pub fn grower(&self) -> &G {
    &self.grower
  }

  pub fn heap_start(&self) -> usize {
    self.heap_start
  }

  /// One past the last byte of the last block.
  pub fn heap_end(&self) -> usize {
    // SAFETY: `last` always refers to a block on the heap.
    self.last.map_or(self.heap_start, |last| unsafe { last.end() })
  }

  /// Allocates `size` bytes aligned to [`ALIGNMENT`].
  ///
  /// Returns null for a zero size and when the heap cannot grow any further.
  ///
  /// # Safety
  ///
  /// The heap must not have been corrupted by writes outside of a payload or by
  /// freeing foreign pointers.
  pub unsafe fn allocate(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    if size == 0 {
      return ptr::null_mut();
    }

    let address = unsafe { self.allocate_block(size) }
      .map_or(ptr::null_mut(), |block| block.payload().as_ptr());

    trace!("allocate({size}) = {address:?}");
    self.audit("allocate");

    address
  }

  /// Returns a payload to the heap. Null is ignored.
  ///
  /// # Safety
  ///
  /// `address` must be null or a live pointer returned by this allocator, and
  /// must not be used afterwards.
  pub unsafe fn deallocate(
    &mut self,
    address: *mut u8,
  ) {
    let Some(payload) = NonNull::new(address) else {
      return;
    };

    trace!("deallocate({address:?})");
    unsafe { self.free_block(Block::from_payload(payload)) };
    self.audit("deallocate");
  }

  /// Moves an allocation into a block of `size` bytes.
  ///
  /// A null `address` allocates, a zero `size` frees and returns null. On
  /// failure null is returned and the old allocation stays valid.
  ///
  /// # Safety
  ///
  /// Same contract as [`deallocate`](Self::deallocate) for `address`.
  pub unsafe fn reallocate(
    &mut self,
    address: *mut u8,
    size: usize,
  ) -> *mut u8 {
    let Some(old_payload) = NonNull::new(address) else {
      return unsafe { self.allocate(size) };
    };

    if size == 0 {
      unsafe { self.deallocate(address) };
      return ptr::null_mut();
    }

    unsafe {
      let Some(new_block) = self.allocate_block(size) else {
        warn!("reallocate({address:?}, {size}) failed, keeping the old block");
        return ptr::null_mut();
      };

      let old_block = Block::from_payload(old_payload);
      let count = old_block.usable_size().min(new_block.usable_size());
      ptr::copy_nonoverlapping(address, new_block.payload().as_ptr(), count);

      self.free_block(old_block);

      let new_address = new_block.payload().as_ptr();
      trace!("reallocate({address:?}, {size}) = {new_address:?}, {count} bytes moved");
      self.audit("reallocate");

      new_address
    }
  }

  /// Allocates room for `count` elements of `size` bytes, zero filled.
  ///
  /// # Safety
  ///
  /// Same contract as [`allocate`](Self::allocate).
  pub unsafe fn allocate_zeroed(
    &mut self,
    count: usize,
    size: usize,
  ) -> *mut u8 {
    let Some(total) = count.checked_mul(size) else {
      warn!("allocate_zeroed({count}, {size}) overflows");
      return ptr::null_mut();
    };

    unsafe {
      let address = self.allocate(total);

      if let Some(payload) = NonNull::new(address) {
        let usable = Block::from_payload(payload).usable_size();
        ptr::write_bytes(address, 0, usable);
      }

      address
    }
  }

  /// Bytes the caller may use behind `address`, at least what was requested.
  ///
  /// # Safety
  ///
  /// `address` must be null or a live pointer returned by this allocator.
  pub unsafe fn usable_size(
    &self,
    address: *const u8,
  ) -> usize {
    match NonNull::new(address.cast_mut()) {
      Some(payload) => unsafe { Block::from_payload(payload).usable_size() },
      None => 0,
    }
  }

  unsafe fn allocate_block(
    &mut self,
    size: usize,
  ) -> Option<Block> {
    let Some(block_size) = block_size_for(size) else {
      warn!("request of {size} bytes is too large");
      return None;
    };

    unsafe {
      match self.free.find_first_fit(block_size) {
        Some(block) => {
          self.place(block, block_size);
          Some(block)
        }
        None => self.extend_heap(block_size),
      }
    }
  }

  /// Marks a block taken off the free list as allocated, splitting off the
  /// tail if it can stand as a block of its own.
  unsafe fn place(
    &mut self,
    block: Block,
    block_size: usize,
  ) {
    unsafe {
      let found = block.size();
      let remainder = found - block_size;

      if remainder < MIN_BLOCK_SIZE {
        block.set_header(found, true);
        return;
      }

      block.set_header(block_size, true);

      let rest = Block::from_addr(block.addr() + block_size);
      rest.set_header(remainder, false);
      self.free.insert(rest);

      if self.last == Some(block) {
        self.last = Some(rest);
      }

      trace!("split {block:?}: {block_size} bytes taken, {remainder} bytes left at {rest:?}");
    }
  }

  unsafe fn extend_heap(
    &mut self,
    block_size: usize,
  ) -> Option<Block> {
    match unsafe { self.try_extend_heap(block_size) } {
      Ok(block) => Some(block),
      Err(err @ HeapError::Discontiguous { .. }) => {
        error!("cannot grow the heap: {err}");
        None
      }
      Err(err) => {
        warn!("cannot grow the heap: {err}");
        None
      }
    }
  }

  /// Appends an allocated block of `block_size` bytes at the heap end.
  ///
  /// The break must still sit at the heap end, otherwise nothing is taken
  /// from the grower. An empty heap instead restarts at the current break.
  unsafe fn try_extend_heap(
    &mut self,
    block_size: usize,
  ) -> Result<Block, HeapError> {
    let brk = self.grower.current_break();

    if self.first.is_none() && brk != self.heap_start {
      debug!("break moved to {brk:#x} before the first block, restarting the heap");
      self.start_at_break()?;
    }

    let expected = self.heap_end();
    let brk = self.grower.current_break();
    if brk != expected {
      return Err(HeapError::Discontiguous {
        expected,
        actual: brk,
      });
    }

    let address = self.grower.extend(block_size)?.as_ptr() as usize;
    if address != expected {
      return Err(HeapError::Discontiguous {
        expected,
        actual: address,
      });
    }

    unsafe {
      let block = Block::from_addr(address);
      block.set_header(block_size, true);

      if self.first.is_none() {
        self.first = Some(block);
      }
      self.last = Some(block);

      debug!("heap grown by {block_size} bytes, new end {:#x}", block.end());

      Ok(block)
    }
  }

  unsafe fn free_block(
    &mut self,
    block: Block,
  ) {
    unsafe {
      block.set_header(block.size(), false);
      self.free.insert(block);
      self.coalesce(block);
    }
  }

  /// Merges a freshly freed block with its free physical neighbours, right
  /// first, then left.
  unsafe fn coalesce(
    &mut self,
    block: Block,
  ) {
    unsafe {
      if block.end() < self.heap_end() {
        let right = block.next_adjacent();

        if !right.is_allocated() {
          trace!("merge {block:?} with right neighbour {right:?}");
          block.set_header(block.size() + right.size(), false);
          self.free.remove(right);

          if self.last == Some(right) {
            self.last = Some(block);
          }
        }
      }

      if block.addr() > self.heap_start {
        let left = block.prev_adjacent();

        if !left.is_allocated() {
          trace!("merge {block:?} with left neighbour {left:?}");
          left.set_header(left.size() + block.size(), false);
          self.free.remove(block);

          if self.last == Some(block) {
            self.last = Some(left);
          }
        }
      }
    }
  }

  fn audit(
    &self,
    operation: &str,
  ) {
    if !self.config.audit {
      return;
    }

    if let Err(violation) = self.check_heap() {
      error!("heap check after {operation} failed: {violation}");
    }
  }
}
