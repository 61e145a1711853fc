use crate::block::Block;

/// Intrusive, unordered, doubly linked list of free blocks.
///
/// The links live inside the free blocks themselves, so the list owns no
/// memory. New blocks are pushed at the head.
pub struct FreeList {
  head: Option<Block>,
  len: usize,
}

impl FreeList {
  pub const fn new() -> Self {
    Self { head: None, len: 0 }
  }

  #[inline]
  pub fn head(&self) -> Option<Block> {
    self.head
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.len
  }

  /// Pushes `block` onto the head of the list.
  ///
  /// # Safety
  ///
  /// `block` must be a free block that is not already in the list.
  pub unsafe fn insert(
    &mut self,
    block: Block,
  ) {
    unsafe {
      block.set_prev_free(None);
      block.set_next_free(self.head);

      if let Some(head) = self.head {
        head.set_prev_free(Some(block));
      }
    }

    self.head = Some(block);
    self.len += 1;
  }

  /// Unlinks `block` from the list.
  ///
  /// # Safety
  ///
  /// `block` must currently be linked into this list.
  pub unsafe fn remove(
    &mut self,
    block: Block,
  ) {
    unsafe {
      let prev = block.prev_free();
      let next = block.next_free();

      match prev {
        Some(prev) => prev.set_next_free(next),
        None => self.head = next,
      }

      if let Some(next) = next {
        next.set_prev_free(prev);
      }
    }

    self.len -= 1;
  }

  /// Finds the first block of at least `min_size` bytes in list order and
  /// unlinks it. The caller owns the block afterwards.
  ///
  /// # Safety
  ///
  /// Every block in the list must be a valid free block.
  pub unsafe fn find_first_fit(
    &mut self,
    min_size: usize,
  ) -> Option<Block> {
    unsafe {
      let mut current = self.head;

      while let Some(block) = current {
        if block.size() >= min_size {
          self.remove(block);
          return Some(block);
        }
        current = block.next_free();
      }

      None
    }
  }
}

impl Default for FreeList {
  fn default() -> Self {
    Self::new()
  }
}
