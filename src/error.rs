use thiserror::Error;

/// Failures of the heap extension primitive.
///
/// Allocation paths log these and return null; [`init`] hands them to the
/// caller.
///
/// [`init`]: crate::ExplicitAllocator::init
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapError {
  #[error("out of memory (requested: {requested} bytes)")]
  OutOfMemory { requested: usize },

  #[error("request of {requested} bytes cannot be expressed as a heap extension")]
  TooLarge { requested: usize },

  #[error("break at {actual:#x} does not continue the heap ending at {expected:#x}")]
  Discontiguous { expected: usize, actual: usize },
}

/// First inconsistency found by [`check_heap`].
///
/// [`check_heap`]: crate::ExplicitAllocator::check_heap
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapViolation {
  #[error("block {block:#x} has a misaligned payload")]
  Misaligned { block: usize },

  #[error("block {block:#x} has invalid size {size}")]
  BadSize { block: usize, size: usize },

  #[error("block {block:#x} of size {size} runs past the heap end {heap_end:#x}")]
  OutOfBounds {
    block: usize,
    size: usize,
    heap_end: usize,
  },

  #[error("free block {block:#x} has header {header:#x} but footer {footer:#x}")]
  TagMismatch {
    block: usize,
    header: usize,
    footer: usize,
  },

  #[error("free blocks {left:#x} and {right:#x} are adjacent")]
  AdjacentFree { left: usize, right: usize },

  #[error("free block {block:#x} is missing from the free list")]
  FreeNotListed { block: usize },

  #[error("free list entry {block:#x} is marked allocated")]
  ListedNotFree { block: usize },

  #[error("free list entry {block:#x} is not a block on the heap")]
  ListOutOfBounds { block: usize },

  #[error("free list entry {block:#x} has a broken back link")]
  BrokenBackLink { block: usize },

  #[error("free list revisits {block:#x}")]
  ListCycle { block: usize },

  #[error("heap starts with block {walked:?} but the first block is recorded as {recorded:?}")]
  FirstMismatch {
    walked: Option<usize>,
    recorded: Option<usize>,
  },

  #[error("heap walk ended at {walked:?} but the last block is recorded as {recorded:?}")]
  LastMismatch {
    walked: Option<usize>,
    recorded: Option<usize>,
  },

  #[error("blocks cover up to {covered:#x} but the heap ends at {heap_end:#x}")]
  CoverageGap { covered: usize, heap_end: usize },

  #[error("free list holds {listed} entries but the heap has {free} free blocks")]
  CountMismatch { listed: usize, free: usize },
}
