//! Heap auditing and statistics.

use std::collections::HashSet;

use crate::{
  align::is_aligned,
  block::{Block, HEADER_SIZE, MIN_BLOCK_SIZE},
  error::HeapViolation,
  explicit::ExplicitAllocator,
  grower::HeapGrower,
};

/// Summary of a walk over every block on the heap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
  /// Bytes covered by blocks, from the first block to the heap end.
  pub heap_bytes: usize,
  pub allocated_blocks: usize,
  pub allocated_bytes: usize,
  pub free_blocks: usize,
  pub free_bytes: usize,
  pub largest_free: usize,
}

impl<G: HeapGrower> ExplicitAllocator<G> {
  /// Walks the heap and the free list and returns the first inconsistency.
  ///
  /// Checks that every block is aligned and in bounds, that the blocks tile
  /// the heap exactly, that free blocks carry matching tags and never touch
  /// each other, and that the free list holds exactly the free blocks. Every
  /// address is bounds checked before it is read, so a corrupted heap yields
  /// a violation instead of a fault.
  pub fn check_heap(&self) -> Result<(), HeapViolation> {
    let start = self.heap_start;
    let limit = self.grower.current_break();

    let end = match self.last {
      None => start,
      Some(last) => {
        let addr = last.addr();
        if addr < start || addr >= limit || limit - addr < MIN_BLOCK_SIZE {
          return Err(HeapViolation::OutOfBounds {
            block: addr,
            size: 0,
            heap_end: limit,
          });
        }
        // SAFETY: the header lies inside the grown heap.
        let size = unsafe { last.size() };
        if size > limit - addr {
          return Err(HeapViolation::OutOfBounds {
            block: addr,
            size,
            heap_end: limit,
          });
        }
        addr + size
      }
    };

    let walked_first = (end > start).then_some(start);
    let recorded_first = self.first.map(Block::addr);
    if walked_first != recorded_first {
      return Err(HeapViolation::FirstMismatch {
        walked: walked_first,
        recorded: recorded_first,
      });
    }

    let mut free = Vec::new();
    let mut previous: Option<(usize, bool)> = None;
    let mut addr = start;

    while addr < end {
      // SAFETY: `addr` is below `end`, which is within the grown heap, and
      // both sit on the same alignment phase so a full header fits.
      let block = unsafe { Block::from_addr(addr) };
      let size = unsafe { block.size() };
      let allocated = unsafe { block.is_allocated() };

      if !is_aligned(block.payload().as_ptr() as usize) {
        return Err(HeapViolation::Misaligned { block: addr });
      }
      if size < MIN_BLOCK_SIZE || !is_aligned(size) {
        return Err(HeapViolation::BadSize { block: addr, size });
      }
      if size > limit - addr {
        return Err(HeapViolation::OutOfBounds {
          block: addr,
          size,
          heap_end: limit,
        });
      }

      if !allocated {
        // SAFETY: the whole block lies below the break.
        let (header, footer) = unsafe { (block.header(), block.footer()) };
        if header != footer {
          return Err(HeapViolation::TagMismatch {
            block: addr,
            header,
            footer,
          });
        }
        if let Some((left, false)) = previous {
          return Err(HeapViolation::AdjacentFree { left, right: addr });
        }
        free.push(block);
      }

      previous = Some((addr, allocated));
      addr += size;
    }

    if addr != end {
      return Err(HeapViolation::CoverageGap {
        covered: addr,
        heap_end: end,
      });
    }

    let walked_last = previous.map(|(addr, _)| addr);
    let recorded_last = self.last.map(Block::addr);
    if walked_last != recorded_last {
      return Err(HeapViolation::LastMismatch {
        walked: walked_last,
        recorded: recorded_last,
      });
    }

    self.check_free_list(start, end, &free)
  }

  fn check_free_list(
    &self,
    start: usize,
    end: usize,
    free: &[Block],
  ) -> Result<(), HeapViolation> {
    let known: HashSet<Block> = free.iter().copied().collect();
    let mut listed = HashSet::with_capacity(free.len());
    let mut prev = None;
    let mut current = self.free.head();

    while let Some(block) = current {
      let addr = block.addr();

      if !known.contains(&block) {
        let on_heap = addr >= start && addr < end && is_aligned(addr + HEADER_SIZE);
        // SAFETY: only read when the address is inside the heap.
        if on_heap && unsafe { block.is_allocated() } {
          return Err(HeapViolation::ListedNotFree { block: addr });
        }
        return Err(HeapViolation::ListOutOfBounds { block: addr });
      }

      if !listed.insert(block) {
        return Err(HeapViolation::ListCycle { block: addr });
      }

      // SAFETY: `block` is a free block found by the heap walk, large enough
      // to hold its links.
      let (back, next) = unsafe { (block.prev_free(), block.next_free()) };
      if back != prev {
        return Err(HeapViolation::BrokenBackLink { block: addr });
      }

      prev = Some(block);
      current = next;
    }

    if let Some(missing) = free.iter().find(|block| !listed.contains(block)) {
      return Err(HeapViolation::FreeNotListed {
        block: missing.addr(),
      });
    }

    if self.free.len() != free.len() {
      return Err(HeapViolation::CountMismatch {
        listed: self.free.len(),
        free: free.len(),
      });
    }

    Ok(())
  }

  /// Counts blocks and bytes by walking the heap.
  ///
  /// Assumes a consistent heap; run [`check_heap`](Self::check_heap) first
  /// when in doubt.
  pub fn stats(&self) -> HeapStats {
    let mut stats = HeapStats::default();
    let end = self.heap_end();
    let mut addr = self.heap_start;

    while addr < end {
      // SAFETY: consistent heaps tile `[heap_start, heap_end)` with blocks.
      let block = unsafe { Block::from_addr(addr) };
      let size = unsafe { block.size() };
      if size == 0 {
        break;
      }

      if unsafe { block.is_allocated() } {
        stats.allocated_blocks += 1;
        stats.allocated_bytes += size;
      } else {
        stats.free_blocks += 1;
        stats.free_bytes += size;
        stats.largest_free = stats.largest_free.max(size);
      }

      addr += size;
    }

    stats.heap_bytes = end - self.heap_start;
    stats
  }
}
