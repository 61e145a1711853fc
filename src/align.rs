/// Alignment unit of every block size and every payload pointer.
///
/// Two machine words: 16 bytes on a 64 bit machine, 8 on a 32 bit one.
pub const ALIGNMENT: usize = 2 * core::mem::size_of::<usize>();

/// Rounds the given size up to the next multiple of [`ALIGNMENT`].
///
/// The expression must not overflow; use [`checked_align`] for sizes that come
/// straight from a caller.
///
/// # Examples
///
/// ```rust
/// use rallocator::align;
/// use rallocator::align::ALIGNMENT;
///
/// match ALIGNMENT {
///     16 => assert_eq!(align!(13), 16), // 64 bit machine.
///     8 => assert_eq!(align!(11), 16),  // 32 bit machine.
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + $crate::align::ALIGNMENT - 1) & !($crate::align::ALIGNMENT - 1)
  };
}

/// Like [`align!`], but returns `None` instead of wrapping around.
pub const fn checked_align(value: usize) -> Option<usize> {
  match value.checked_add(ALIGNMENT - 1) {
    Some(v) => Some(v & !(ALIGNMENT - 1)),
    None => None,
  }
}

/// Returns true if `value` is a multiple of [`ALIGNMENT`].
#[inline]
pub const fn is_aligned(value: usize) -> bool {
  value & (ALIGNMENT - 1) == 0
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_align() {
    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (ALIGNMENT * i + 1)..=(ALIGNMENT * (i + 1));

      let expected_alignment = ALIGNMENT * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align!(size));
        assert_eq!(Some(expected), checked_align(size));
      }
    }
  }

  #[test]
  fn test_checked_align_overflow() {
    assert_eq!(checked_align(0), Some(0));
    assert_eq!(checked_align(usize::MAX), None);
    assert_eq!(checked_align(usize::MAX - ALIGNMENT + 2), None);
    assert_eq!(
      checked_align(usize::MAX - ALIGNMENT + 1),
      Some(usize::MAX - ALIGNMENT + 1)
    );
  }

  #[test]
  fn test_is_aligned() {
    assert!(is_aligned(0));
    assert!(is_aligned(ALIGNMENT * 3));
    assert!(!is_aligned(ALIGNMENT + 1));
    assert!(!is_aligned(ALIGNMENT / 2));
  }
}
