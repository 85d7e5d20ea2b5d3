use std::fmt;
use std::ops::Range;

/// Errors raised when a slice does not address a valid part of a split.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartitionError {
    #[error("slice count must be greater than zero")]
    ZeroSlices,

    #[error("slice index {index} out of range for {count} slices")]
    IndexOutOfRange { index: usize, count: usize },
}

/// Which contiguous slice of an ordered work list a worker owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionSlice {
    index: usize,
    count: usize,
}

impl PartitionSlice {
    pub fn new(index: usize, count: usize) -> Result<Self, PartitionError> {
        if count == 0 {
            return Err(PartitionError::ZeroSlices);
        }
        if index >= count {
            return Err(PartitionError::IndexOutOfRange { index, count });
        }
        Ok(Self { index, count })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Bounds of this slice within a list of `len` items.
    ///
    /// The first `len % count` slices hold one extra item.
    pub fn bounds(&self, len: usize) -> Range<usize> {
        let base = len / self.count;
        let extra = len % self.count;
        let start = self.index * base + self.index.min(extra);
        let size = base + usize::from(self.index < extra);
        start..start + size
    }

    /// Borrow this slice out of `items`.
    pub fn select<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        &items[self.bounds(items.len())]
    }
}

impl fmt::Display for PartitionSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index, self.count)
    }
}

/// Split `items` into `slice_count` balanced contiguous parts and return
/// part `slice_index`.
pub fn partition<T: Clone>(
    items: &[T],
    slice_count: usize,
    slice_index: usize,
) -> Result<Vec<T>, PartitionError> {
    let slice = PartitionSlice::new(slice_index, slice_count)?;
    Ok(slice.select(items).to_vec())
}
