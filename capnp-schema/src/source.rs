//! Types related to source files.

use std::fmt;
use std::ops::Range;

/// Byte offsets into source files.
pub type BytePos = u32;

/// The largest source text that byte positions can address.
pub const MAX_SOURCE_LEN: usize = u32::MAX as usize;

/// Byte ranges in source files.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct ByteRange {
    start: BytePos,
    end: BytePos,
}

impl fmt::Debug for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteRange({}..{})", self.start, self.end)
    }
}

impl ByteRange {
    pub const fn new(start: BytePos, end: BytePos) -> Self {
        Self { start, end }
    }

    /// An empty range at the given position.
    pub const fn empty(pos: BytePos) -> Self {
        Self::new(pos, pos)
    }

    pub const fn start(&self) -> BytePos {
        self.start
    }

    pub const fn end(&self) -> BytePos {
        self.end
    }

    pub fn merge(self, other: Self) -> Self {
        Self::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl From<ByteRange> for Range<usize> {
    fn from(range: ByteRange) -> Self {
        (range.start as usize)..(range.end as usize)
    }
}
