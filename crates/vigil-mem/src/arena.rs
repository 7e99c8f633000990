//! Chunk-allocated bump arena for byte strings.

const DEFAULT_BLOCK_SIZE: usize = 256 * 1024;

/// Handle to a byte string stored in an [`Arena`].
///
/// Spans stay valid for the lifetime of the arena; the storage is released
/// only when the arena is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    block: u32,
    off: u32,
    len: u32,
}

impl Span {
    /// Length of the referenced byte string.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// `true` for the empty byte string.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Linear arena allocator.
///
/// Allocations are appended to fixed-size blocks; a request larger than the
/// block size gets a dedicated block. Individual allocations are never
/// freed; the whole arena is torn down at once. Interned strings and other
/// per-run objects live here for the duration of a collation run.
#[derive(Debug)]
pub struct Arena {
    block_size: usize,
    blocks: Vec<Vec<u8>>,
}

impl Default for Arena {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_SIZE)
    }
}

impl Arena {
    /// Create an arena that grows in blocks of `block_size` bytes.
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1),
            blocks: Vec::new(),
        }
    }

    /// Copy `bytes` into the arena, returning a stable handle.
    pub fn alloc(&mut self, bytes: &[u8]) -> Span {
        let need = bytes.len();
        let block = match self.blocks.last() {
            Some(last) if last.capacity() - last.len() >= need => self.blocks.len() - 1,
            _ => {
                self.blocks
                    .push(Vec::with_capacity(self.block_size.max(need)));
                self.blocks.len() - 1
            }
        };

        let storage = &mut self.blocks[block];
        let off = storage.len();
        storage.extend_from_slice(bytes);
        Span {
            block: block as u32,
            off: off as u32,
            len: need as u32,
        }
    }

    /// Resolve a handle back to its bytes.
    ///
    /// # Panics
    ///
    /// Panics if `span` does not come from this arena.
    pub fn get(&self, span: Span) -> &[u8] {
        let block = &self.blocks[span.block as usize];
        &block[span.off as usize..span.off as usize + span.len as usize]
    }

    /// Resolve a handle holding UTF-8 text.
    ///
    /// # Panics
    ///
    /// Panics if the span does not hold valid UTF-8 or does not come from
    /// this arena.
    pub fn get_str(&self, span: Span) -> &str {
        std::str::from_utf8(self.get(span)).expect("span does not hold UTF-8")
    }

    /// Undo `span` if it was the most recent allocation.
    ///
    /// Returns `true` when the bytes were reclaimed. Used by interning
    /// lookups that allocate a probe before knowing whether the content is
    /// already present.
    pub fn rollback(&mut self, span: Span) -> bool {
        if span.block as usize + 1 != self.blocks.len() {
            return false;
        }
        let block = &mut self.blocks[span.block as usize];
        if span.off as usize + span.len as usize == block.len() {
            block.truncate(span.off as usize);
            return true;
        }
        false
    }

    /// Total bytes currently stored.
    pub fn allocated(&self) -> usize {
        self.blocks.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::Arena;

    #[test]
    fn spans_survive_block_growth() {
        let mut arena = Arena::new(8);
        let a = arena.alloc(b"alpha");
        let b = arena.alloc(b"beta");
        let c = arena.alloc(b"a-string-larger-than-one-block");
        assert_eq!(arena.get(a), b"alpha");
        assert_eq!(arena.get(b), b"beta");
        assert_eq!(arena.get(c), b"a-string-larger-than-one-block");
        assert!(arena.blocks.len() >= 2);
    }

    #[test]
    fn empty_allocation() {
        let mut arena = Arena::default();
        let span = arena.alloc(b"");
        assert!(span.is_empty());
        assert_eq!(arena.get(span), b"");
    }

    #[test]
    fn rollback_reclaims_only_the_tail() {
        let mut arena = Arena::new(64);
        let a = arena.alloc(b"keep");
        let b = arena.alloc(b"probe");
        assert!(!arena.rollback(a));
        assert!(arena.rollback(b));
        assert_eq!(arena.allocated(), 4);
        let c = arena.alloc(b"next");
        assert_eq!(arena.get(a), b"keep");
        assert_eq!(arena.get(c), b"next");
    }

    #[test]
    fn allocated_tracks_usage() {
        let mut arena = Arena::new(64);
        arena.alloc(b"0123456789");
        arena.alloc(b"abcdef");
        assert_eq!(arena.allocated(), 16);
    }
}
