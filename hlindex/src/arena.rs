//! A chunked, append-only string arena.
//!
//! Every string handed to [`StringArena::alloc`] is copied, together with a
//! trailing NUL byte, into a large fixed-size chunk. Chunks are never resized
//! or freed before the arena itself is dropped, so the [`ArenaStr`] handle
//! returned for a string stays valid for the whole lifetime of the arena.
//!
//! Strings that do not fit into a regular chunk get a dedicated chunk of their
//! own. The currently active chunk is kept, so that small strings allocated
//! afterwards continue to fill it up.
//!
//! The layout of the chunk list after allocating `"foo"`, a string larger
//! than the chunk size, and `"bar"` looks like this:
//!
//! ```ignore
//!     chunk 0 (active): ['f', 'o', 'o', 0, 'b', 'a', 'r', 0, ...unused...]
//!     chunk 1:          [...oversized string..., 0]
//! ```

/// Fallback chunk size for hosts where the page size cannot be queried.
const FALLBACK_CHUNK_SIZE: usize = 4096;

const TERMINATOR: u8 = 0;

/// The chunk size used by [`StringArena::default`]: the virtual memory page
/// size of the host.
pub fn default_chunk_size() -> usize {
    page_size()
}

#[cfg(unix)]
fn page_size() -> usize {
    // SAFETY: `sysconf` has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        FALLBACK_CHUNK_SIZE
    }
}

#[cfg(not(unix))]
fn page_size() -> usize {
    FALLBACK_CHUNK_SIZE
}

/// An `ArenaStr` identifies a string stored in a [`StringArena`].
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub struct ArenaStr {
    chunk: u32,
    offset: u32,
    len: u32,
}

impl ArenaStr {
    /// Length of the string in bytes, not counting the terminator.
    #[inline]
    pub fn len(self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.len == 0
    }
}

pub struct StringArena {
    chunk_size: usize,
    chunks: Vec<Box<[u8]>>,
    // Index of the chunk small strings are currently appended to.
    active: Option<usize>,
    // Write position inside the active chunk.
    pos: usize,
    bytes_allocated: usize,
}

impl StringArena {
    pub fn new(chunk_size: usize) -> StringArena {
        assert!(chunk_size <= u32::MAX as usize);

        StringArena {
            chunk_size: chunk_size.max(1),
            chunks: Vec::new(),
            active: None,
            pos: 0,
            bytes_allocated: 0,
        }
    }

    /// Copies `bytes` into the arena and returns a handle to the copy.
    pub fn alloc(&mut self, bytes: &[u8]) -> ArenaStr {
        assert!(bytes.len() < u32::MAX as usize);

        let size = bytes.len() + 1;

        let (chunk, offset) = if size > self.chunk_size {
            self.chunks.push(vec![0; size].into_boxed_slice());
            (self.chunks.len() - 1, 0)
        } else {
            match self.active {
                Some(active) if self.pos + size <= self.chunks[active].len() => {
                    let offset = self.pos;
                    self.pos += size;
                    (active, offset)
                }
                _ => {
                    self.chunks
                        .push(vec![0; self.chunk_size].into_boxed_slice());
                    let active = self.chunks.len() - 1;
                    self.active = Some(active);
                    self.pos = size;
                    (active, 0)
                }
            }
        };

        let mem = &mut self.chunks[chunk][offset..offset + size];
        mem[..bytes.len()].copy_from_slice(bytes);
        mem[bytes.len()] = TERMINATOR;

        self.bytes_allocated += size;

        ArenaStr {
            chunk: chunk as u32,
            offset: offset as u32,
            len: bytes.len() as u32,
        }
    }

    /// Returns the bytes of a string previously allocated in this arena.
    ///
    /// Panics if `s` was not produced by this arena.
    #[inline]
    pub fn get(&self, s: ArenaStr) -> &[u8] {
        let start = s.offset as usize;
        &self.chunks[s.chunk as usize][start..start + s.len as usize]
    }

    /// Like [`get`](Self::get) but includes the NUL terminator.
    pub fn get_with_nul(&self, s: ArenaStr) -> &[u8] {
        let start = s.offset as usize;
        &self.chunks[s.chunk as usize][start..=start + s.len as usize]
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn num_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Number of bytes handed out so far, terminators included.
    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    /// Total size of all chunks.
    pub fn capacity(&self) -> usize {
        self.chunks.iter().map(|c| c.len()).sum()
    }
}

impl Default for StringArena {
    fn default() -> Self {
        StringArena::new(default_chunk_size())
    }
}

impl std::fmt::Debug for StringArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StringArena")
            .field("chunk_size", &self.chunk_size)
            .field("num_chunks", &self.chunks.len())
            .field("bytes_allocated", &self.bytes_allocated)
            .finish()
    }
}
