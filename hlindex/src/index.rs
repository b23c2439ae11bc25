//! The word to tag index used by highlighters.
//!
//! A `HighlightIndex` maps words (identifiers, keywords, ...) to an opaque
//! tag chosen by the caller, usually the name of a style class. Words are
//! copied into a [`StringArena`] so that populating an index with many
//! thousands of short words does not cause one heap allocation per word. The
//! hash table only stores arena handles next to the tags.
//!
//! The index is not internally synchronized. The intended use is to build it
//! completely on one thread and then share it read-only, for example through
//! an [`Arc`] (see [`SharedHighlightIndex`]).

use crate::arena::{ArenaStr, StringArena};
use crate::variant::Variant;
use bytesize::ByteSize;
use hashbrown::hash_table::{Entry, HashTable};
use rustc_hash::{FxHashMap, FxHasher};
use std::hash::Hasher;
use std::sync::Arc;

#[cfg(feature = "instance-counters")]
use std::sync::atomic::{AtomicUsize, Ordering};

/// Tag type of indexes decoded from a [`Variant`]. All words of one group
/// share the same allocation.
pub type TagName = Arc<str>;

/// A highlight index with shared ownership. Cloning it is the equivalent of
/// taking another reference; the index is freed when the last one is dropped.
pub type SharedHighlightIndex<T> = Arc<HighlightIndex<T>>;

#[cfg(feature = "instance-counters")]
static INSTANCES: AtomicUsize = AtomicUsize::new(0);

/// Number of `HighlightIndex` values currently alive in this process.
#[cfg(feature = "instance-counters")]
pub fn instance_count() -> usize {
    INSTANCES.load(Ordering::Relaxed)
}

struct IndexEntry<T> {
    word: ArenaStr,
    tag: T,
}

#[inline]
fn hash_word(word: &[u8]) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(word);
    hasher.finish()
}

pub struct HighlightIndex<T> {
    table: HashTable<IndexEntry<T>>,
    arena: StringArena,
}

impl<T> HighlightIndex<T> {
    pub fn new() -> HighlightIndex<T> {
        Self::with_arena(StringArena::default())
    }

    /// Creates an index whose arena allocates chunks of `chunk_size` bytes.
    pub fn with_chunk_size(chunk_size: usize) -> HighlightIndex<T> {
        Self::with_arena(StringArena::new(chunk_size))
    }

    fn with_arena(arena: StringArena) -> HighlightIndex<T> {
        #[cfg(feature = "instance-counters")]
        INSTANCES.fetch_add(1, Ordering::Relaxed);

        HighlightIndex {
            table: HashTable::new(),
            arena,
        }
    }

    /// Associates `word` with `tag`.
    ///
    /// Empty words are ignored. If `word` is already present the existing tag
    /// is kept and `tag` is dropped.
    pub fn insert(&mut self, word: &str, tag: T) {
        if word.is_empty() {
            return;
        }

        let word = word.as_bytes();
        let hash = hash_word(word);
        let HighlightIndex { table, arena } = self;

        let entry = table.entry(
            hash,
            |e| arena.get(e.word) == word,
            |e| hash_word(arena.get(e.word)),
        );

        if let Entry::Vacant(vacant) = entry {
            let word = arena.alloc(word);
            vacant.insert(IndexEntry { word, tag });
        }
    }

    /// Returns the tag stored for `word`, comparing by content.
    pub fn lookup(&self, word: &str) -> Option<&T> {
        let word = word.as_bytes();
        let arena = &self.arena;

        self.table
            .find(hash_word(word), |e| arena.get(e.word) == word)
            .map(|e| &e.tag)
    }

    /// Number of distinct words.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Bytes consumed in the arena by stored words, terminators included.
    pub fn arena_bytes(&self) -> usize {
        self.arena.bytes_allocated()
    }

    pub fn arena_chunks(&self) -> usize {
        self.arena.num_chunks()
    }

    /// Iterates over all `(word, tag)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> + '_ {
        let arena = &self.arena;
        self.table.iter().map(move |e| (word_str(arena, e.word), &e.tag))
    }

    /// Logs the number of entries and the arena consumption.
    pub fn dump(&self) {
        log::info!(
            "HighlightIndex ({:p}): {} entries, {} in arena ({} chunks)",
            self,
            self.len(),
            ByteSize::b(self.arena_bytes() as u64),
            self.arena_chunks(),
        );
    }
}

// Words only ever enter the arena through `insert`, which takes `&str`.
fn word_str(arena: &StringArena, word: ArenaStr) -> &str {
    match std::str::from_utf8(arena.get(word)) {
        Ok(s) => s,
        Err(_) => unreachable!("HighlightIndex: arena word is not valid UTF-8"),
    }
}

impl<T: AsRef<str>> HighlightIndex<T> {
    /// Groups the words by the name of their tag.
    ///
    /// The result is a dictionary of tag name to the list of words that
    /// resolve to it. Neither the order of the groups nor the order of the
    /// words inside a group is meaningful.
    pub fn to_variant(&self) -> Variant {
        let mut groups: FxHashMap<&str, Vec<String>> = FxHashMap::default();

        for (word, tag) in self.iter() {
            groups
                .entry(tag.as_ref())
                .or_default()
                .push(word.to_owned());
        }

        Variant::Dict(
            groups
                .into_iter()
                .map(|(tag, words)| (tag.to_owned(), Variant::StrArray(words)))
                .collect(),
        )
    }
}

impl HighlightIndex<TagName> {
    /// Builds an index from a payload produced by [`to_variant`](Self::to_variant).
    ///
    /// `None` yields an empty index. Boxed values are unwrapped, and groups
    /// whose value is not a list of strings are skipped.
    pub fn from_variant(variant: Option<&Variant>) -> HighlightIndex<TagName> {
        Self::from_variant_with_chunk_size(variant, crate::arena::default_chunk_size())
    }

    pub fn from_variant_with_chunk_size(
        variant: Option<&Variant>,
        chunk_size: usize,
    ) -> HighlightIndex<TagName> {
        let mut index = HighlightIndex::with_chunk_size(chunk_size);

        let variant = match variant {
            Some(variant) => variant.unboxed(),
            None => return index,
        };

        let entries = match variant {
            Variant::Dict(entries) => entries,
            other => {
                log::warn!(
                    "HighlightIndex: expected a dictionary payload, found `{}`",
                    other.type_string()
                );
                return index;
            }
        };

        for (tag_name, value) in entries {
            match value.unboxed() {
                Variant::StrArray(words) => {
                    let tag: TagName = Arc::from(tag_name.as_str());
                    for word in words {
                        index.insert(word, tag.clone());
                    }
                }
                other => {
                    log::debug!(
                        "HighlightIndex: skipping `{}`, value has type `{}`",
                        tag_name,
                        other.type_string()
                    );
                }
            }
        }

        index
    }
}

impl<T> Default for HighlightIndex<T> {
    fn default() -> Self {
        HighlightIndex::new()
    }
}

impl<T> Drop for HighlightIndex<T> {
    fn drop(&mut self) {
        #[cfg(feature = "instance-counters")]
        INSTANCES.fetch_sub(1, Ordering::Relaxed);
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for HighlightIndex<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
