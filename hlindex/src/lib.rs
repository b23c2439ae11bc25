//! `hlindex` maps words to highlight tags.
//!
//! A highlighter tokenizes a source buffer, fills a [`HighlightIndex`] with
//! the identifiers it found and the style each one should get, and later
//! queries the index once per token while highlighting. Words are stored in a
//! chunked [`StringArena`], so an index with many thousands of entries needs
//! only a handful of allocations.
//!
//! Indexes can be exported to a [`Variant`] (a dictionary of tag name to word
//! list) and persisted or sent to another process as an [`IndexFile`]:
//!
//! ```
//! use hlindex::HighlightIndex;
//!
//! let mut index = HighlightIndex::new();
//! index.insert("GObject", "c:type");
//! index.insert("g_object_ref", "c:function-name");
//!
//! let bytes = index.to_bytes().unwrap();
//! let decoded = HighlightIndex::from_bytes(&bytes).unwrap();
//!
//! assert_eq!(decoded.lookup("GObject").map(|t| &**t), Some("c:type"));
//! assert_eq!(decoded.lookup("GtkWidget"), None);
//! ```

mod arena;
mod file_header;
mod index;
mod index_file;
mod serialization;
mod variant;

pub mod c_lang;
pub mod testing_common;

pub use crate::arena::{default_chunk_size, ArenaStr, StringArena};
pub use crate::file_header::{
    read_file_header, strip_file_header, verify_file_header, write_file_header,
    CURRENT_FILE_FORMAT_VERSION, FILE_EXTENSION, FILE_HEADER_SIZE, FILE_MAGIC_HIGHLIGHT_INDEX,
};
#[cfg(feature = "instance-counters")]
pub use crate::index::instance_count;
pub use crate::index::{HighlightIndex, SharedHighlightIndex, TagName};
pub use crate::index_file::{read_metadata, IndexFile, Metadata};
pub use crate::serialization::{Addr, SerializationSink};
pub use crate::variant::Variant;
