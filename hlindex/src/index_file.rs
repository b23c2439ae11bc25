//! Persisting highlight indexes and moving them between processes.
//!
//! An index file has the following layout:
//!
//! ```ignore
//!     [file header: "HLIX" <u32 version>]
//!     [<u32 metadata length> <metadata as JSON>]
//!     [payload: encoded `Variant`, see the `variant` module]
//! ```
//!
//! The metadata can be read without decoding the payload, which is useful for
//! tools that only want to display some statistics.

use crate::file_header::{
    strip_file_header, verify_file_header, write_file_header, FILE_MAGIC_HIGHLIGHT_INDEX,
};
use crate::index::{HighlightIndex, TagName};
use crate::serialization::SerializationSink;
use crate::variant::Variant;
use byteorder::{ByteOrder, LittleEndian};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const GENERATOR: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

fn system_time_to_nanos<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let nanos = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    serializer.serialize_u64(nanos)
}

fn system_time_from_nanos<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
where
    D: Deserializer<'de>,
{
    let duration_from_epoch = Duration::from_nanos(u64::deserialize(deserializer)?);
    UNIX_EPOCH
        .checked_add(duration_from_epoch)
        .ok_or_else(|| de::Error::custom("timestamp not representable as SystemTime"))
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(
        serialize_with = "system_time_to_nanos",
        deserialize_with = "system_time_from_nanos"
    )]
    pub created_at: SystemTime,
    /// Number of words in the payload.
    pub entries: usize,
    /// Arena bytes of the index that was written.
    pub arena_bytes: usize,
    pub generator: String,
}

impl Metadata {
    /// Metadata describing `payload`, for payloads that were not produced from
    /// an index. The counts are those of the index the payload decodes to, so
    /// repeated and empty words are not counted.
    pub fn for_payload(payload: &Variant) -> Metadata {
        HighlightIndex::from_variant(Some(payload)).metadata()
    }
}

/// A decoded index file: metadata plus the still undecoded-to-index payload.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexFile {
    pub metadata: Metadata,
    pub payload: Variant,
}

impl IndexFile {
    pub fn new(payload: Variant) -> IndexFile {
        IndexFile {
            metadata: Metadata::for_payload(&payload),
            payload,
        }
    }

    pub fn from_bytes(
        bytes: &[u8],
        diagnostic_file_path: Option<&Path>,
    ) -> Result<IndexFile, Box<dyn Error + Send + Sync>> {
        let (metadata, payload) = split_metadata(bytes, diagnostic_file_path)?;
        let payload = Variant::decode(payload)?;

        Ok(IndexFile { metadata, payload })
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<IndexFile, Box<dyn Error + Send + Sync>> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes, Some(path))
    }

    pub fn write_to(&self, sink: &SerializationSink) -> Result<(), Box<dyn Error + Send + Sync>> {
        write_file_header(sink, FILE_MAGIC_HIGHLIGHT_INDEX)?;

        let metadata = serde_json::to_string(&self.metadata)?;
        sink.write_atomic(4, |bytes| {
            LittleEndian::write_u32(bytes, metadata.len() as u32);
        })?;
        sink.write_bytes_atomic(metadata.as_bytes())?;

        let payload = &self.payload;
        sink.write_atomic(payload.serialized_size(), |bytes| payload.serialize(bytes))?;

        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>> {
        let sink = SerializationSink::new_in_memory();
        self.write_to(&sink)?;
        Ok(sink.into_bytes()?)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error + Send + Sync>> {
        let sink = SerializationSink::from_path(path.as_ref())?;
        self.write_to(&sink)?;
        sink.flush()?;
        Ok(())
    }

    pub fn into_index(self) -> HighlightIndex<TagName> {
        HighlightIndex::from_variant(Some(&self.payload))
    }
}

/// Reads only the metadata block of an index file.
pub fn read_metadata(
    bytes: &[u8],
    diagnostic_file_path: Option<&Path>,
) -> Result<Metadata, Box<dyn Error + Send + Sync>> {
    split_metadata(bytes, diagnostic_file_path).map(|(metadata, _)| metadata)
}

fn split_metadata<'a>(
    bytes: &'a [u8],
    diagnostic_file_path: Option<&Path>,
) -> Result<(Metadata, &'a [u8]), Box<dyn Error + Send + Sync>> {
    verify_file_header(
        bytes,
        FILE_MAGIC_HIGHLIGHT_INDEX,
        diagnostic_file_path,
        "highlight index",
    )?;

    let rest = strip_file_header(bytes);
    if rest.len() < 4 {
        Err("IndexFile: missing metadata block")?;
    }

    let len = LittleEndian::read_u32(&rest[0..4]) as usize;
    let rest = &rest[4..];
    if rest.len() < len {
        Err(format!(
            "IndexFile: metadata block of {} bytes exceeds the remaining {} bytes",
            len,
            rest.len()
        ))?;
    }

    let metadata: Metadata = serde_json::from_slice(&rest[..len])?;

    Ok((metadata, &rest[len..]))
}

impl<T: AsRef<str>> HighlightIndex<T> {
    pub fn metadata(&self) -> Metadata {
        Metadata {
            created_at: SystemTime::now(),
            entries: self.len(),
            arena_bytes: self.arena_bytes(),
            generator: GENERATOR.to_string(),
        }
    }

    pub fn to_index_file(&self) -> IndexFile {
        IndexFile {
            metadata: self.metadata(),
            payload: self.to_variant(),
        }
    }

    /// Encodes the index for transport to another thread or process.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>> {
        self.to_index_file().to_bytes()
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn Error + Send + Sync>> {
        let path = path.as_ref();
        self.to_index_file().write(path)?;
        log::debug!("HighlightIndex: saved {} entries to {}", self.len(), path.display());
        Ok(())
    }
}

impl HighlightIndex<TagName> {
    pub fn from_bytes(
        bytes: &[u8],
    ) -> Result<HighlightIndex<TagName>, Box<dyn Error + Send + Sync>> {
        Ok(IndexFile::from_bytes(bytes, None)?.into_index())
    }

    pub fn load<P: AsRef<Path>>(
        path: P,
    ) -> Result<HighlightIndex<TagName>, Box<dyn Error + Send + Sync>> {
        let index = IndexFile::read(path.as_ref())?.into_index();
        log::debug!(
            "HighlightIndex: loaded {} entries from {}",
            index.len(),
            path.as_ref().display()
        );
        Ok(index)
    }
}
