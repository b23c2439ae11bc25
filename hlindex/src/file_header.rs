//! All highlight index files start with a common header: four magic bytes
//! followed by the file format version as a little endian `u32`. This module
//! contains the functions to write and verify that header.

use crate::serialization::SerializationSink;
use byteorder::{ByteOrder, LittleEndian};
use std::error::Error;
use std::path::Path;

pub const CURRENT_FILE_FORMAT_VERSION: u32 = 1;
pub const FILE_MAGIC_HIGHLIGHT_INDEX: &[u8; 4] = b"HLIX";

/// The file extension used for persisted highlight indexes.
pub const FILE_EXTENSION: &str = "hlix";

pub const FILE_HEADER_SIZE: usize = 8;

pub fn write_file_header(
    sink: &SerializationSink,
    file_magic: &[u8; 4],
) -> Result<(), Box<dyn Error + Send + Sync>> {
    sink.write_atomic(FILE_HEADER_SIZE, |bytes| {
        bytes[0..4].copy_from_slice(file_magic);
        LittleEndian::write_u32(&mut bytes[4..8], CURRENT_FILE_FORMAT_VERSION);
    })?;

    Ok(())
}

/// Checks the length and magic of the header and returns the format version
/// stored in it. The version itself is not checked.
pub fn read_file_header(
    bytes: &[u8],
    expected_magic: &[u8; 4],
    diagnostic_file_path: Option<&Path>,
    stream_tag: &str,
) -> Result<u32, Box<dyn Error + Send + Sync>> {
    let diagnostic_file_path = diagnostic_file_path.unwrap_or(Path::new("<in-memory>"));

    if bytes.len() < FILE_HEADER_SIZE {
        let msg = format!(
            "Error reading {} stream in file `{}`: Expected file to contain at least `{:?}` bytes but found `{:?}` bytes",
            stream_tag,
            diagnostic_file_path.display(),
            FILE_HEADER_SIZE,
            bytes.len()
        );

        return Err(From::from(msg));
    }

    let actual_magic = &bytes[0..4];

    if actual_magic != expected_magic {
        let msg = format!(
            "Error reading {} stream in file `{}`: Expected file magic `{:?}` but found `{:?}`",
            stream_tag,
            diagnostic_file_path.display(),
            expected_magic,
            actual_magic
        );

        return Err(From::from(msg));
    }

    Ok(LittleEndian::read_u32(&bytes[4..8]))
}

pub fn verify_file_header(
    bytes: &[u8],
    expected_magic: &[u8; 4],
    diagnostic_file_path: Option<&Path>,
    stream_tag: &str,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let file_format_version =
        read_file_header(bytes, expected_magic, diagnostic_file_path, stream_tag)?;

    if file_format_version != CURRENT_FILE_FORMAT_VERSION {
        let msg = format!(
            "Error reading {} stream in file `{}`: Expected file format version {} but found `{}`",
            stream_tag,
            diagnostic_file_path
                .unwrap_or(Path::new("<in-memory>"))
                .display(),
            CURRENT_FILE_FORMAT_VERSION,
            file_format_version
        );

        return Err(From::from(msg));
    }

    Ok(())
}

pub fn strip_file_header(data: &[u8]) -> &[u8] {
    &data[FILE_HEADER_SIZE..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let data_sink = SerializationSink::new_in_memory();

        write_file_header(&data_sink, FILE_MAGIC_HIGHLIGHT_INDEX).unwrap();

        let data = data_sink.into_bytes().unwrap();

        verify_file_header(&data, FILE_MAGIC_HIGHLIGHT_INDEX, None, "test").unwrap();
        assert_eq!(
            read_file_header(&data, FILE_MAGIC_HIGHLIGHT_INDEX, None, "test").unwrap(),
            CURRENT_FILE_FORMAT_VERSION
        );
        assert!(strip_file_header(&data).is_empty());
    }

    #[test]
    fn invalid_magic() {
        let data_sink = SerializationSink::new_in_memory();
        write_file_header(&data_sink, b"NONO").unwrap();
        let data = data_sink.into_bytes().unwrap();

        assert!(verify_file_header(&data, FILE_MAGIC_HIGHLIGHT_INDEX, None, "test").is_err());
        assert!(read_file_header(&data, FILE_MAGIC_HIGHLIGHT_INDEX, None, "test").is_err());
    }

    #[test]
    fn other_version() {
        let mut data = FILE_MAGIC_HIGHLIGHT_INDEX.to_vec();
        data.extend_from_slice(&(CURRENT_FILE_FORMAT_VERSION + 1).to_le_bytes());

        assert!(verify_file_header(&data, FILE_MAGIC_HIGHLIGHT_INDEX, None, "test").is_err());
        assert_eq!(
            read_file_header(&data, FILE_MAGIC_HIGHLIGHT_INDEX, None, "test").unwrap(),
            CURRENT_FILE_FORMAT_VERSION + 1
        );
    }

    #[test]
    fn read_reports_short_and_foreign_headers() {
        let short = read_file_header(b"HLI", FILE_MAGIC_HIGHLIGHT_INDEX, None, "test")
            .unwrap_err()
            .to_string();
        assert!(short.contains("at least `8` bytes"), "{}", short);

        let foreign = read_file_header(
            b"NONO\x01\x00\x00\x00",
            FILE_MAGIC_HIGHLIGHT_INDEX,
            Some(Path::new("foreign.hlix")),
            "test",
        )
        .unwrap_err()
        .to_string();
        assert!(foreign.contains("file magic"), "{}", foreign);
        assert!(foreign.contains("foreign.hlix"), "{}", foreign);
    }

    #[test]
    fn incomplete_file_header() {
        let data_sink = SerializationSink::new_in_memory();
        write_file_header(&data_sink, FILE_MAGIC_HIGHLIGHT_INDEX).unwrap();
        let data = data_sink.into_bytes().unwrap();

        for len in 0..FILE_HEADER_SIZE {
            assert!(
                verify_file_header(&data[0..len], FILE_MAGIC_HIGHLIGHT_INDEX, None, "test")
                    .is_err()
            );
        }
    }
}
