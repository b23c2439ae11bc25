use parking_lot::Mutex;
use std::convert::TryInto;
use std::fmt::Debug;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Position of a write inside a `SerializationSink`.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub struct Addr(pub u32);

const BUFFER_SIZE: usize = 1024 * 64;

/// An append-only byte sink. Writes are buffered and can be issued from
/// several threads; each `write_atomic` call ends up as one contiguous range.
#[derive(Debug)]
pub struct SerializationSink {
    data: Mutex<Inner>,
}

/// The `BackingStorage` is what the data gets written to.
trait BackingStorage: Write + Send + Debug {
    fn drain_bytes(&mut self) -> io::Result<Vec<u8>>;
}

impl BackingStorage for fs::File {
    fn drain_bytes(&mut self) -> io::Result<Vec<u8>> {
        Err(io::Error::new(
            io::ErrorKind::Other,
            "cannot extract the bytes of a file-backed sink",
        ))
    }
}

impl BackingStorage for Vec<u8> {
    fn drain_bytes(&mut self) -> io::Result<Vec<u8>> {
        Ok(std::mem::take(self))
    }
}

#[derive(Debug)]
struct Inner {
    file: Box<dyn BackingStorage>,
    buffer: Vec<u8>,
    buf_pos: usize,
    addr: u32,
}

impl Inner {
    fn flush(&mut self) -> io::Result<()> {
        if self.buf_pos > 0 {
            self.file.write_all(&self.buffer[..self.buf_pos])?;
            self.buf_pos = 0;
        }
        self.file.flush()
    }

    fn bump_addr(&mut self, num_bytes: usize) -> io::Result<Addr> {
        let curr_addr = self.addr;
        self.addr = (num_bytes as u64 + curr_addr as u64)
            .try_into()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "sink exceeds 4 GiB"))?;
        Ok(Addr(curr_addr))
    }
}

impl SerializationSink {
    pub fn new_in_memory() -> SerializationSink {
        Self::with_storage(Box::new(Vec::new()))
    }

    /// Creates a sink writing to `path`, creating parent directories as needed.
    pub fn from_path(path: &Path) -> io::Result<SerializationSink> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = fs::File::create(path)?;

        Ok(Self::with_storage(Box::new(file)))
    }

    fn with_storage(file: Box<dyn BackingStorage>) -> SerializationSink {
        SerializationSink {
            data: Mutex::new(Inner {
                file,
                buffer: vec![0; BUFFER_SIZE],
                buf_pos: 0,
                addr: 0,
            }),
        }
    }

    /// Returns all data written so far. Only in-memory sinks support this.
    pub fn into_bytes(self) -> io::Result<Vec<u8>> {
        let mut data = self.data.lock();
        data.flush()?;
        data.file.drain_bytes()
    }

    /// Reserves `num_bytes` bytes, lets `write` fill them in, and returns the
    /// address they were written to.
    #[inline]
    pub fn write_atomic<W>(&self, num_bytes: usize, write: W) -> io::Result<Addr>
    where
        W: FnOnce(&mut [u8]),
    {
        let mut data = self.data.lock();
        let curr_addr = data.bump_addr(num_bytes)?;

        let Inner {
            ref mut file,
            ref mut buffer,
            ref mut buf_pos,
            addr: _,
        } = *data;

        let buf_start = *buf_pos;
        let buf_end = buf_start + num_bytes;

        if buf_end <= buffer.len() {
            // We have enough space in the buffer, just write the data to it.
            write(&mut buffer[buf_start..buf_end]);
            *buf_pos = buf_end;
        } else {
            // We don't have enough space in the buffer, so flush to disk
            file.write_all(&buffer[..buf_start])?;

            if num_bytes <= buffer.len() {
                // There's enough space in the buffer, after flushing
                write(&mut buffer[0..num_bytes]);
                *buf_pos = num_bytes;
            } else {
                // Even after flushing the buffer there isn't enough space, so
                // fall back to dynamic allocation
                let mut temp_buffer = vec![0; num_bytes];
                write(&mut temp_buffer[..]);
                file.write_all(&temp_buffer[..])?;
                *buf_pos = 0;
            }
        }

        Ok(curr_addr)
    }

    pub fn write_bytes_atomic(&self, bytes: &[u8]) -> io::Result<Addr> {
        if bytes.len() < 128 {
            // For "small" pieces of data, use the regular implementation so we
            // don't repeatedly flush an almost empty buffer to disk.
            return self.write_atomic(bytes.len(), |sink| sink.copy_from_slice(bytes));
        }

        let mut data = self.data.lock();
        let curr_addr = data.bump_addr(bytes.len())?;

        // Flush what is buffered, then write the input directly, skipping the
        // write buffer.
        if data.buf_pos > 0 {
            let Inner {
                ref mut file,
                ref buffer,
                ref mut buf_pos,
                addr: _,
            } = *data;
            file.write_all(&buffer[..*buf_pos])?;
            *buf_pos = 0;
        }

        data.file.write_all(bytes)?;

        Ok(curr_addr)
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.data.lock().addr as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn flush(&self) -> io::Result<()> {
        self.data.lock().flush()
    }
}

impl Drop for SerializationSink {
    fn drop(&mut self) {
        if let Err(e) = self.data.get_mut().flush() {
            log::error!("SerializationSink: failed to flush on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn addresses_are_contiguous() {
        let sink = SerializationSink::new_in_memory();

        assert_eq!(sink.write_bytes_atomic(b"abc").unwrap(), Addr(0));
        let addr = sink.write_atomic(2, |bytes| bytes.copy_from_slice(b"de"));
        assert_eq!(addr.unwrap(), Addr(3));
        assert_eq!(sink.len(), 5);
        assert_eq!(sink.into_bytes().unwrap(), b"abcde".to_vec());
    }

    #[test]
    fn large_writes_bypass_the_buffer() {
        let sink = SerializationSink::new_in_memory();
        let big = vec![7u8; BUFFER_SIZE + 10];

        sink.write_bytes_atomic(b"head").unwrap();
        assert_eq!(sink.write_bytes_atomic(&big).unwrap(), Addr(4));
        let addr = sink.write_atomic(BUFFER_SIZE * 2, |bytes| bytes.fill(1));
        assert_eq!(addr.unwrap(), Addr(4 + big.len() as u32));
        sink.write_bytes_atomic(b"tail").unwrap();

        let bytes = sink.into_bytes().unwrap();
        assert_eq!(bytes.len(), 4 + big.len() + BUFFER_SIZE * 2 + 4);
        assert_eq!(&bytes[..4], b"head");
        assert_eq!(&bytes[4..4 + big.len()], &big[..]);
        assert!(bytes[4 + big.len()..bytes.len() - 4].iter().all(|&b| b == 1));
        assert_eq!(&bytes[bytes.len() - 4..], b"tail");
    }

    #[test]
    fn concurrent_writers() {
        let sink = Arc::new(SerializationSink::new_in_memory());

        let handles: Vec<_> = (0..4u8)
            .map(|t| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        sink.write_atomic(4, |bytes| bytes.fill(t)).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let bytes = Arc::try_unwrap(sink).unwrap().into_bytes().unwrap();
        assert_eq!(bytes.len(), 4 * 4 * 1000);
        for record in bytes.chunks(4) {
            assert!(record.iter().all(|&b| b == record[0]));
        }
    }
}
