//! Streams, channels and the sockets that open them.

use crate::error::Result;
use crate::node::Node;
use std::io::{self, Read, Seek, Write};

/// A stream that must be closed explicitly to release its resources and,
/// for output, to commit its content.
///
/// Closing twice is a no-op. Dropping a stream without closing it closes it
/// implicitly and logs any error.
pub trait Closable {
    fn close(&mut self) -> io::Result<()>;
}

impl<C: Closable + ?Sized> Closable for Box<C> {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// A sequential byte source.
pub trait InputStream: Read + Closable + Send {}

impl<T: Read + Closable + Send + ?Sized> InputStream for T {}

/// A byte source with random access.
pub trait InputChannel: InputStream + Seek {}

impl<T: InputStream + Seek + ?Sized> InputChannel for T {}

/// A sequential byte sink.
pub trait OutputStream: Write + Closable + Send {}

impl<T: Write + Closable + Send + ?Sized> OutputStream for T {}

/// A byte sink with random access.
pub trait OutputChannel: OutputStream + Seek {}

impl<T: OutputStream + Seek + ?Sized> OutputChannel for T {}

/// Opens streams for reading one entry. Creating a socket performs no I/O;
/// every call to `stream` or `channel` opens a new stream.
pub trait InputSocket: Send + Sync {
    /// The metadata of the entry to read.
    fn target(&self) -> Result<Node>;

    fn stream(&self) -> Result<Box<dyn InputStream>>;

    fn channel(&self) -> Result<Box<dyn InputChannel>>;
}

/// Opens streams for writing one entry.
pub trait OutputSocket: Send + Sync {
    fn stream(&self) -> Result<Box<dyn OutputStream>>;

    fn channel(&self) -> Result<Box<dyn OutputChannel>>;
}

/// Copy the content of `input` to `output`, closing both streams.
///
/// Returns the number of bytes copied.
pub fn copy(input: &dyn InputSocket, output: &dyn OutputSocket) -> Result<u64> {
    let mut source = input.stream()?;
    let mut sink = output.stream()?;
    let copied = io::copy(&mut source, &mut sink);
    let closed_source = source.close();
    let copied = copied?;
    sink.close()?;
    closed_source?;
    Ok(copied)
}

/// Seekable in-memory stream over a byte buffer.
///
/// Used by drivers to serve entries they hold in memory.
#[derive(Debug, Default)]
pub struct MemoryStream {
    cursor: io::Cursor<Vec<u8>>,
    closed: bool,
}

impl MemoryStream {
    pub fn new(content: Vec<u8>) -> Self {
        Self {
            cursor: io::Cursor::new(content),
            closed: false,
        }
    }

    /// Consume the stream and return its buffer.
    pub fn into_inner(self) -> Vec<u8> {
        self.cursor.into_inner()
    }

    fn check_open(&self) -> io::Result<()> {
        if self.closed {
            return Err(closed());
        }
        Ok(())
    }
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check_open()?;
        self.cursor.read(buf)
    }
}

impl Write for MemoryStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check_open()?;
        self.cursor.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.check_open()
    }
}

impl Seek for MemoryStream {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        self.check_open()?;
        self.cursor.seek(pos)
    }
}

impl Closable for MemoryStream {
    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// The error returned when using a closed stream.
pub fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "stream is closed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_stream_rejects_io_after_close() {
        let mut stream = MemoryStream::new(b"abc".to_vec());
        let mut buf = [0u8; 2];
        assert_eq!(stream.read(&mut buf).unwrap(), 2);
        stream.close().unwrap();
        stream.close().unwrap();
        assert_eq!(
            stream.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::BrokenPipe
        );
    }
}
