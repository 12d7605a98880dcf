//! Byte-level transport: files, sockets, pipes, and in-memory buffers,
//! with an optional zlib wrap and a parsed wire "mode string"
//! (direction + schema version + compression).
//!
//! Stays at the byte level deliberately — framing and chunk dispatch
//! belong to [`crate::codec`]. This module's only job is handing the
//! codec a `Read`/`Write` trait object that already speaks plain bytes,
//! whatever's underneath it.

use crate::error::{DasError, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{BufReader, BufWriter, Read, Write};

/// Staging buffer size for buffered readers/writers: large, infrequent
/// syscalls over small frequent ones.
pub const STAGING_BUFFER_BYTES: usize = 64 * 1024;

/// Wire schema generation.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Version {
    V2,
    V3,
}

/// Transfer direction a mode string requests.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Direction {
    Read,
    Write,
}

/// A parsed transport mode string, e.g. `"r2"` (read, v2, uncompressed),
/// `"w3z"` (write, v3, zlib-wrapped).
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ModeSpec {
    pub direction: Direction,
    pub version: Version,
    pub compressed: bool,
}

impl ModeSpec {
    pub fn parse(s: &str) -> Result<ModeSpec> {
        let mut chars = s.chars();
        let direction = match chars.next() {
            Some('r') => Direction::Read,
            Some('w') => Direction::Write,
            _ => return Err(bad_mode(s)),
        };
        let version = match chars.next() {
            Some('2') => Version::V2,
            Some('3') => Version::V3,
            _ => return Err(bad_mode(s)),
        };
        let compressed = match chars.next() {
            None => false,
            Some('z') => true,
            _ => return Err(bad_mode(s)),
        };
        if chars.next().is_some() {
            return Err(bad_mode(s));
        }
        Ok(ModeSpec { direction, version, compressed })
    }
}

fn bad_mode(s: &str) -> DasError {
    DasError::InvalidOp(format!("unrecognized transport mode string '{s}'"))
}

/// A concrete byte source: file, TCP socket, an optional TLS session,
/// standard input, or an in-memory buffer (used heavily in tests).
pub enum Endpoint<R> {
    Raw(R),
}

/// Wrap a raw byte source in buffering and, if requested, zlib
/// decompression. Returns a boxed trait object so callers (the codec
/// dispatch loop) don't need to be generic over every transport kind.
pub fn open_source<R: Read + Send + 'static>(
    raw: R,
    mode: ModeSpec,
) -> Result<Box<dyn Read + Send>> {
    if mode.direction != Direction::Read {
        return Err(DasError::InvalidOp("open_source requires a read-mode spec".into()));
    }
    let buffered = BufReader::with_capacity(STAGING_BUFFER_BYTES, raw);
    if mode.compressed {
        Ok(Box::new(ZlibDecoder::new(buffered)))
    } else {
        Ok(Box::new(buffered))
    }
}

/// Wrap a raw byte sink in buffering and, if requested, zlib
/// compression.
pub fn open_sink<W: Write + Send + 'static>(
    raw: W,
    mode: ModeSpec,
) -> Result<Box<dyn Write + Send>> {
    if mode.direction != Direction::Write {
        return Err(DasError::InvalidOp("open_sink requires a write-mode spec".into()));
    }
    let buffered = BufWriter::with_capacity(STAGING_BUFFER_BYTES, raw);
    if mode.compressed {
        Ok(Box::new(ZlibEncoder::new(buffered, Compression::default())))
    } else {
        Ok(Box::new(buffered))
    }
}

/// Open a file by path as a source/sink per `mode`'s direction.
pub fn open_file(path: &std::path::Path, mode: ModeSpec) -> Result<Endpoint<std::fs::File>> {
    let file = match mode.direction {
        Direction::Read => std::fs::File::open(path)?,
        Direction::Write => std::fs::File::create(path)?,
    };
    Ok(Endpoint::Raw(file))
}

/// Connect to a das2 server over plain TCP and wrap the connection per
/// `mode`. Blocking, single read-or-write direction at a time, same
/// shape as `TcpSource::new` in the block-graph world: one
/// `TcpStream::connect`, no retry policy left to this layer.
pub fn open_socket(addr: &str, port: u16, mode: ModeSpec) -> Result<Box<dyn Read + Send>> {
    let stream = std::net::TcpStream::connect((addr, port))?;
    open_source(stream, mode)
}

/// Spawn a subprocess and treat its stdout as a byte source, e.g. a
/// das2 reader program invoked as a local pipe instead of a network
/// round trip.
pub fn spawn_pipe_source(command: &str, args: &[&str], mode: ModeSpec) -> Result<Box<dyn Read + Send>> {
    let child = std::process::Command::new(command)
        .args(args)
        .stdout(std::process::Stdio::piped())
        .spawn()?;
    let stdout = child
        .stdout
        .ok_or_else(|| DasError::Io(std::io::Error::other("subprocess has no stdout pipe")))?;
    open_source(stdout, mode)
}

/// Connect to a das2 server over TLS. Available only with the `tls`
/// feature; `native_tls` handles certificate validation, this function
/// just maps its errors into [`DasError::Io`] the way the rest of this
/// module reports transport failures.
#[cfg(feature = "tls")]
pub fn open_tls_client(addr: &str, port: u16, mode: ModeSpec) -> Result<Box<dyn Read + Send>> {
    let stream = std::net::TcpStream::connect((addr, port))?;
    let connector = native_tls::TlsConnector::new()
        .map_err(|e| DasError::Io(std::io::Error::other(e)))?;
    let tls = connector
        .connect(addr, stream)
        .map_err(|e| DasError::Io(std::io::Error::other(e)))?;
    open_source(tls, mode)
}

/// An in-memory byte buffer, useful as both source and sink in tests
/// and for embedding a stream inside a larger process (e.g. piping a
/// dataset builder's output straight into a reducer without touching
/// disk).
pub fn memory_source(bytes: Vec<u8>, mode: ModeSpec) -> Result<Box<dyn Read + Send>> {
    open_source(std::io::Cursor::new(bytes), mode)
}

pub fn memory_sink(mode: ModeSpec) -> Result<(Box<dyn Write + Send>, std::sync::Arc<std::sync::Mutex<Vec<u8>>>)> {
    let buf = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let writer = SharedBufWriter { buf: buf.clone() };
    Ok((open_sink(writer, mode)?, buf))
}

/// A `Write` implementation that appends into a shared, lockable
/// `Vec<u8>` so a test (or an in-process consumer) can inspect bytes
/// written so far without owning the writer.
struct SharedBufWriter {
    buf: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

impl Write for SharedBufWriter {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;

    #[test]
    fn parses_mode_strings() {
        let m = ModeSpec::parse("r2").unwrap();
        assert_eq!(m.direction, Direction::Read);
        assert_eq!(m.version, Version::V2);
        assert!(!m.compressed);

        let m = ModeSpec::parse("w3z").unwrap();
        assert_eq!(m.direction, Direction::Write);
        assert_eq!(m.version, Version::V3);
        assert!(m.compressed);
    }

    #[test]
    fn rejects_garbage_mode_strings() {
        assert!(ModeSpec::parse("x2").is_err());
        assert!(ModeSpec::parse("r9").is_err());
        assert!(ModeSpec::parse("r2zz").is_err());
    }

    #[test]
    fn spawn_pipe_source_reads_subprocess_stdout() {
        let mode = ModeSpec::parse("r2").unwrap();
        let mut source = spawn_pipe_source("echo", &["hello das2"], mode).unwrap();
        let mut out = String::new();
        source.read_to_string(&mut out).unwrap();
        assert_eq!(out.trim(), "hello das2");
    }

    #[test]
    fn memory_roundtrip_with_compression() {
        let write_mode = ModeSpec::parse("w2z").unwrap();
        let (mut sink, buf) = memory_sink(write_mode).unwrap();
        sink.write_all(b"hello das2").unwrap();
        drop(sink);

        let compressed = buf.lock().unwrap().clone();
        let read_mode = ModeSpec::parse("r2z").unwrap();
        let mut source = memory_source(compressed, read_mode).unwrap();
        let mut out = String::new();
        source.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello das2");
    }
}
