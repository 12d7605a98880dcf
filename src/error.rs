//! Crate-wide error type and process disposition.
//!
//! Every public call in this crate returns a [`Result`] wrapping
//! [`DasError`]. The error kinds follow one fixed taxonomy rather than
//! a type per call site: `Io`, `Protocol`, `PartialPacket`, `Xml`,
//! `InvalidOp`, `UnitConvert`, `ShapeMismatch`, `Assert`, `NoData`,
//! `OutOfBand`.
use std::sync::{Mutex, OnceLock};

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DasError>;

/// Crate error kinds.
///
/// One fixed family of kinds rather than one error per call site;
/// callers match on kind, not on a specific failing function.
#[derive(thiserror::Error, Debug)]
pub enum DasError {
    /// Transport-level I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed chunk tag, unexpected tag at stream start, etc.
    #[error("protocol error at offset {offset}: {msg}")]
    Protocol {
        /// Byte offset into the stream where the error was detected.
        offset: u64,
        /// Human readable description.
        msg: String,
    },

    /// A chunk's declared length ran past the available bytes.
    #[error("partial packet: {0}")]
    PartialPacket(String),

    /// XML header failed to parse.
    #[error("xml parse error at line {line}: {msg}")]
    Xml {
        /// 1-based line number reported by the parser, when known.
        line: usize,
        /// Parser message.
        msg: String,
    },

    /// Units/time algebra was asked to do something undefined (e.g. invert
    /// an epoch unit).
    #[error("invalid operation: {0}")]
    InvalidOp(String),

    /// Two units are not convertible.
    #[error("cannot convert {from} to {to}")]
    UnitConvert {
        /// Source unit, as printed.
        from: String,
        /// Destination unit, as printed.
        to: String,
    },

    /// An array or variable operation saw shapes that don't agree.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// An internal invariant was violated. These indicate a bug in this
    /// crate, not bad input.
    #[error("internal invariant violated: {0}")]
    Assert(String),

    /// Not an error condition by itself: signals "nothing to emit" (e.g. a
    /// reducer flush with no accumulated data, or a request whose time
    /// range has no matching records). Callers typically turn this into an
    /// out-of-band `NoDataInInterval` exception chunk rather than aborting.
    #[error("no data in range: {0}")]
    NoData(String),

    /// An out-of-band exception chunk was read from, or should be written
    /// to, the stream.
    #[error("out of band exception: type={kind} message={msg}")]
    OutOfBand {
        /// Exception type string as it appears on the wire (e.g.
        /// `"NoDataInInterval"`, `"ServerError"`).
        kind: String,
        /// Human readable message.
        msg: String,
    },
}

impl From<roxmltree::Error> for DasError {
    fn from(e: roxmltree::Error) -> Self {
        DasError::Xml {
            line: 0,
            msg: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for DasError {
    fn from(e: serde_json::Error) -> Self {
        DasError::Xml {
            line: e.line(),
            msg: e.to_string(),
        }
    }
}

/// Process-wide behavior when an error is raised through [`report`].
///
/// This doesn't change what a `Result` carries; it controls what the
/// *binary* built on this library should do, keeping library behavior
/// (always return a `Result`) separate from application policy
/// (exit/abort/return on error).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Print the error and call `std::process::exit`.
    Exit,
    /// Abort the process (panic) immediately.
    Abort,
    /// Just return the error to the caller. The default.
    Return,
}

impl Default for Disposition {
    fn default() -> Self {
        Disposition::Return
    }
}

static DISPOSITION: OnceLock<Mutex<Disposition>> = OnceLock::new();
const RING_CAPACITY: usize = 64;
static MESSAGE_RING: OnceLock<Mutex<Vec<String>>> = OnceLock::new();

fn disposition_cell() -> &'static Mutex<Disposition> {
    DISPOSITION.get_or_init(|| Mutex::new(Disposition::Return))
}

fn ring_cell() -> &'static Mutex<Vec<String>> {
    MESSAGE_RING.get_or_init(|| Mutex::new(Vec::with_capacity(RING_CAPACITY)))
}

/// Set the process-wide error disposition.
pub fn set_disposition(d: Disposition) {
    *disposition_cell().lock().unwrap() = d;
}

/// Get the current process-wide error disposition.
pub fn disposition() -> Disposition {
    *disposition_cell().lock().unwrap()
}

/// Record an error in the ring buffer and act according to the current
/// [`Disposition`].
///
/// Library code should generally just return a `Result`; `report` is for
/// the boundary between this crate and a binary that wants das2-style
/// "log and maybe exit" behavior without threading that policy through
/// every call site.
pub fn report(err: &DasError) {
    log::error!("{err}");
    let mut ring = ring_cell().lock().unwrap();
    if ring.len() == RING_CAPACITY {
        ring.remove(0);
    }
    ring.push(err.to_string());
    drop(ring);
    match disposition() {
        Disposition::Return => {}
        Disposition::Exit => std::process::exit(13),
        Disposition::Abort => panic!("{err}"),
    }
}

/// Return the most recent error message recorded via [`report`], if any.
pub fn last_message() -> Option<String> {
    ring_cell().lock().unwrap().last().cloned()
}

/// Return up to `n` most recent error messages, newest last.
pub fn recent_messages(n: usize) -> Vec<String> {
    let ring = ring_cell().lock().unwrap();
    let start = ring.len().saturating_sub(n);
    ring[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_buffer_caps_and_keeps_order() {
        // Other tests in this process may also call report(); just check
        // the invariant, not absolute contents.
        for i in 0..(RING_CAPACITY + 5) {
            report(&DasError::Assert(format!("case {i}")));
        }
        let msgs = recent_messages(RING_CAPACITY + 5);
        assert!(msgs.len() <= RING_CAPACITY);
        assert!(msgs.last().unwrap().contains("case"));
    }

    #[test]
    fn disposition_defaults_to_return() {
        // Can't assert the global default reliably across test threads,
        // but setting then reading must round-trip.
        set_disposition(Disposition::Return);
        assert_eq!(disposition(), Disposition::Return);
    }
}
