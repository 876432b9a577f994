//! Syscall error helpers and the transfer error type.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Shortcut to return an `io::Error::last_os_error`.
///
/// This is effectively `return Err(::std::io::Error::last_os_error().into());`.
macro_rules! io_bail_last {
    () => {
        return Err(::std::io::Error::last_os_error().into());
    };
}
pub(crate) use io_bail_last;

/// Non-panicking assertion: shortcut for returning an `io::Error` if the condition is not met.
/// Essentially: `if !expr { io_bail_last!() }`.
macro_rules! io_assert {
    ($value:expr) => {
        if !$value {
            $crate::error::io_bail_last!();
        }
    };
}
pub(crate) use io_assert;

/// A failed bounded transfer.
///
/// Carries the number of bytes that were already moved before the failure, since a transfer can
/// time out (or hit an error) halfway through the buffer. Callers that care about partial
/// progress must check [`transferred`](Error::transferred()) in addition to the
/// [`kind`](Error::kind()).
#[derive(Debug)]
pub struct Error {
    transferred: usize,
    kind: ErrorKind,
}

/// What went wrong in a bounded transfer.
///
/// "Would block" and interrupted waits never show up here, they are absorbed by the transfer
/// loops. The timeout kinds are separate per direction so a caller driving both ends can tell
/// which side stalled.
#[derive(Debug)]
pub enum ErrorKind {
    /// The read side's readiness wait elapsed before the buffer was filled.
    ReadTimeout,

    /// The write side's readiness wait elapsed before the buffer was flushed.
    WriteTimeout,

    /// The underlying `read(2)`/`write(2)` or readiness machinery failed, e.g. a broken pipe.
    Io(io::Error),
}

impl Error {
    pub(crate) fn read_timeout(transferred: usize) -> Self {
        Self {
            transferred,
            kind: ErrorKind::ReadTimeout,
        }
    }

    pub(crate) fn write_timeout(transferred: usize) -> Self {
        Self {
            transferred,
            kind: ErrorKind::WriteTimeout,
        }
    }

    pub(crate) fn io(transferred: usize, err: io::Error) -> Self {
        Self {
            transferred,
            kind: ErrorKind::Io(err),
        }
    }

    /// The number of bytes moved before the failure. May be zero.
    pub fn transferred(&self) -> usize {
        self.transferred
    }

    /// What kind of failure this is.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Whether this is a read or write timeout (as opposed to an underlying I/O error).
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::ReadTimeout | ErrorKind::WriteTimeout)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            ErrorKind::ReadTimeout => f.write_str("pipe read timeout"),
            ErrorKind::WriteTimeout => f.write_str("pipe write timeout"),
            ErrorKind::Io(err) => err.fmt(f),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.kind {
            ErrorKind::Io(err) => Some(err),
            _ => None,
        }
    }
}

/// Lossy conversion for callers living in `io::Result` land: the timeout kinds map to
/// [`io::ErrorKind::TimedOut`] and the partial transfer count is dropped.
impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err.kind {
            ErrorKind::Io(err) => err,
            ErrorKind::ReadTimeout => io::Error::new(io::ErrorKind::TimedOut, "pipe read timeout"),
            ErrorKind::WriteTimeout => {
                io::Error::new(io::ErrorKind::TimedOut, "pipe write timeout")
            }
        }
    }
}
