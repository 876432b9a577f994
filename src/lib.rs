//! # Timeout-bounded pipes
//!
//! Pipes whose reads and writes can be bounded by an explicit timeout.
//!
//! A plain `pipe(2)` blocks without bound: a read on an empty pipe or a write into a full one
//! parks the calling thread until the other side makes progress. [`TimedPipe`] keeps the pipe
//! semantics but puts the chosen end(s) into non-blocking mode and backs each such end with its
//! own `epoll` instance, so a transfer that cannot make progress waits for readiness *up to a
//! caller-supplied bound* instead of forever. This is useful for thread and subprocess
//! signaling, self-pipe constructions, and producer/consumer hand-off where one side may be
//! slow or absent.
//!
//! Which ends are non-blocking is selected at construction via [`NonBlocking`]; an end left
//! blocking behaves exactly like a plain pipe end (and its transfers ignore the timeout).
//!
//! ``` rust, no_run
//! use std::time::Duration;
//!
//! use tpipe::{NonBlocking, TimedPipe, Timeout};
//!
//! # fn code() -> std::io::Result<()> {
//! let pipe = TimedPipe::new(NonBlocking::Both)?;
//!
//! // Writes are bounded: if nobody drains the pipe, this fails with a
//! // write timeout instead of parking the thread forever.
//! pipe.write_timeout(b"ping", Duration::from_millis(100).into())?;
//!
//! // Reads are bounded the same way. `Timeout::Millis(0)` polls without
//! // waiting, `Timeout::Infinite` restores plain blocking behavior.
//! let mut buf = [0u8; 4];
//! let n = pipe.read_timeout(&mut buf, Timeout::Millis(100))?;
//! assert_eq!(&buf[..n], b"ping");
//! #
//! # Ok(())
//! # }
//! ```
//!
//! A timed-out transfer reports the bytes it already moved together with a direction-specific
//! timeout kind, see [`Error`]; callers must check both. The raw pipe file descriptors remain
//! accessible (see [`TimedPipe::read_fd`]/[`TimedPipe::write_fd`] and [`TimedPipe::into_fds`])
//! so they can be inherited by spawned processes.
//!
//! Linux-only: the readiness machinery is `epoll`, and pipes are created with `pipe2(2)`.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(missing_docs)]

pub(crate) mod error;

pub(crate) mod poll;

mod pipe;

pub use error::{Error, ErrorKind};
pub use pipe::{NonBlocking, TimedPipe};
pub use poll::Timeout;
