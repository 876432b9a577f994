//! The timed pipe itself.

use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd};

use crate::error::{Error, io_assert};
use crate::poll::{Interest, Poller, Timeout};

/// Which end(s) of the pipe are placed in non-blocking mode.
///
/// A non-blocking end gets its own readiness poller and honors the timeout passed to the
/// bounded transfer calls. A blocking end behaves like a plain `pipe(2)` end: its transfers
/// ignore the timeout and may block without bound.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NonBlocking {
    /// Both ends non-blocking; reads and writes are each bounded by their timeout.
    Both,

    /// Only the read end is non-blocking; writes block like a plain pipe.
    ReadEnd,

    /// Only the write end is non-blocking; reads block like a plain pipe.
    WriteEnd,
}

/// A `pipe(2)` whose transfers on the non-blocking end(s) are bounded by a timeout.
///
/// Both file descriptors are created close-on-exec. Each non-blocking end owns a dedicated
/// `epoll` instance: the read end's is registered for readable interest once at construction
/// and kept for the lifetime of the pipe, the write end's is registered for writable interest
/// only around each wait for buffer space (a pipe is writable most of the time, a standing
/// registration would report ready on every wait).
///
/// One thread may drive the read end while another drives the write end; the two paths share
/// no state. Concurrent bounded reads (or concurrent bounded writes) on the same pipe are not
/// supported.
#[derive(Debug)]
pub struct TimedPipe {
    readable: OwnedFd,
    writable: OwnedFd,
    read_poll: Option<Poller>,
    write_poll: Option<Poller>,
}

fn set_nonblocking(fd: BorrowedFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_GETFL) };
    io_assert!(flags >= 0);
    let rc = unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFL, flags | libc::O_NONBLOCK) };
    io_assert!(rc >= 0);
    Ok(())
}

impl TimedPipe {
    /// Create a new pipe with the chosen end(s) in non-blocking mode.
    ///
    /// With [`NonBlocking::Both`] the pipe is created non-blocking atomically via
    /// `pipe2(O_CLOEXEC | O_NONBLOCK)`; the single-end modes create a blocking close-on-exec
    /// pipe and switch exactly one end over. Construction is all-or-nothing: on error no
    /// descriptor or poller is left behind.
    pub fn new(mode: NonBlocking) -> io::Result<Self> {
        let mut fds = [-1i32; 2];

        let flags = match mode {
            NonBlocking::Both => libc::O_CLOEXEC | libc::O_NONBLOCK,
            NonBlocking::ReadEnd | NonBlocking::WriteEnd => libc::O_CLOEXEC,
        };
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), flags) };
        io_assert!(rc == 0);
        let (readable, writable) = unsafe {
            (
                OwnedFd::from_raw_fd(fds[0]),
                OwnedFd::from_raw_fd(fds[1]),
            )
        };

        match mode {
            NonBlocking::Both => (),
            NonBlocking::ReadEnd => set_nonblocking(readable.as_fd())?,
            NonBlocking::WriteEnd => set_nonblocking(writable.as_fd())?,
        }

        let read_poll = match mode {
            NonBlocking::Both | NonBlocking::ReadEnd => {
                let poller = Poller::new()?;
                poller.add(readable.as_fd(), Interest::READABLE)?;
                Some(poller)
            }
            NonBlocking::WriteEnd => None,
        };

        // writable interest is registered per wait, see write_timeout
        let write_poll = match mode {
            NonBlocking::Both | NonBlocking::WriteEnd => Some(Poller::new()?),
            NonBlocking::ReadEnd => None,
        };

        Ok(Self {
            readable,
            writable,
            read_poll,
            write_poll,
        })
    }

    /// Read until `buf` is full, waiting for readiness but never longer than `timeout`.
    ///
    /// Bytes accumulate across readiness cycles: a wakeup that yields only part of the buffer
    /// is not an error, the call keeps waiting for the rest. On end-of-stream the bytes read
    /// so far are returned as a short (possibly zero) count. If the timeout elapses, the call
    /// fails with [`ErrorKind::ReadTimeout`](crate::ErrorKind::ReadTimeout) carrying the bytes
    /// already read.
    ///
    /// If the read end is blocking ([`NonBlocking::WriteEnd`] mode), this is a single plain
    /// blocking read and `timeout` is ignored.
    pub fn read_timeout(&self, buf: &mut [u8], timeout: Timeout) -> Result<usize, Error> {
        let Some(poller) = &self.read_poll else {
            return self.read_blocking(buf);
        };

        let mut total = 0;
        loop {
            match poller.wait(timeout) {
                Ok(true) => (),
                Ok(false) => return Err(Error::read_timeout(total)),
                Err(err) => return Err(Error::io(total, err)),
            }

            while total < buf.len() {
                let rest = &mut buf[total..];
                let rc = unsafe {
                    libc::read(
                        self.readable.as_raw_fd(),
                        rest.as_mut_ptr().cast(),
                        rest.len(),
                    )
                };
                if rc < 0 {
                    let err = io::Error::last_os_error();
                    match err.kind() {
                        // drained, wait for the next readiness cycle
                        io::ErrorKind::WouldBlock => break,
                        io::ErrorKind::Interrupted => continue,
                        _ => return Err(Error::io(total, err)),
                    }
                }
                if rc == 0 {
                    // end of stream, the write end hung up
                    return Ok(total);
                }
                total += rc as usize;
            }

            if total == buf.len() {
                return Ok(total);
            }
        }
    }

    /// Write all of `buf`, waiting for buffer space but never longer than `timeout`.
    ///
    /// A partial write advances into the buffer and retries; each "would block" registers
    /// writable interest, waits, and unregisters it again whatever the wait's outcome. If the
    /// timeout elapses, the call fails with
    /// [`ErrorKind::WriteTimeout`](crate::ErrorKind::WriteTimeout) carrying the bytes already
    /// written.
    ///
    /// If the write end is blocking ([`NonBlocking::ReadEnd`] mode), this is a plain blocking
    /// write of the whole buffer and `timeout` is ignored.
    pub fn write_timeout(&self, buf: &[u8], timeout: Timeout) -> Result<usize, Error> {
        let Some(poller) = &self.write_poll else {
            return self.write_blocking(buf);
        };

        let mut total = 0;
        while total < buf.len() {
            let rest = &buf[total..];
            let rc = unsafe {
                libc::write(self.writable.as_raw_fd(), rest.as_ptr().cast(), rest.len())
            };
            if rc >= 0 {
                total += rc as usize;
                continue;
            }

            let err = io::Error::last_os_error();
            match err.kind() {
                io::ErrorKind::WouldBlock => (),
                io::ErrorKind::Interrupted => continue,
                _ => return Err(Error::io(total, err)),
            }

            // pipe is full: wait for space with the interest registered only
            // around this one wait
            if let Err(err) = poller.add(self.writable.as_fd(), Interest::WRITABLE) {
                return Err(Error::io(total, err));
            }
            let waited = poller.wait(timeout);
            let deleted = poller.delete(self.writable.as_fd());
            match waited {
                Ok(true) => (),
                Ok(false) => return Err(Error::write_timeout(total)),
                Err(err) => return Err(Error::io(total, err)),
            }
            if let Err(err) = deleted {
                return Err(Error::io(total, err));
            }
        }
        Ok(total)
    }

    /// [`read_timeout`](Self::read_timeout()) with an infinite timeout.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, Error> {
        self.read_timeout(buf, Timeout::Infinite)
    }

    /// [`write_timeout`](Self::write_timeout()) with an infinite timeout.
    pub fn write(&self, buf: &[u8]) -> Result<usize, Error> {
        self.write_timeout(buf, Timeout::Infinite)
    }

    fn read_blocking(&self, buf: &mut [u8]) -> Result<usize, Error> {
        loop {
            let rc = unsafe {
                libc::read(self.readable.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len())
            };
            if rc >= 0 {
                return Ok(rc as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(Error::io(0, err));
            }
        }
    }

    fn write_blocking(&self, buf: &[u8]) -> Result<usize, Error> {
        let mut total = 0;
        while total < buf.len() {
            let rest = &buf[total..];
            let rc = unsafe {
                libc::write(self.writable.as_raw_fd(), rest.as_ptr().cast(), rest.len())
            };
            if rc >= 0 {
                total += rc as usize;
                continue;
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(Error::io(total, err));
            }
        }
        Ok(total)
    }

    /// Borrow the readable end, e.g. to hand it to a spawned process.
    ///
    /// Ownership stays with the pipe; duplicate the descriptor if it must outlive it.
    pub fn read_fd(&self) -> BorrowedFd<'_> {
        self.readable.as_fd()
    }

    /// Borrow the writable end, e.g. to hand it to a spawned process.
    ///
    /// Ownership stays with the pipe; duplicate the descriptor if it must outlive it.
    pub fn write_fd(&self) -> BorrowedFd<'_> {
        self.writable.as_fd()
    }

    /// Release the pollers and hand out the two data descriptors (readable, writable).
    pub fn into_fds(self) -> (OwnedFd, OwnedFd) {
        let Self {
            readable, writable, ..
        } = self;
        (readable, writable)
    }

    /// Release the readiness pollers.
    ///
    /// Best-effort teardown: never fails, and calling it twice is harmless. The data
    /// descriptors stay open (they are closed when the pipe is dropped, or handed out via
    /// [`into_fds`](Self::into_fds())); no bounded transfer may be attempted afterwards.
    pub fn close(&mut self) {
        self.read_poll = None;
        self.write_poll = None;
    }
}
