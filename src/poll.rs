//! Readiness waiting via `epoll`.
//!
//! Each non-blocking pipe end gets its own [`Poller`], a level-triggered `epoll` instance
//! watching exactly that one descriptor. There is no shared registry: the endpoint owns its
//! pollers outright.

use std::ffi::c_int;
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd};
use std::time::Duration;

use bitflags::bitflags;

use crate::error::io_assert;

bitflags! {
    /// Readiness conditions a watched descriptor can be waited for.
    #[derive(Clone, Copy, Debug)]
    #[repr(transparent)]
    pub(crate) struct Interest: u32 {
        /// Data is available to read.
        const READABLE = libc::EPOLLIN as u32;

        /// Buffer space is available to write into.
        const WRITABLE = libc::EPOLLOUT as u32;
    }
}

/// How long a readiness wait may take.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Timeout {
    /// Wait until readiness arrives, however long that takes.
    Infinite,

    /// Wait at most this many milliseconds; `0` polls without waiting at all.
    ///
    /// Values beyond `c_int::MAX` milliseconds (roughly 24 days) are clamped.
    Millis(u32),
}

impl Timeout {
    /// The `epoll_wait(2)` encoding: `-1` waits indefinitely.
    pub(crate) fn epoll_millis(self) -> c_int {
        match self {
            Timeout::Infinite => -1,
            Timeout::Millis(msec) => msec.min(c_int::MAX as u32) as c_int,
        }
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Timeout::Millis(duration.as_millis().min(u32::MAX as u128) as u32)
    }
}

/// An owned `epoll` instance watching at most one descriptor.
#[derive(Debug)]
pub(crate) struct Poller {
    fd: OwnedFd,
}

impl Poller {
    /// Create a new `epoll` instance with no registered interest.
    pub fn new() -> io::Result<Self> {
        let fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        io_assert!(fd >= 0);
        Ok(Self {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
        })
    }

    /// Register `fd` for the given readiness interest.
    pub fn add(&self, fd: BorrowedFd, interest: Interest) -> io::Result<()> {
        let mut event = libc::epoll_event {
            events: interest.bits(),
            u64: fd.as_raw_fd() as u64,
        };
        let rc = unsafe {
            libc::epoll_ctl(
                self.fd.as_raw_fd(),
                libc::EPOLL_CTL_ADD,
                fd.as_raw_fd(),
                &mut event,
            )
        };
        io_assert!(rc == 0);
        Ok(())
    }

    /// Remove `fd`'s registration.
    pub fn delete(&self, fd: BorrowedFd) -> io::Result<()> {
        let rc = unsafe {
            libc::epoll_ctl(
                self.fd.as_raw_fd(),
                libc::EPOLL_CTL_DEL,
                fd.as_raw_fd(),
                std::ptr::null_mut(),
            )
        };
        io_assert!(rc == 0);
        Ok(())
    }

    /// Wait until a registered descriptor becomes ready or the timeout elapses.
    ///
    /// Returns `true` if something became ready and `false` on timeout. An interrupted wait
    /// (`EINTR`) is retried with the original budget, so a signal-heavy process may wait
    /// longer than requested; timeout accounting is no finer than one wait.
    pub fn wait(&self, timeout: Timeout) -> io::Result<bool> {
        let mut events = [libc::epoll_event { events: 0, u64: 0 }];
        loop {
            let rc = unsafe {
                libc::epoll_wait(
                    self.fd.as_raw_fd(),
                    events.as_mut_ptr(),
                    events.len() as c_int,
                    timeout.epoll_millis(),
                )
            };
            if rc >= 0 {
                return Ok(rc > 0);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd};

    use super::{Interest, Poller, Timeout};

    fn raw_pipe() -> (OwnedFd, OwnedFd) {
        let mut fds = [-1i32; 2];
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };
        assert_eq!(rc, 0);
        unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) }
    }

    #[test]
    fn timeout_encoding() {
        assert_eq!(Timeout::Infinite.epoll_millis(), -1);
        assert_eq!(Timeout::Millis(0).epoll_millis(), 0);
        assert_eq!(Timeout::Millis(250).epoll_millis(), 250);
        assert_eq!(Timeout::Millis(u32::MAX).epoll_millis(), i32::MAX);
        assert_eq!(
            Timeout::from(std::time::Duration::from_secs(2)),
            Timeout::Millis(2000)
        );
    }

    #[test]
    fn empty_poller_times_out() {
        let poller = Poller::new().unwrap();
        assert!(!poller.wait(Timeout::Millis(0)).unwrap());
    }

    #[test]
    fn readable_interest_reports_ready() {
        let (read, write) = raw_pipe();
        let poller = Poller::new().unwrap();
        poller.add(read.as_fd(), Interest::READABLE).unwrap();

        // nothing written yet
        assert!(!poller.wait(Timeout::Millis(0)).unwrap());

        let rc = unsafe { libc::write(write.as_raw_fd(), b"x".as_ptr().cast(), 1) };
        assert_eq!(rc, 1);
        assert!(poller.wait(Timeout::Millis(1000)).unwrap());

        // level-triggered: standing readiness is re-reported
        assert!(poller.wait(Timeout::Millis(0)).unwrap());

        poller.delete(read.as_fd()).unwrap();
        assert!(!poller.wait(Timeout::Millis(0)).unwrap());
    }
}
