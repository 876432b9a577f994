//! Behavior tests for the bounded transfer paths.

use std::thread;
use std::time::{Duration, Instant};

use tpipe::{ErrorKind, NonBlocking, TimedPipe, Timeout};

#[test]
fn round_trip() {
    let pipe = TimedPipe::new(NonBlocking::Both).unwrap();

    let payload = b"the quick brown fox";
    assert_eq!(pipe.write(payload).unwrap(), payload.len());

    let mut buf = vec![0u8; payload.len()];
    assert_eq!(pipe.read(&mut buf).unwrap(), payload.len());
    assert_eq!(&buf[..], payload);
}

#[test]
fn blocking_write_end_never_times_out() {
    let pipe = TimedPipe::new(NonBlocking::ReadEnd).unwrap();

    // the write end is blocking, so a zero timeout must not matter
    for _ in 0..100 {
        assert_eq!(pipe.write_timeout(b"ab", Timeout::Millis(0)).unwrap(), 2);
    }

    let mut buf = vec![0u8; 200];
    let n = pipe.read_timeout(&mut buf, Timeout::Millis(1000)).unwrap();
    assert_eq!(n, 200);
}

#[test]
fn read_timeout_on_empty_pipe() {
    let pipe = TimedPipe::new(NonBlocking::ReadEnd).unwrap();

    let mut buf = [0u8; 16];
    let start = Instant::now();
    let err = pipe.read_timeout(&mut buf, Timeout::Millis(50)).unwrap_err();
    let elapsed = start.elapsed();

    assert!(matches!(err.kind(), ErrorKind::ReadTimeout));
    assert_eq!(err.transferred(), 0);
    assert!(elapsed >= Duration::from_millis(45), "returned early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "overslept: {elapsed:?}");
}

#[test]
fn drains_pending_bytes_in_one_call() {
    let pipe = TimedPipe::new(NonBlocking::ReadEnd).unwrap();

    for i in 0..100u8 {
        assert_eq!(pipe.write_timeout(&[i], Timeout::Millis(0)).unwrap(), 1);
    }

    let mut buf = [0u8; 100];
    let n = pipe.read_timeout(&mut buf, Timeout::Millis(1000)).unwrap();
    assert_eq!(n, 100);
    for (i, b) in buf.iter().enumerate() {
        assert_eq!(usize::from(*b), i);
    }

    // the pipe is empty again
    let err = pipe.read_timeout(&mut buf, Timeout::Millis(10)).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::ReadTimeout));
}

#[test]
fn oversized_read_times_out_with_partial_count() {
    let pipe = TimedPipe::new(NonBlocking::Both).unwrap();
    pipe.write(b"abc").unwrap();

    // only 3 of the 16 requested bytes ever arrive
    let mut buf = [0u8; 16];
    let err = pipe.read_timeout(&mut buf, Timeout::Millis(20)).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::ReadTimeout));
    assert_eq!(err.transferred(), 3);
    assert_eq!(&buf[..3], b"abc");
}

// A transfer larger than the kernel pipe buffer must still complete in a
// single bounded call on each side, accumulating across readiness cycles.
#[test]
fn large_transfer_accumulates_across_cycles() {
    const LEN: usize = 256 * 1024;

    let pipe = TimedPipe::new(NonBlocking::Both).unwrap();
    let payload = vec![0x5au8; LEN];

    thread::scope(|s| {
        s.spawn(|| {
            let mut buf = vec![0u8; LEN];
            let n = pipe.read_timeout(&mut buf, Timeout::Millis(10_000)).unwrap();
            assert_eq!(n, LEN);
            assert!(buf.iter().all(|&b| b == 0x5a));
        });

        let n = pipe.write_timeout(&payload, Timeout::Millis(10_000)).unwrap();
        assert_eq!(n, LEN);
    });
}

#[test]
fn close_is_idempotent() {
    let mut pipe = TimedPipe::new(NonBlocking::Both).unwrap();
    pipe.close();
    pipe.close();
}

#[test]
fn full_duplex_write_is_bounded() {
    let pipe = TimedPipe::new(NonBlocking::Both).unwrap();

    // nobody drains the pipe, so this can only fill the kernel buffer
    let payload = vec![0u8; 1024 * 1024];
    let start = Instant::now();
    let err = pipe.write_timeout(&payload, Timeout::Millis(100)).unwrap_err();

    assert!(matches!(err.kind(), ErrorKind::WriteTimeout));
    assert!(err.transferred() > 0);
    assert!(err.transferred() < payload.len());
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn write_interest_is_rearmed_after_timeout() {
    let pipe = TimedPipe::new(NonBlocking::Both).unwrap();
    let payload = vec![0u8; 1024 * 1024];

    let err = pipe.write_timeout(&payload, Timeout::Millis(10)).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::WriteTimeout));

    // the timed-out wait must not leave a stale registration behind; a
    // stale one would fail the next registration with EEXIST
    let err = pipe.write_timeout(&payload, Timeout::Millis(10)).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::WriteTimeout));
    assert_eq!(err.transferred(), 0);
}

#[test]
fn blocking_write_completes_once_drained() {
    const LEN: usize = 256 * 1024;

    let pipe = TimedPipe::new(NonBlocking::ReadEnd).unwrap();
    let payload = vec![1u8; LEN];

    thread::scope(|s| {
        s.spawn(|| {
            thread::sleep(Duration::from_millis(50));
            let mut buf = vec![0u8; LEN];
            let n = pipe.read_timeout(&mut buf, Timeout::Millis(10_000)).unwrap();
            assert_eq!(n, LEN);
        });

        // the write end is blocking: the tiny timeout is ignored and the
        // write completes once the reader drains the pipe
        let n = pipe.write_timeout(&payload, Timeout::Millis(1)).unwrap();
        assert_eq!(n, LEN);
    });
}

#[test]
fn timeout_errors_convert_to_io() {
    let pipe = TimedPipe::new(NonBlocking::ReadEnd).unwrap();

    let mut buf = [0u8; 1];
    let err = pipe.read_timeout(&mut buf, Timeout::Millis(0)).unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(err.to_string(), "pipe read timeout");

    let err: std::io::Error = err.into();
    assert_eq!(err.kind(), std::io::ErrorKind::TimedOut);
}
