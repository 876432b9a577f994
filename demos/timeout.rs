use std::time::{Duration, Instant};

use anyhow::{Context as _, Error};

use tpipe::{NonBlocking, TimedPipe, Timeout};

fn main() -> Result<(), Error> {
    let pipe = TimedPipe::new(NonBlocking::Both).context("failed to create pipe")?;

    // Reading from an empty pipe comes back within the bound instead of hanging.
    let mut buf = [0u8; 8];
    let start = Instant::now();
    match pipe.read_timeout(&mut buf, Timeout::Millis(200)) {
        Ok(n) => println!("unexpectedly read {n} bytes"),
        Err(err) if err.is_timeout() => {
            println!("read timed out after {:?}", start.elapsed());
        }
        Err(err) => return Err(err).context("read failed"),
    }

    // Fill the kernel buffer until the bounded write has to give up.
    let chunk = vec![0u8; 64 * 1024];
    let mut filled = 0usize;
    loop {
        match pipe.write_timeout(&chunk, Duration::from_millis(200).into()) {
            Ok(n) => filled += n,
            Err(err) if err.is_timeout() => {
                filled += err.transferred();
                println!("write timed out with {filled} bytes buffered in the pipe");
                break;
            }
            Err(err) => return Err(err).context("write failed"),
        }
    }

    // And drain it again.
    let mut drained = 0usize;
    let mut buf = vec![0u8; 64 * 1024];
    while drained < filled {
        match pipe.read_timeout(&mut buf, Timeout::Millis(200)) {
            Ok(n) => drained += n,
            Err(err) if err.is_timeout() => {
                drained += err.transferred();
                break;
            }
            Err(err) => return Err(err).context("drain failed"),
        }
    }
    println!("drained {drained} bytes");

    Ok(())
}
