// canfd/src/reader.rs
//
// The frame reader loop.
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.

//! Continuous reception of frames from a [`Session`].

use crate::{socket::RawSocket, Error, FdFrame, Result, Session, ShouldRetry};
use std::{
    io::Write,
    sync::atomic::{AtomicBool, Ordering},
};

/// Receives and reports frames until `stop` is raised.
///
/// Failed reads are logged and the next read is issued straight away. A
/// read that timed out is not a failure and is skipped quietly. Returns the
/// number of frames reported.
pub fn run<S, W>(session: &Session<S>, out: &mut W, stop: &AtomicBool) -> Result<usize>
where
    S: RawSocket,
    W: Write,
{
    let mut count = 0;

    while !stop.load(Ordering::Relaxed) {
        match session.receive() {
            Ok(frame) => {
                report(out, &frame)?;
                count += 1;
            }
            Err(err) if err.should_retry() => (),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => log::error!("{}", err),
        }
    }

    log::debug!("Reader stopped after {} frames", count);
    Ok(count)
}

/// Prints one received frame: identifier, length and the data in hex.
pub fn report<W: Write>(out: &mut W, frame: &FdFrame) -> Result<()> {
    writeln!(out, "{}", frame)
        .and_then(|_| out.flush())
        .map_err(Error::Terminal)
}

/////////////////////////////////////////////////////////////////////////////
