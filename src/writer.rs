// canfd/src/writer.rs
//
// The interactive frame writer loop.
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.

//! Interactive transmission of frames on a [`Session`].
//!
//! Each round asks the operator for an identifier, the FD flags and a line
//! of payload text, then sends the resulting frame. The flags are the only
//! value range-checked: anything outside 0-15 is asked for again. Payload
//! text longer than a CAN FD frame can hold is cut to 64 bytes, and the
//! operator is told so.

use crate::{frame::CANFD_MAX_DLEN, socket::RawSocket, Error, FdFrame, Result, Session};
use std::{
    borrow::Cow,
    io::{BufRead, Write},
    sync::atomic::{AtomicBool, Ordering},
};

const ID_PROMPT: &str = "Please enter a CAN ID (number from 0 to 999): ";
const FLAGS_PROMPT: &str = "Please enter CAN flags (number from 0-15): ";
const DATA_PROMPT: &str = "Please enter CAN data: ";

/// The largest flags value accepted from the operator.
pub const MAX_FLAGS: u8 = 15;

/// Prompts for and sends frames until `stop` is raised or the input ends.
///
/// A frame completed after `stop` was raised is dropped, not sent.
///
/// Send failures are logged and the next round starts. Returns the number
/// of frames sent.
pub fn run<S, R, W>(
    session: &Session<S>,
    input: &mut R,
    out: &mut W,
    stop: &AtomicBool,
) -> Result<usize>
where
    S: RawSocket,
    R: BufRead,
    W: Write,
{
    let mut sent = 0;

    while !stop.load(Ordering::Relaxed) {
        let frame = match prompt_frame(input, out)? {
            Some(frame) => frame,
            None => {
                log::debug!("End of input");
                break;
            }
        };

        // The prompts may have blocked for a long time
        if stop.load(Ordering::Relaxed) {
            log::debug!("Stopped before sending {:X}", frame);
            break;
        }

        match session.send(&frame) {
            Ok(()) => {
                log::debug!("Sent {:X}", frame);
                sent += 1;
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => log::error!("{}", err),
        }
    }

    Ok(sent)
}

/// Asks the operator for one frame.
///
/// Returns `None` when the input ends before the frame is complete.
pub fn prompt_frame<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<Option<FdFrame>> {
    let id = match prompt(input, out, ID_PROMPT, parse_id)? {
        Some(id) => id,
        None => return Ok(None),
    };

    let flags = match prompt(input, out, FLAGS_PROMPT, parse_flags)? {
        Some(flags) => flags,
        None => return Ok(None),
    };

    write_out(out, DATA_PROMPT)?;
    let line = match read_line(input)? {
        Some(line) => line,
        None => return Ok(None),
    };

    let mut data = strip_eol(&line);
    if data.len() > CANFD_MAX_DLEN {
        log::error!(
            "CAN data is {} bytes, only the first {} are sent",
            data.len(),
            CANFD_MAX_DLEN
        );
        write_out(out, &format!("CAN data truncated to {} bytes\n", CANFD_MAX_DLEN))?;
        data = &data[..CANFD_MAX_DLEN];
    }

    Ok(Some(FdFrame::with_flags(id, data, flags)?))
}

/// Parses an identifier, in decimal or as `0x` prefixed hex.
pub fn parse_id(s: &str) -> Option<u32> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

/// Parses a flags value, accepting only 0 to [`MAX_FLAGS`].
pub fn parse_flags(s: &str) -> Option<u8> {
    s.parse::<i64>()
        .ok()
        .filter(|n| (0..=MAX_FLAGS as i64).contains(n))
        .map(|n| n as u8)
}

// Repeats the prompt until `parse` accepts the answer or the input ends.
fn prompt<R, W, T>(
    input: &mut R,
    out: &mut W,
    text: &str,
    parse: fn(&str) -> Option<T>,
) -> Result<Option<T>>
where
    R: BufRead,
    W: Write,
{
    loop {
        write_out(out, text)?;
        let line = match read_line(input)? {
            Some(line) => line,
            None => return Ok(None),
        };
        let answer: Cow<str> = String::from_utf8_lossy(&line);
        match parse(answer.trim()) {
            Some(val) => return Ok(Some(val)),
            None => log::debug!("Rejected input {:?}", answer.trim()),
        }
    }
}

fn read_line<R: BufRead>(input: &mut R) -> Result<Option<Vec<u8>>> {
    let mut line = Vec::new();
    match input.read_until(b'\n', &mut line).map_err(Error::Terminal)? {
        0 => Ok(None),
        _ => Ok(Some(line)),
    }
}

fn strip_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn write_out<W: Write>(out: &mut W, text: &str) -> Result<()> {
    out.write_all(text.as_bytes())
        .and_then(|_| out.flush())
        .map_err(Error::Terminal)
}

/////////////////////////////////////////////////////////////////////////////
