// canfd/src/errors.rs
//
// Error types for the CAN FD driver.
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.

//! Driver errors.
//!
//! Errors fall in two tiers. The startup errors ([`Error::Config`],
//! [`Error::Socket`], [`Error::Interface`], [`Error::Bind`] and
//! [`Error::Filter`]) mean the session could not be constructed and the
//! process has nothing useful left to do. The I/O errors ([`Error::Read`],
//! [`Error::ShortRead`], [`Error::Write`] and [`Error::ShortWrite`]) are
//! reported per frame and the reader/writer loops carry on after them.

use std::{io, path::PathBuf};
use thiserror::Error;

// ===== ConfigError =====

/// Failure to load the driver configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("Unable to open file: {}", path.display())]
    NotFound {
        /// The path that was looked up
        path: PathBuf,
        /// The OS error
        #[source]
        source: io::Error,
    },
    /// The file exists but could not be read.
    #[error("Unable to read file: {}", path.display())]
    Io {
        /// The path that was read
        path: PathBuf,
        /// The OS error
        #[source]
        source: io::Error,
    },
    /// The document is not valid YAML.
    #[error("YAML parsing error")]
    Parse(#[source] serde_yaml::Error),
    /// A field is missing, has the wrong shape, or fails validation.
    #[error("YAML representation error: {0}")]
    Schema(String),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Schema(err.to_string())
    }
}

// ===== ConstructionError =====

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
/// Error that occurs when creating CAN FD frames
pub enum ConstructionError {
    /// Larger payload requested than can be held in the frame.
    #[error("Payload is too large: {0} bytes")]
    TooMuchData(usize),
    /// A wire record of the wrong size was given to the decoder.
    #[error("Wrong CAN FD record size: {0} bytes")]
    WrongRecordSize(usize),
}

// ===== Error =====

/// Any error from the CAN FD driver.
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The raw socket could not be created or configured
    #[error("{context}: {source}")]
    Socket {
        /// What was being attempted
        context: &'static str,
        /// The OS error
        #[source]
        source: io::Error,
    },
    /// The interface name is unknown to the host
    #[error("CAN interface '{name}' not found: {source}")]
    Interface {
        /// The interface name from the configuration
        name: String,
        /// The OS error
        #[source]
        source: io::Error,
    },
    /// The socket could not be bound to the interface
    #[error("Socket bind to '{name}' failed: {source}")]
    Bind {
        /// The interface name
        name: String,
        /// The OS error
        #[source]
        source: io::Error,
    },
    /// The identifier filters were rejected
    #[error("Setting CAN filter failed: {0}")]
    Filter(#[source] io::Error),
    /// A read from the socket failed
    #[error("CAN FD raw socket read failed: {0}")]
    Read(#[source] io::Error),
    /// Fewer bytes than a full CAN FD record were read
    #[error("Read: incomplete CAN FD frame ({len} of {expected} bytes)")]
    ShortRead {
        /// Bytes actually read
        len: usize,
        /// The record size
        expected: usize,
    },
    /// A write to the socket failed
    #[error("CAN FD raw socket write failed: {0}")]
    Write(#[source] io::Error),
    /// Fewer bytes than a full CAN FD record were written
    #[error("Write: incomplete CAN FD frame ({len} of {expected} bytes)")]
    ShortWrite {
        /// Bytes actually written
        len: usize,
        /// The record size
        expected: usize,
    },
    /// The session was already closed
    #[error("CAN FD session is closed")]
    Closed,
    /// The operator terminal could not be read or written
    #[error("Terminal I/O failed: {0}")]
    Terminal(#[source] io::Error),
    /// A frame could not be constructed
    #[error(transparent)]
    Construction(#[from] ConstructionError),
}

impl Error {
    /// Whether the error is a startup failure, after which the session
    /// cannot be used.
    pub fn is_fatal(&self) -> bool {
        use Error::*;
        matches!(
            self,
            Config(_) | Socket { .. } | Interface { .. } | Bind { .. } | Filter(_) | Closed
        )
    }

    /// Gets the underlying OS error, if there is one.
    pub fn io_error(&self) -> Option<&io::Error> {
        use Error::*;
        match self {
            Socket { source, .. } | Interface { source, .. } | Bind { source, .. } => Some(source),
            Filter(e) | Read(e) | Write(e) | Terminal(e) => Some(e),
            _ => None,
        }
    }
}

/// A result type bound to the driver [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/////////////////////////////////////////////////////////////////////////////
