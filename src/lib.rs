// canfd/src/lib.rs
//
// The main lib file for the CAN FD driver.
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.

//! A minimal CAN FD driver for Linux SocketCAN.
//!
//! The Linux kernel supports using CAN devices through a network-like API
//! (see <https://docs.kernel.org/networking/can.html>). This crate opens a
//! single raw CAN socket with CAN FD frames enabled, binds it to one named
//! interface, optionally restricts the identifiers it receives, and then
//! exchanges fixed-size CAN FD records over it.
//!
//! ```no_run
//! use canfd::{Config, Session};
//!
//! fn main() -> canfd::Result<()> {
//!     let config = Config::load("config/canfd_config.yaml")?;
//!     let session = Session::open(&config)?;
//!
//!     loop {
//!         match session.receive() {
//!             Ok(frame) => println!("{}", frame),
//!             Err(err) => eprintln!("{}", err),
//!         }
//!     }
//! }
//! ```
//!
//! # Identifiers
//!
//! Frame identifiers are handled as the raw 32-bit SocketCAN identifier
//! word. Standard 11-bit and extended 29-bit identifiers are not told apart
//! beyond reporting the extended-format flag bit, and identifier filters
//! compare only the low 11 bits.
//!
//! # Stopping
//!
//! The [`reader`] and [`writer`] loops check a stop flag before every
//! round. With a read timeout configured, a stop request is noticed within
//! one timeout period; without one, not before the next frame arrives.

pub mod addr;
pub mod config;
pub mod errors;
pub mod frame;
pub mod reader;
pub mod socket;
pub mod writer;


pub use addr::CanAddr;
pub use config::Config;
pub use embedded_can::{self, ExtendedId, Frame as EmbeddedFrame, Id, StandardId};
pub use errors::{ConfigError, ConstructionError, Error, Result};
pub use frame::{FdFlags, FdFrame};
pub use socket::{CanFdRawSocket, CanFilter, CanHost, LinuxHost, RawSocket, Session, ShouldRetry};
