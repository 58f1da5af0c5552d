// canfd/src/frame.rs
//
// The CAN FD frame and its wire record codec.
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.

//! CAN FD frames.
//!
//! Every read and write on a raw CAN FD socket moves exactly one fixed-size
//! record, laid out like the kernel's `struct canfd_frame`:
//!
//! ```text
//!  0        4     5       6      7      8                         72
//!  +--------+-----+-------+------+------+--------------------------+
//!  | can_id | len | flags | res0 | res1 |        data[64]          |
//!  +--------+-----+-------+------+------+--------------------------+
//! ```
//!
//! The identifier word is in host byte order. [`FdFrame::to_record`] and
//! [`FdFrame::from_record`] convert explicitly between a frame and that
//! byte layout; no memory is reinterpreted in place.
//!
//! The identifier is carried as the raw 32-bit word. Standard (11-bit) and
//! extended (29-bit) identifiers are not told apart by the codec; the
//! `CAN_EFF_FLAG` bit simply travels with the rest of the word.

use crate::ConstructionError;
use bitflags::bitflags;
use embedded_can::{ExtendedId, Frame as EmbeddedFrame, Id, StandardId};
use itertools::Itertools;
use libc::canid_t;
use std::fmt;

pub use libc::{
    CANFD_BRS, CANFD_ESI, CANFD_MAX_DLEN, CANFD_MTU, CAN_EFF_FLAG, CAN_EFF_MASK, CAN_SFF_MASK,
};

/// Flag bit marking a CAN FD frame (`CANFD_FDF` in newer kernel headers).
pub const CANFD_FDF: u8 = 0x04;

/// Offsets of the fields in the wire record.
const ID_OFFSET: usize = 0;
const LEN_OFFSET: usize = 4;
const FLAGS_OFFSET: usize = 5;
const DATA_OFFSET: usize = 8;

bitflags! {
    /// Bit flags for the Flexible Data (FD) frames.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FdFlags: u8 {
        /// Bit rate switch (second bit rate for payload data)
        const BRS = CANFD_BRS as u8;
        /// Error state indicator of the transmitting node
        const ESI = CANFD_ESI as u8;
        /// Marks the frame as CAN FD
        const FDF = CANFD_FDF;
    }
}

/// Gets the canid_t value from an Id
/// If it's an extended ID, the CAN_EFF_FLAG bit is also set.
pub fn id_to_canid_t(id: impl Into<Id>) -> canid_t {
    match id.into() {
        Id::Standard(id) => id.as_raw() as canid_t,
        Id::Extended(id) => id.as_raw() | CAN_EFF_FLAG,
    }
}

// ===== FdFrame =====

/// A CAN FD frame with up to 64 bytes of data.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FdFrame {
    id: canid_t,
    len: u8,
    flags: u8,
    data: [u8; CANFD_MAX_DLEN],
}

impl FdFrame {
    /// Creates a frame with no FD flags set.
    pub fn new(id: canid_t, data: &[u8]) -> Result<Self, ConstructionError> {
        Self::with_flags(id, data, 0)
    }

    /// Creates a frame with the given raw flag byte.
    ///
    /// The flag byte is carried as-is; bits without a meaning in
    /// [`FdFlags`] are not stripped.
    pub fn with_flags(id: canid_t, data: &[u8], flags: u8) -> Result<Self, ConstructionError> {
        let n = data.len();
        if n > CANFD_MAX_DLEN {
            return Err(ConstructionError::TooMuchData(n));
        }
        let mut frame = Self {
            id,
            len: n as u8,
            flags,
            ..Self::default()
        };
        frame.data[..n].copy_from_slice(data);
        Ok(frame)
    }

    /// Decodes a frame from a complete wire record.
    ///
    /// The record must be exactly [`CANFD_MTU`] bytes. The identifier, length
    /// and flags are taken as found; the reserved bytes are ignored.
    pub fn from_record(rec: &[u8]) -> Result<Self, ConstructionError> {
        if rec.len() != CANFD_MTU {
            return Err(ConstructionError::WrongRecordSize(rec.len()));
        }
        let mut id = [0u8; 4];
        id.copy_from_slice(&rec[ID_OFFSET..LEN_OFFSET]);

        let mut data = [0u8; CANFD_MAX_DLEN];
        data.copy_from_slice(&rec[DATA_OFFSET..]);

        Ok(Self {
            id: canid_t::from_ne_bytes(id),
            len: rec[LEN_OFFSET],
            flags: rec[FLAGS_OFFSET],
            data,
        })
    }

    /// Encodes the frame into a wire record, with the reserved bytes zeroed.
    pub fn to_record(&self) -> [u8; CANFD_MTU] {
        let mut rec = [0u8; CANFD_MTU];
        rec[ID_OFFSET..LEN_OFFSET].copy_from_slice(&self.id.to_ne_bytes());
        rec[LEN_OFFSET] = self.len;
        rec[FLAGS_OFFSET] = self.flags;
        rec[DATA_OFFSET..].copy_from_slice(&self.data);
        rec
    }

    /// The raw identifier word, including any EFF/RTR/ERR flag bits.
    pub fn raw_id(&self) -> canid_t {
        self.id
    }

    /// The payload length as carried in the frame.
    ///
    /// For a received frame this is whatever the peer put on the wire, and
    /// may in principle exceed the data capacity.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the frame carries no payload.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The payload, clamped to the data capacity.
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len().min(CANFD_MAX_DLEN)]
    }

    /// The raw FD flag byte.
    pub fn raw_flags(&self) -> u8 {
        self.flags
    }

    /// The known FD flags.
    pub fn fd_flags(&self) -> FdFlags {
        FdFlags::from_bits_truncate(self.flags)
    }

    /// Whether the frame uses a bit rate switch.
    pub fn is_brs(&self) -> bool {
        self.fd_flags().contains(FdFlags::BRS)
    }

    /// Gets the error state indicator of the transmitting node
    pub fn is_esi(&self) -> bool {
        self.fd_flags().contains(FdFlags::ESI)
    }

    /// Whether the identifier word has the extended-format flag set.
    pub fn is_extended(&self) -> bool {
        self.id & CAN_EFF_FLAG != 0
    }
}

impl Default for FdFrame {
    /// The default frame has all fields and data set to zero.
    fn default() -> Self {
        Self {
            id: 0,
            len: 0,
            flags: 0,
            data: [0; CANFD_MAX_DLEN],
        }
    }
}

impl fmt::Debug for FdFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "FdFrame {{ ")?;
        fmt::UpperHex::fmt(self, f)?;
        write!(f, " }}")
    }
}

impl fmt::UpperHex for FdFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:X}##{:X} ", self.id, self.flags)?;
        let mut parts = self.data().iter().map(|v| format!("{:02X}", v));
        write!(f, "{}", parts.join(" "))
    }
}

impl fmt::Display for FdFrame {
    /// The multi-line dump printed by the reader.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "CAN ID: {}", self.id)?;
        writeln!(f, "Data length: {}", self.len)?;
        write!(f, "Received frame data: ")?;
        for b in self.data() {
            write!(f, "{:02X} ", b)?;
        }
        Ok(())
    }
}

impl EmbeddedFrame for FdFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        FdFrame::new(id_to_canid_t(id), data).ok()
    }

    /// CAN FD frames don't support remote requests
    fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
        None
    }

    fn is_extended(&self) -> bool {
        FdFrame::is_extended(self)
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> Id {
        if self.is_extended() {
            // Masked to 29 bits, so always valid
            ExtendedId::new(self.id & CAN_EFF_MASK)
                .map(Id::Extended)
                .unwrap_or(Id::Extended(ExtendedId::ZERO))
        } else {
            StandardId::new((self.id & CAN_SFF_MASK) as u16)
                .map(Id::Standard)
                .unwrap_or(Id::Standard(StandardId::ZERO))
        }
    }

    /// Data length code
    fn dlc(&self) -> usize {
        match self.len {
            0..=8 => self.len as usize,
            9..=12 => 0x09,
            13..=16 => 0x0A,
            17..=20 => 0x0B,
            21..=24 => 0x0C,
            25..=32 => 0x0D,
            33..=48 => 0x0E,
            _ => 0x0F,
        }
    }

    fn data(&self) -> &[u8] {
        FdFrame::data(self)
    }
}

/////////////////////////////////////////////////////////////////////////////
