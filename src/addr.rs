// canfd/src/addr.rs
//
// SocketCAN address for binding the raw socket.
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.

//! The bind address of a raw CAN socket.

use libc::{sa_family_t, sockaddr_can, sockaddr_storage, socklen_t, AF_CAN};
use socket2::SockAddr;
use std::{fmt, mem, os::raw::c_int, ptr};

/// The address a raw CAN socket binds to.
///
/// For `CAN_RAW` only the family and the interface index matter; the
/// transport part of `sockaddr_can` stays zeroed.
#[derive(Clone, Copy)]
pub struct CanAddr(sockaddr_can);

impl CanAddr {
    /// The address of the interface with kernel index `ifindex`.
    pub fn new(ifindex: u32) -> Self {
        let mut addr = Self::default();
        addr.0.can_ifindex = ifindex as c_int;
        addr
    }

    /// The kernel interface index.
    pub fn if_index(&self) -> u32 {
        self.0.can_ifindex as u32
    }

    /// Size of `sockaddr_can` in bytes.
    pub fn len() -> usize {
        mem::size_of::<sockaddr_can>()
    }

    /// Places the address at the start of a zeroed `sockaddr_storage`,
    /// returning it with the length of the CAN part.
    pub fn into_storage(self) -> (sockaddr_storage, socklen_t) {
        let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
        // sockaddr_storage is sized and aligned for every address family
        unsafe {
            ptr::write(
                (&mut storage as *mut sockaddr_storage).cast::<sockaddr_can>(),
                self.0,
            );
        }
        (storage, Self::len() as socklen_t)
    }
}

impl Default for CanAddr {
    /// Family `AF_CAN`, interface index 0 (any interface).
    fn default() -> Self {
        let mut addr: sockaddr_can = unsafe { mem::zeroed() };
        addr.can_family = AF_CAN as sa_family_t;
        Self(addr)
    }
}

impl fmt::Debug for CanAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CanAddr")
            .field("family", &self.0.can_family)
            .field("ifindex", &self.0.can_ifindex)
            .finish()
    }
}

impl From<CanAddr> for SockAddr {
    fn from(addr: CanAddr) -> Self {
        let (storage, len) = addr.into_storage();
        unsafe { SockAddr::new(storage, len) }
    }
}

impl AsRef<sockaddr_can> for CanAddr {
    fn as_ref(&self) -> &sockaddr_can {
        &self.0
    }
}

/////////////////////////////////////////////////////////////////////////////
