// canfd/src/socket.rs
//
// The raw CAN FD socket and the driver session built on it.
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.

//! Raw CAN FD sockets and the driver [`Session`].
//!
//! A [`Session`] is opened from a validated [`Config`] in five strictly
//! ordered steps: create the raw socket, enable FD frames on it, look up the
//! interface, bind to it, and install the identifier filters (if any). A failure at any
//! step drops whatever was acquired before it, so no descriptor leaks, and
//! reports an error naming the step.
//!
//! The operating system is reached through two small traits, [`CanHost`]
//! and [`RawSocket`]. [`LinuxHost`] and [`CanFdRawSocket`] are the real
//! SocketCAN implementations; anything else can stand in for them, which is
//! how the session logic is tested without CAN hardware.

use crate::{CanAddr, Config, Error, FdFrame, Result};
use libc::{canid_t, socklen_t, AF_CAN, EINPROGRESS};
use nix::net::if_::if_nametoindex;
use std::{
    fmt,
    io::{self, Read, Write},
    mem,
    os::{
        raw::{c_int, c_void},
        unix::io::{AsFd, AsRawFd, BorrowedFd, RawFd},
    },
    ptr,
    time::Duration,
};

pub use libc::{CANFD_MTU, CAN_RAW, CAN_RAW_FD_FRAMES, CAN_RAW_FILTER, SOL_CAN_RAW};

/// Tells a read timeout apart from a real failure.
///
/// A session with a read timeout reports an expired wait as an
/// [`Error::Read`]. Loops use `should_retry` to skip those quietly and only
/// log the rest.
pub trait ShouldRetry {
    /// `true` if the operation merely timed out and can be issued again.
    fn should_retry(&self) -> bool;
}

impl ShouldRetry for io::Error {
    fn should_retry(&self) -> bool {
        match self.kind() {
            // EAGAIN/EWOULDBLOCK from an expired SO_RCVTIMEO
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => true,
            _ => matches!(self.raw_os_error(), Some(errno) if errno == EINPROGRESS),
        }
    }
}

impl ShouldRetry for Error {
    fn should_retry(&self) -> bool {
        match self {
            Error::Read(e) | Error::Write(e) => e.should_retry(),
            _ => false,
        }
    }
}

impl<T: fmt::Debug> ShouldRetry for Result<T> {
    fn should_retry(&self) -> bool {
        match *self {
            Err(ref e) => e.should_retry(),
            _ => false,
        }
    }
}

// ===== CanFilter =====

/// The CAN filter defines which ID's can be accepted on a socket.
///
/// Each filter contains an internal id and mask. Packets are considered to
/// be matched by a filter if `received_id & mask == filter_id & mask` holds
/// true. A socket with several filters delivers a frame that matches any
/// one of them.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub struct CanFilter(libc::can_filter);

impl CanFilter {
    /// Construct a new CAN filter.
    pub fn new(id: canid_t, mask: canid_t) -> Self {
        Self(libc::can_filter {
            can_id: id,
            can_mask: mask,
        })
    }

    /// The identifier to match.
    pub fn id(&self) -> canid_t {
        self.0.can_id
    }

    /// The bits of the identifier that are compared.
    pub fn mask(&self) -> canid_t {
        self.0.can_mask
    }

    /// Whether a frame with the raw identifier `id` passes this filter.
    pub fn matches(&self, id: canid_t) -> bool {
        id & self.mask() == self.id() & self.mask()
    }
}

impl From<(u32, u32)> for CanFilter {
    fn from(filt: (u32, u32)) -> Self {
        CanFilter::new(filt.0, filt.1)
    }
}

impl AsRef<libc::can_filter> for CanFilter {
    fn as_ref(&self) -> &libc::can_filter {
        &self.0
    }
}

// ===== OS seam =====

/// The operations a session needs from an open raw CAN socket.
///
/// The socket is closed when the value is dropped.
pub trait RawSocket {
    /// Enables or disables the exchange of CAN FD frames.
    fn set_fd_frames(&self, enable: bool) -> io::Result<()>;

    /// Binds the socket to a CAN interface.
    fn bind(&self, addr: &CanAddr) -> io::Result<()>;

    /// Installs all the identifier filters in one call.
    fn set_filters(&self, filters: &[CanFilter]) -> io::Result<()>;

    /// Sets the read timeout. `None` blocks indefinitely.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Reads one record, returning the number of bytes received.
    fn read_record(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes one record, returning the number of bytes sent.
    fn write_record(&self, buf: &[u8]) -> io::Result<usize>;
}

/// The host side of the CAN subsystem: creating sockets and naming
/// interfaces.
pub trait CanHost {
    /// The type of socket created by this host.
    type Socket: RawSocket;

    /// Creates a new, unbound raw CAN socket.
    fn open_socket(&self) -> io::Result<Self::Socket>;

    /// Looks up the kernel index of a named network interface.
    fn if_index(&self, ifname: &str) -> io::Result<u32>;
}

// ===== LinuxHost / CanFdRawSocket =====

/// The local Linux SocketCAN subsystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxHost;

impl CanHost for LinuxHost {
    type Socket = CanFdRawSocket;

    fn open_socket(&self) -> io::Result<CanFdRawSocket> {
        CanFdRawSocket::new()
    }

    fn if_index(&self, ifname: &str) -> io::Result<u32> {
        Ok(if_nametoindex(ifname)?)
    }
}

/// A raw SocketCAN socket (`PF_CAN`, `SOCK_RAW`, `CAN_RAW`).
///
/// Internally this is just a wrapped socket descriptor, closed on drop.
#[allow(missing_copy_implementations)]
#[derive(Debug)]
pub struct CanFdRawSocket(socket2::Socket);

impl CanFdRawSocket {
    /// Creates a new, unbound raw CAN socket.
    pub fn new() -> io::Result<Self> {
        let af_can = socket2::Domain::from(AF_CAN);
        let can_raw = socket2::Protocol::from(CAN_RAW);

        let sock = socket2::Socket::new_raw(af_can, socket2::Type::RAW, Some(can_raw))?;
        Ok(Self(sock))
    }

    /// Gets a shared reference to the underlying socket object
    pub fn as_raw_socket(&self) -> &socket2::Socket {
        &self.0
    }

    /// Sets an option on the socket.
    ///
    /// Note that the `val` parameter must be specified correctly; if an option
    /// expects an integer, it is advisable to pass in a `c_int`, not the default
    /// of `i32`.
    fn set_socket_option<T>(&self, level: c_int, name: c_int, val: &T) -> io::Result<()> {
        let ret = unsafe {
            libc::setsockopt(
                self.as_raw_fd(),
                level,
                name,
                val as *const _ as *const c_void,
                mem::size_of::<T>() as socklen_t,
            )
        };

        match ret {
            0 => Ok(()),
            _ => Err(io::Error::last_os_error()),
        }
    }

    /// Sets a collection of multiple socket options with one call.
    fn set_socket_option_mult<T>(&self, level: c_int, name: c_int, values: &[T]) -> io::Result<()> {
        let ret = if values.is_empty() {
            // can't pass in a ptr to a 0-len slice, pass a null ptr instead
            unsafe { libc::setsockopt(self.as_raw_fd(), level, name, ptr::null(), 0) }
        } else {
            unsafe {
                libc::setsockopt(
                    self.as_raw_fd(),
                    level,
                    name,
                    values.as_ptr().cast(),
                    mem::size_of_val(values) as socklen_t,
                )
            }
        };

        match ret {
            0 => Ok(()),
            _ => Err(io::Error::last_os_error()),
        }
    }
}

impl RawSocket for CanFdRawSocket {
    fn set_fd_frames(&self, enable: bool) -> io::Result<()> {
        let enable = c_int::from(enable);
        self.set_socket_option(SOL_CAN_RAW, CAN_RAW_FD_FRAMES, &enable)
    }

    fn bind(&self, addr: &CanAddr) -> io::Result<()> {
        self.0.bind(&socket2::SockAddr::from(*addr))
    }

    fn set_filters(&self, filters: &[CanFilter]) -> io::Result<()> {
        self.set_socket_option_mult(SOL_CAN_RAW, CAN_RAW_FILTER, filters)
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.0.set_read_timeout(timeout)
    }

    fn read_record(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.as_raw_socket().read(buf)
    }

    fn write_record(&self, buf: &[u8]) -> io::Result<usize> {
        self.as_raw_socket().write(buf)
    }
}

impl AsRawFd for CanFdRawSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

impl AsFd for CanFdRawSocket {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.as_fd()
    }
}

// ===== Session =====

/// A CAN FD socket bound to one interface, ready to exchange frames.
///
/// The session exclusively owns its socket. The socket is released by
/// [`Session::close`] or when the session is dropped, whichever comes first.
#[derive(Debug)]
pub struct Session<S: RawSocket = CanFdRawSocket> {
    sock: Option<S>,
    iface: String,
    if_index: u32,
    filters: Vec<CanFilter>,
}

impl Session {
    /// Opens a session on the local SocketCAN subsystem.
    pub fn open(config: &Config) -> Result<Self> {
        Self::open_on(&LinuxHost, config)
    }
}

impl<S: RawSocket> Session<S> {
    /// Opens a session on the given host.
    pub fn open_on<H>(host: &H, config: &Config) -> Result<Self>
    where
        H: CanHost<Socket = S>,
    {
        config.validate()?;
        let iface = config.interface_name.as_str();

        let sock = host.open_socket().map_err(|source| Error::Socket {
            context: "Socket creation failed",
            source,
        })?;
        log::debug!("Raw CAN socket created");

        sock.set_fd_frames(true).map_err(|source| Error::Socket {
            context: "Setting CAN FD option failed",
            source,
        })?;
        log::debug!("CAN FD frames enabled");

        let if_index = host.if_index(iface).map_err(|source| Error::Interface {
            name: iface.into(),
            source,
        })?;
        log::debug!("Interface {} has index {}", iface, if_index);

        sock.bind(&CanAddr::new(if_index)).map_err(|source| Error::Bind {
            name: iface.into(),
            source,
        })?;
        log::info!("Socket setup complete.");

        let filters = config.filters();
        if !filters.is_empty() {
            sock.set_filters(&filters).map_err(Error::Filter)?;
            log::info!("CAN filters set up.");
        }

        if let Some(timeout) = config.read_timeout() {
            sock.set_read_timeout(Some(timeout)).map_err(|source| Error::Socket {
                context: "Setting read timeout failed",
                source,
            })?;
            log::debug!("Read timeout set to {:?}", timeout);
        }

        Ok(Self {
            sock: Some(sock),
            iface: iface.into(),
            if_index,
            filters,
        })
    }

    fn socket(&self) -> Result<&S> {
        self.sock.as_ref().ok_or(Error::Closed)
    }

    /// The name of the bound interface.
    pub fn interface(&self) -> &str {
        &self.iface
    }

    /// The kernel index of the bound interface.
    pub fn if_index(&self) -> u32 {
        self.if_index
    }

    /// The filters installed on the socket. Empty when all frames pass.
    pub fn filters(&self) -> &[CanFilter] {
        &self.filters
    }

    /// Whether the socket is still open.
    pub fn is_open(&self) -> bool {
        self.sock.is_some()
    }

    /// Blocking read of a single frame.
    ///
    /// Anything short of a complete CAN FD record is an error; a truncated
    /// record is never turned into a frame. Classic CAN frames, which arrive
    /// as shorter records, are reported as short reads.
    pub fn receive(&self) -> Result<FdFrame> {
        let sock = self.socket()?;
        let mut rec = [0u8; CANFD_MTU];

        let n = sock.read_record(&mut rec).map_err(Error::Read)?;
        if n < CANFD_MTU {
            return Err(Error::ShortRead {
                len: n,
                expected: CANFD_MTU,
            });
        }
        Ok(FdFrame::from_record(&rec)?)
    }

    /// Writes a single frame as one complete CAN FD record.
    pub fn send(&self, frame: &FdFrame) -> Result<()> {
        let sock = self.socket()?;
        let rec = frame.to_record();

        let n = sock.write_record(&rec).map_err(Error::Write)?;
        if n < CANFD_MTU {
            return Err(Error::ShortWrite {
                len: n,
                expected: CANFD_MTU,
            });
        }
        Ok(())
    }

    /// Releases the socket.
    ///
    /// Only the first call has any effect. There is nothing a caller could
    /// do about a failing close, so none is reported.
    pub fn close(&mut self) {
        if let Some(sock) = self.sock.take() {
            drop(sock);
            log::debug!("Socket closed.");
        }
    }
}

impl<S: RawSocket> Drop for Session<S> {
    fn drop(&mut self) {
        self.close();
    }
}

/////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{Call, SimHost, Step, SIM_IFACE, SIM_IFINDEX};
    use libc::CAN_SFF_MASK;

    fn config(filters: &[u32]) -> Config {
        Config::new(SIM_IFACE, filters.to_vec())
    }

    #[test]
    fn test_open_steps_in_order() {
        let host = SimHost::new();
        let sess = Session::open_on(&host, &config(&[256, 512])).unwrap();

        assert!(sess.is_open());
        assert_eq!(SIM_IFACE, sess.interface());
        assert_eq!(SIM_IFINDEX, sess.if_index());
        assert_eq!(
            vec![
                Call::Socket,
                Call::FdFrames(true),
                Call::IfIndex(SIM_IFACE.into()),
                Call::Bind(SIM_IFINDEX),
                Call::Filters(vec![
                    CanFilter::new(256, CAN_SFF_MASK),
                    CanFilter::new(512, CAN_SFF_MASK)
                ]),
            ],
            host.calls()
        );
        assert_eq!(1, host.open_sockets());
    }

    #[test]
    fn test_filter_counts() {
        for n in 0..5u32 {
            let host = SimHost::new();
            let ids: Vec<u32> = (0..n).map(|i| 0x100 + i).collect();
            let sess = Session::open_on(&host, &config(&ids)).unwrap();

            let filter_calls: Vec<_> = host
                .calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Filters(f) => Some(f),
                    _ => None,
                })
                .collect();

            if n == 0 {
                assert!(filter_calls.is_empty());
            } else {
                assert_eq!(1, filter_calls.len());
                let installed = &filter_calls[0];
                assert_eq!(n as usize, installed.len());
                for (filt, id) in installed.iter().zip(&ids) {
                    assert_eq!(*id, filt.id());
                    assert_eq!(CAN_SFF_MASK, filt.mask());
                }
            }
            assert_eq!(n as usize, sess.filters().len());
        }
    }

    #[test]
    fn test_read_timeout_applied() {
        let host = SimHost::new();
        let mut cfg = config(&[]);
        cfg.read_timeout_ms = Some(100);

        let _sess = Session::open_on(&host, &cfg).unwrap();
        assert_eq!(
            Some(&Call::ReadTimeout(Some(Duration::from_millis(100)))),
            host.calls().last()
        );
    }

    #[test]
    fn test_invalid_config_opens_nothing() {
        let host = SimHost::new();
        let mut cfg = config(&[]);
        cfg.read_timeout_ms = Some(0);

        let err = Session::open_on(&host, &cfg).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.is_fatal());
        assert!(host.calls().is_empty());
        assert_eq!(0, host.created_sockets());
    }

    #[test]
    fn test_failure_releases_socket() {
        let cases = [
            (Step::Socket, 0),
            (Step::FdFrames, 1),
            (Step::IfIndex, 1),
            (Step::Bind, 1),
            (Step::Filters, 1),
            (Step::ReadTimeout, 1),
        ];

        for (step, created) in cases {
            let host = SimHost::new().fail_at(step);
            let mut cfg = config(&[0x10]);
            cfg.read_timeout_ms = Some(10);

            let err = Session::open_on(&host, &cfg).unwrap_err();
            assert!(err.is_fatal(), "{:?}", step);

            match step {
                Step::Socket | Step::FdFrames | Step::ReadTimeout => {
                    assert!(matches!(err, Error::Socket { .. }))
                }
                Step::IfIndex => assert!(matches!(err, Error::Interface { .. })),
                Step::Bind => assert!(matches!(err, Error::Bind { .. })),
                Step::Filters => assert!(matches!(err, Error::Filter(_))),
            }

            assert_eq!(created, host.created_sockets(), "{:?}", step);
            assert_eq!(0, host.open_sockets(), "{:?}", step);
        }
    }

    #[test]
    fn test_unknown_interface() {
        let host = SimHost::new();
        let err = Session::open_on(&host, &Config::new("nocan0", vec![])).unwrap_err();
        assert!(matches!(err, Error::Interface { ref name, .. } if name == "nocan0"));
        assert_eq!(0, host.open_sockets());
    }

    #[test]
    fn test_receive() {
        let host = SimHost::new();
        let frame = FdFrame::new(0x123, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        host.push_read(Ok(frame.to_record().to_vec()));

        let sess = Session::open_on(&host, &config(&[])).unwrap();
        let rx = sess.receive().unwrap();
        assert_eq!(frame, rx);
    }

    #[test]
    fn test_short_read() {
        let host = SimHost::new();
        let rec = FdFrame::new(0x123, &[0xFF; 8]).unwrap().to_record();
        for len in [0, 1, 16, CANFD_MTU - 1] {
            host.push_read(Ok(rec[..len].to_vec()));
        }

        let sess = Session::open_on(&host, &config(&[])).unwrap();
        for len in [0, 1, 16, CANFD_MTU - 1] {
            match sess.receive() {
                Err(Error::ShortRead {
                    len: n,
                    expected: CANFD_MTU,
                }) => assert_eq!(len, n),
                res => panic!("expected a short read, got {:?}", res),
            }
        }
    }

    #[test]
    fn test_read_error() {
        let host = SimHost::new();
        host.push_read(Err(io::Error::from_raw_os_error(libc::ENETDOWN)));
        host.push_read(Err(io::ErrorKind::WouldBlock.into()));

        let sess = Session::open_on(&host, &config(&[])).unwrap();

        let res = sess.receive();
        assert!(matches!(res, Err(Error::Read(_))));
        assert!(!res.should_retry());

        let res = sess.receive();
        assert!(matches!(res, Err(Error::Read(_))));
        assert!(res.should_retry());
    }

    #[test]
    fn test_send() {
        let host = SimHost::new();
        let sess = Session::open_on(&host, &config(&[])).unwrap();

        let frame = FdFrame::with_flags(0x42, b"hello", 1).unwrap();
        sess.send(&frame).unwrap();

        let written = host.written();
        assert_eq!(1, written.len());
        assert_eq!(&frame.to_record()[..], &written[0][..]);
    }

    #[test]
    fn test_send_errors() {
        let host = SimHost::new();
        host.push_write(Err(io::Error::from_raw_os_error(libc::ENOBUFS)));
        host.push_write(Ok(16));

        let sess = Session::open_on(&host, &config(&[])).unwrap();
        let frame = FdFrame::new(0x42, &[1]).unwrap();

        assert!(matches!(sess.send(&frame), Err(Error::Write(_))));
        assert!(matches!(
            sess.send(&frame),
            Err(Error::ShortWrite {
                len: 16,
                expected: CANFD_MTU
            })
        ));
        assert!(sess.send(&frame).is_ok());
    }

    #[test]
    fn test_close_is_idempotent() {
        let host = SimHost::new();
        let mut sess = Session::open_on(&host, &config(&[])).unwrap();
        assert_eq!(1, host.open_sockets());

        sess.close();
        assert!(!sess.is_open());
        assert_eq!(0, host.open_sockets());

        sess.close();
        drop(sess);
        assert_eq!(1, host.closed_sockets());
    }

    #[test]
    fn test_io_after_close() {
        let host = SimHost::new();
        let mut sess = Session::open_on(&host, &config(&[])).unwrap();
        sess.close();

        assert!(matches!(sess.receive(), Err(Error::Closed)));
        assert!(matches!(
            sess.send(&FdFrame::default()),
            Err(Error::Closed)
        ));
    }

    #[test]
    fn test_independent_sessions() {
        let host_a = SimHost::new();
        let host_b = SimHost::new();

        let a = Session::open_on(&host_a, &config(&[1])).unwrap();
        let b = Session::open_on(&host_b, &config(&[2])).unwrap();

        a.send(&FdFrame::new(1, &[]).unwrap()).unwrap();
        assert_eq!(1, host_a.written().len());
        assert!(host_b.written().is_empty());
        drop(a);
        assert_eq!(0, host_a.open_sockets());
        assert_eq!(1, host_b.open_sockets());
        drop(b);
    }

    #[test]
    fn test_filter_matches() {
        let filt = CanFilter::new(0x100, CAN_SFF_MASK);
        assert!(filt.matches(0x100));
        assert!(!filt.matches(0x200));
        // only the low 11 bits are compared
        assert!(filt.matches(0x100 | 0x800));
        assert_eq!(filt, CanFilter::from((0x100, CAN_SFF_MASK)));
    }

    #[test]
    fn test_should_retry() {
        assert!(io::Error::from(io::ErrorKind::WouldBlock).should_retry());
        assert!(io::Error::from_raw_os_error(EINPROGRESS).should_retry());
        assert!(!io::Error::from_raw_os_error(libc::ENODEV).should_retry());

        let err = Error::ShortRead {
            len: 0,
            expected: CANFD_MTU,
        };
        assert!(!err.should_retry());
    }
}
