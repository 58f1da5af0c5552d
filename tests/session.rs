// canfd/tests/session.rs
//
// Integration tests for CAN FD sessions.
//
// Licensed under the MIT license:
//   <LICENSE or http://opensource.org/licenses/MIT>
// This file may not be copied, modified, or distributed except according
// to those terms.

use canfd::{Config, Error, Session};

#[cfg(feature = "vcan_tests")]
use canfd::{FdFrame, ShouldRetry};

#[cfg(feature = "vcan_tests")]
use serial_test::serial;

// The virtual CAN interface to use for tests.
#[cfg(feature = "vcan_tests")]
const VCAN: &str = "vcan0";

#[test]
fn test_nonexistant_device() {
    let res = Session::open(&Config::new("invalid", vec![]));

    // Hosts without CAN support fail one step earlier.
    match res {
        Err(Error::Interface { ref name, .. }) => assert_eq!("invalid", name),
        Err(Error::Socket { .. }) => (),
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

#[cfg(feature = "vcan_tests")]
fn timeout_config(filters: Vec<u32>) -> Config {
    let mut config = Config::new(VCAN, filters);
    config.read_timeout_ms = Some(100);
    config
}

#[cfg(feature = "vcan_tests")]
#[test]
#[serial]
fn vcan_filtered_receive() {
    let reader = Session::open(&timeout_config(vec![256, 512])).unwrap();
    let writer = Session::open(&Config::new(VCAN, vec![])).unwrap();

    for id in [0x100, 0x300, 0x200, 0x101] {
        let frame = FdFrame::new(id, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        writer.send(&frame).unwrap();
    }

    let frame = reader.receive().unwrap();
    assert_eq!(256, frame.raw_id());
    assert_eq!(&[1, 2, 3, 4, 5, 6, 7, 8], frame.data());

    let frame = reader.receive().unwrap();
    assert_eq!(512, frame.raw_id());

    // Nothing else passes the filters
    assert!(reader.receive().should_retry());
}

#[cfg(feature = "vcan_tests")]
#[test]
#[serial]
fn vcan_unfiltered_fd_round_trip() {
    let reader = Session::open(&timeout_config(vec![])).unwrap();
    let writer = Session::open(&Config::new(VCAN, vec![])).unwrap();

    let data: Vec<u8> = (0..64).collect();
    let frame = FdFrame::with_flags(0x7FF, &data, 1).unwrap();
    writer.send(&frame).unwrap();

    let rx = reader.receive().unwrap();
    assert_eq!(0x7FF, rx.raw_id());
    assert_eq!(&data[..], rx.data());
    assert!(rx.is_brs());
}

#[cfg(feature = "vcan_tests")]
#[test]
#[serial]
fn vcan_timeout() {
    // Accept only an identifier that nobody sends
    let sess = Session::open(&timeout_config(vec![0x7AB])).unwrap();
    assert!(sess.receive().should_retry());
}

#[cfg(feature = "vcan_tests")]
#[test]
#[serial]
fn vcan_close() {
    let mut sess = Session::open(&Config::new(VCAN, vec![])).unwrap();
    assert!(sess.is_open());
    sess.close();
    sess.close();
    assert!(matches!(sess.receive(), Err(Error::Closed)));
}
