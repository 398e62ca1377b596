//! End-to-end exercise of the acquisition pump against a loopback mock
//! transport: connect, query device info, start a scan, grab a rotation,
//! ascend it, and stop cleanly.

use std::time::Duration;

use spinscan::driver::ascend_scan_data;
use spinscan::frame::ResponseHeader;
use spinscan::package::{build_standard_body, encode_package};
use spinscan::{Driver, DriverConfig, MockByteStream};

#[test]
fn full_scan_round_trip() {
    let mut info_reply = ResponseHeader {
        size: 20,
        sub_type: 0,
        msg_type: 0x04,
    }
    .encode()
    .to_vec();
    info_reply.push(5); // model = G4
    info_reply.extend_from_slice(&[0x30, 0x01]); // firmware low=0x30, high=0x01
    info_reply.push(2); // hardware
    info_reply.extend(0u8..16); // serial

    let measurement_header = ResponseHeader {
        size: 0,
        sub_type: 0,
        msg_type: 0x81,
    }
    .encode();
    let body_a = build_standard_body(&[1000, 2000, 3000]);
    let pkg_a = encode_package(1, 0x0101, 0x4D01, &body_a, 3);
    let body_b = build_standard_body(&[4000, 5000]);
    let pkg_b = encode_package(1, 0x0101, 0x4D01, &body_b, 2);

    let mut mock = MockByteStream::new();
    mock.push_inbound(&info_reply);
    mock.push_inbound(&measurement_header);
    mock.push_inbound(&pkg_a);
    mock.push_inbound(&pkg_b);

    let mut driver = Driver::new();
    driver
        .connect_with_stream(mock, DriverConfig::new("mock0", 128_000))
        .expect("connect");

    let info = driver.get_device_info(Duration::from_millis(200)).expect("device info");
    assert_eq!(info.model, 5);
    assert_eq!(info.firmware_major, 1);
    assert_eq!(info.firmware_minor, 4);
    assert_eq!(info.firmware_patch, 8);

    driver.start_scan(false, Duration::from_millis(200)).expect("start scan");
    assert!(driver.is_scanning());

    let scan = driver.grab_scan_data(Duration::from_secs(2)).expect("grab scan");
    assert_eq!(scan.len(), 3);
    assert!(scan[0].is_sync());

    let ascended = ascend_scan_data(scan);
    for pair in ascended.windows(2) {
        assert!(pair[0].angle_raw() <= pair[1].angle_raw());
    }

    driver.stop().expect("stop");
    assert!(!driver.is_scanning());
    assert!(driver.is_connected());

    driver.disconnect().expect("disconnect");
    assert!(!driver.is_connected());
}
