use std::time::Duration;

use serialframe_frame::{
    Extraction, FrameLayout, Mission, Mission1, Mission2, Mission2Layout, SerialChannel,
};
use serialframe_transport::MemoryPort;

fn linked(frame_len: usize) -> (SerialChannel<MemoryPort>, SerialChannel<MemoryPort>) {
    let (a, b) = MemoryPort::pair("/dev/chan-a", "/dev/chan-b");
    let timeout = Duration::from_millis(10);
    let layout = FrameLayout::new(frame_len).expect("layout");
    (
        SerialChannel::new(a.with_read_timeout(timeout), layout, 100).expect("channel a"),
        SerialChannel::new(b.with_read_timeout(timeout), layout, 100).expect("channel b"),
    )
}

fn next_frame(chan: &mut SerialChannel<MemoryPort>) -> serialframe_frame::Frame {
    for _ in 0..16 {
        if let Extraction::Aligned(frame) = chan.read_frame().expect("read") {
            return frame;
        }
    }
    panic!("no frame arrived");
}

#[test]
fn missions_cross_the_link() {
    let (a, mut b) = linked(10);
    let layout = *a.layout();

    for mission in [
        Box::new(Mission1 { x: u32::MAX }) as Box<dyn Mission>,
        Box::new(Mission2::new(513, -2.25)),
    ] {
        let frame = layout.encode(|buf| mission.encode(buf)).expect("encode");
        assert_eq!(a.write_frame(frame.as_bytes()).expect("write"), 10);
    }

    let first = next_frame(&mut b);
    assert_eq!(Mission1::decode(&first), Some(Mission1 { x: u32::MAX }));
    let second = next_frame(&mut b);
    assert_eq!(
        Mission2::decode(&second, Mission2Layout::default()).map(|m| (m.x, m.y)),
        Some((513, -2.25))
    );
}

#[test]
fn receiver_recovers_after_line_noise() {
    let (a, mut b) = linked(8);
    let layout = *a.layout();
    // Noise, a truncated frame, then a good one.
    a.write_frame(&[0x00, 0xFF, b'?', b'!', 0x01, 0x02]).expect("noise");
    let good = layout
        .encode(|buf| Mission1 { x: 42 }.encode(buf))
        .expect("encode");
    a.write_frame(good.as_bytes()).expect("write");

    let frame = next_frame(&mut b);
    assert_eq!(Mission1::decode(&frame), Some(Mission1 { x: 42 }));
}

#[test]
fn closing_one_channel_stops_only_its_own_io() {
    let (a, mut b) = linked(8);
    a.close();
    assert!(a.write_frame(&[0; 8]).is_err());
    assert!(matches!(b.read_frame().expect("read"), Extraction::Insufficient));
    assert!(!a.is_online());
    assert_eq!(b.device_path(), std::path::Path::new("/dev/chan-b"));
}
