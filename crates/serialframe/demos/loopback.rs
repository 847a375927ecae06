//! Two engines joined by an in-memory link.
//!
//! One side sends mission 1 and mission 2 frames through its paced writer,
//! preceded by line noise; the other decodes and prints them.
//!
//! Run with: `cargo run -p serialframe --example loopback`

use std::sync::mpsc;
use std::time::Duration;

use serialframe::engine::{DispatchTable, EngineBuilder, EngineConfig};
use serialframe::frame::{Mission1, Mission2, Mission2Layout};
use serialframe::transport::{MemoryPort, PortHandle};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (a, b) = MemoryPort::pair("/dev/loop-a", "/dev/loop-b");
    let timeout = Duration::from_millis(20);
    let config = EngineConfig {
        frame_len: 10,
        send_frequency_hz: 50.0,
        ..EngineConfig::default()
    };

    let (tx, rx) = mpsc::channel();
    let tx2 = tx.clone();
    let dispatch = DispatchTable::new()
        .on_mission1(move |x| {
            let _ = tx.send(format!("mission 1: x={x}"));
        })
        .on_mission2(Mission2Layout::default(), move |x, y| {
            let _ = tx2.send(format!("mission 2: x={x} y={y}"));
        });

    let receiver = EngineBuilder::new(config.clone())
        .dispatch(dispatch)
        .enable_writer(false)
        .start(b.with_read_timeout(timeout))?;

    let mut noisy = a.clone();
    noisy.write(&[0xAA, 0x55, b'?'])?;

    let sender = EngineBuilder::new(config)
        .enable_reader(false)
        .start(a.with_read_timeout(timeout))?;
    for x in 0..3 {
        sender.send_mission(&Mission1 { x: x * 1000 })?;
    }
    sender.send_mission(&Mission2::new(513, -2.25))?;

    for _ in 0..4 {
        let line = rx.recv_timeout(Duration::from_secs(2))?;
        println!("{line}");
    }

    let report = sender.close();
    println!("sender closed, {} bytes discarded", report.discarded_bytes);
    receiver.close();
    Ok(())
}
