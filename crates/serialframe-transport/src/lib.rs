//! Serial port capability abstraction.
//!
//! The framing and engine layers never talk to a device directly. They
//! consume a [`PortHandle`]: something that can read with a bounded timeout,
//! write, report the device path it was opened on, and hand out a second
//! handle to the same device so reading and writing can proceed on
//! different threads.
//!
//! Two implementations ship here:
//! - [`SerialLink`]: a real device opened through the `serialport` crate
//! - [`MemoryPort`]: an in-process loopback pair for tests and demos

pub mod error;
pub mod memory;
pub mod serial;
pub mod traits;

pub use error::{Result, TransportError};
pub use memory::MemoryPort;
pub use serial::{available_ports, PortInfo, SerialLink};
pub use traits::{PortConfig, PortHandle, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};
