//! Concurrent duplex engine for framed serial links.
//!
//! A [`DuplexEngine`] owns three tasks on dedicated threads:
//! - a reader that frames inbound bytes and dispatches them by mission tag,
//! - a writer that drains the send queue at a fixed frame rate,
//! - a watchdog that disables both when the device node disappears.
//!
//! Once the device is back, [`DuplexEngine::reopen`] (or
//! [`DuplexEngine::reattach`] for other port types) switches the engine to
//! the new connection.
//!
//! ```no_run
//! use serialframe_engine::{DispatchTable, EngineBuilder, EngineConfig};
//! use serialframe_frame::Mission1;
//! use serialframe_transport::PortConfig;
//!
//! let dispatch = DispatchTable::new().on_mission1(|x| println!("x = {x}"));
//! let engine = EngineBuilder::new(EngineConfig::default())
//!     .dispatch(dispatch)
//!     .open(&PortConfig::new("/dev/ttyUSB0"))?;
//! engine.send_mission(&Mission1 { x: 42 })?;
//! # Ok::<(), serialframe_engine::EngineError>(())
//! ```

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod log;
pub mod queue;
pub mod task;

pub use config::EngineConfig;
pub use dispatch::{DispatchTable, MissionHandler};
pub use engine::{CloseReport, Delivery, DuplexEngine, EngineBuilder};
pub use error::{EngineError, Result};
pub use log::{LogSink, NullSink, TracingSink};
pub use queue::{CloseReason, Drain, PendingWriteQueue};
pub use task::{TaskKind, TaskState};
