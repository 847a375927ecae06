use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

use serialframe_engine::{EngineBuilder, EngineConfig};
use serialframe_frame::DEFAULT_FRAME_LEN;
use serialframe_transport::{PortConfig, DEFAULT_BAUD_RATE};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod listen;
pub mod ports;
pub mod send;
pub mod telemetry;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List serial ports on this machine.
    Ports(PortsArgs),
    /// Send mission frames.
    Send(SendArgs),
    /// Print received frames.
    Listen(ListenArgs),
    /// Send one JustFloat telemetry packet.
    Telemetry(TelemetryArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ports(args) => ports::run(args, format),
        Command::Send(args) => send::run(args, link, format),
        Command::Listen(args) => listen::run(args, link, format),
        Command::Telemetry(args) => telemetry::run(args, link),
        Command::Version(args) => version::run(args, link, format),
    }
}

/// Link settings shared by every command that opens a device.
#[derive(Args, Debug, Clone)]
pub struct LinkArgs {
    /// Frame length in bytes.
    #[arg(long, default_value_t = DEFAULT_FRAME_LEN, global = true)]
    pub frame_len: usize,
    /// Frames per second the paced writer sends at most.
    #[arg(long, default_value_t = 300.0, global = true)]
    pub frequency: f64,
    /// Baud rate.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE, global = true)]
    pub baud: u32,
    /// Hex-dump every frame at debug level.
    #[arg(long, global = true)]
    pub trace_frames: bool,
}

impl LinkArgs {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            frame_len: self.frame_len,
            send_frequency_hz: self.frequency,
            trace_frames: self.trace_frames,
            ..EngineConfig::default()
        }
    }

    pub fn port_config(&self, device: &Path) -> PortConfig {
        PortConfig::new(device).with_baud_rate(self.baud)
    }

    pub fn builder(&self) -> EngineBuilder {
        EngineBuilder::new(self.engine_config())
    }
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Serial device to open.
    pub device: PathBuf,
    /// Built-in mission to send (1 or 2).
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=2))]
    pub mission: u8,
    /// Integer field: u32 for mission 1, u16 for mission 2.
    #[arg(long, default_value_t = 0)]
    pub x: u32,
    /// Float field of mission 2.
    #[arg(long, allow_negative_numbers = true)]
    pub y: Option<f32>,
    /// Number of frames to send.
    #[arg(long, default_value_t = 1)]
    pub repeat: usize,
    /// Delay between frames (e.g. 100ms, 1s).
    #[arg(long, default_value = "100ms")]
    pub interval: String,
    /// Queue frames for the paced writer instead of writing directly.
    #[arg(long)]
    pub threaded: bool,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Serial device to open.
    pub device: PathBuf,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Keep listening across disconnects, reopening the device when it returns.
    #[arg(long)]
    pub reconnect: bool,
}

#[derive(Args, Debug)]
pub struct TelemetryArgs {
    /// Serial device to open.
    pub device: PathBuf,
    /// Values to send (comma-separated).
    #[arg(long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
    pub values: Vec<f32>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
