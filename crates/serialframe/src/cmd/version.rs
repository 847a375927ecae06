use serde::Serialize;
use serialframe_frame::{MISSION_1, MISSION_2};

use crate::cmd::{LinkArgs, VersionArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

/// Build provenance plus the link settings this invocation would use.
#[derive(Serialize, Debug)]
struct BuildInfo {
    name: &'static str,
    version: &'static str,
    target: &'static str,
    rustc: &'static str,
    git_hash: &'static str,
    frame_len: usize,
    frequency_hz: f64,
    baud: u32,
    missions: [u8; 2],
}

impl BuildInfo {
    fn new(link: &LinkArgs) -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            target: option_env!("SERIALFRAME_BUILD_TARGET").unwrap_or("unknown"),
            rustc: option_env!("RUSTC_VERSION").unwrap_or("unknown"),
            git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
            frame_len: link.frame_len,
            frequency_hz: link.frequency,
            baud: link.baud,
            missions: [MISSION_1, MISSION_2],
        }
    }

    fn lines(&self) -> Vec<String> {
        vec![
            format!("name: {}", self.name),
            format!("version: {}", self.version),
            format!("target: {}", self.target),
            format!("rustc: {}", self.rustc),
            format!("git_hash: {}", self.git_hash),
            format!(
                "link: {}-byte frames at {} Hz, {} baud",
                self.frame_len, self.frequency_hz, self.baud
            ),
            format!(
                "missions: 0x{:02x}, 0x{:02x}",
                self.missions[0], self.missions[1]
            ),
        ]
    }
}

pub fn run(args: VersionArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let info = BuildInfo::new(link);
    match (args.extended, format) {
        (true, OutputFormat::Json) => println!(
            "{}",
            serde_json::to_string(&info).unwrap_or_else(|_| "{}".to_string())
        ),
        (true, _) => {
            for line in info.lines() {
                println!("{line}");
            }
        }
        (false, OutputFormat::Json) => println!(
            "{}",
            serde_json::json!({ "name": info.name, "version": info.version })
        ),
        (false, _) => println!("{} {}", info.name, info.version),
    }
    Ok(SUCCESS)
}
