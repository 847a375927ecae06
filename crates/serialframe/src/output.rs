use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serialframe_frame::{hex_dump, Frame, Mission1, Mission2, Mission2Layout, MISSION_1, MISSION_2};
use serialframe_transport::PortInfo;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Typed view of a received frame, when its tag is a built-in mission.
#[derive(Serialize, Debug, PartialEq)]
#[serde(tag = "mission", rename_all = "snake_case")]
pub enum Decoded {
    Mission1 { x: u32 },
    Mission2 { x: u16, y: f32 },
}

impl Decoded {
    pub fn from_frame(frame: &Frame, layout: Mission2Layout) -> Option<Self> {
        match frame.tag() {
            MISSION_1 => Mission1::decode(frame).map(|m| Decoded::Mission1 { x: m.x }),
            MISSION_2 => Mission2::decode(frame, layout).map(|m| Decoded::Mission2 { x: m.x, y: m.y }),
            _ => None,
        }
    }

    fn summary(&self) -> String {
        match self {
            Decoded::Mission1 { x } => format!("x={x}"),
            Decoded::Mission2 { x, y } => format!("x={x} y={y}"),
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    device: &'a str,
    tag: u8,
    payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    decoded: Option<&'a Decoded>,
    timestamp: String,
}

pub fn print_frame(frame: &Frame, device: &str, layout: Mission2Layout, format: OutputFormat) {
    let decoded = Decoded::from_frame(frame, layout);
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                device,
                tag: frame.tag(),
                payload: hex_dump(frame.payload()),
                decoded: decoded.as_ref(),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TAG", "PAYLOAD", "DECODED"])
                .add_row(vec![
                    format!("0x{:02x}", frame.tag()),
                    hex_dump(frame.payload()),
                    decoded.as_ref().map(Decoded::summary).unwrap_or_default(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let summary = decoded.as_ref().map(Decoded::summary).unwrap_or_default();
            println!(
                "tag=0x{:02x} payload=[{}] {}",
                frame.tag(),
                hex_dump(frame.payload()),
                summary
            );
        }
        OutputFormat::Raw => print_raw(frame.as_bytes()),
    }
}

#[derive(Serialize)]
struct PortOutput<'a> {
    name: &'a str,
    kind: &'a str,
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<_> = ports
                .iter()
                .map(|p| PortOutput {
                    name: &p.name,
                    kind: &p.kind,
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "TYPE"]);
            for port in ports {
                table.add_row(vec![port.name.clone(), port.kind.clone()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for port in ports {
                println!("{}\t{}", port.name, port.kind);
            }
        }
    }
}

#[derive(Serialize)]
pub struct SendSummary<'a> {
    pub device: &'a str,
    pub mission: u8,
    pub frames_sent: usize,
    pub threaded: bool,
    pub discarded_bytes: usize,
}

pub fn print_send_summary(summary: &SendSummary<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(summary).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["DEVICE", "MISSION", "SENT", "MODE", "DISCARDED"])
                .add_row(vec![
                    summary.device.to_string(),
                    format!("0x{:02x}", summary.mission),
                    summary.frames_sent.to_string(),
                    mode(summary.threaded).to_string(),
                    summary.discarded_bytes.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => println!(
            "sent {} frame(s) of mission 0x{:02x} to {} ({})",
            summary.frames_sent,
            summary.mission,
            summary.device,
            mode(summary.threaded)
        ),
    }
}

fn mode(threaded: bool) -> &'static str {
    if threaded {
        "paced"
    } else {
        "direct"
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use serialframe_frame::{FrameLayout, Mission};

    use super::*;

    #[test]
    fn decodes_builtin_missions() {
        let layout = FrameLayout::new(10).expect("layout");
        let m1 = layout
            .encode(|buf| Mission1 { x: 9 }.encode(buf))
            .expect("mission 1");
        let m2 = layout
            .encode(|buf| Mission2::new(513, -2.25).encode(buf))
            .expect("mission 2");
        let other = layout
            .encode(|buf| {
                buf.set_tag(0x33);
                Ok(())
            })
            .expect("custom");

        let fields = Mission2Layout::default();
        assert_eq!(
            Decoded::from_frame(&m1, fields),
            Some(Decoded::Mission1 { x: 9 })
        );
        assert_eq!(
            Decoded::from_frame(&m2, fields),
            Some(Decoded::Mission2 { x: 513, y: -2.25 })
        );
        assert_eq!(Decoded::from_frame(&other, fields), None);
    }

    #[test]
    fn decoded_serializes_with_mission_tag() {
        let json = serde_json::to_string(&Decoded::Mission2 { x: 1, y: 0.5 }).expect("json");
        assert_eq!(json, r#"{"mission":"mission2","x":1,"y":0.5}"#);
    }
}
