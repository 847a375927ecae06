use std::thread;
use std::time::Duration;

use serialframe_engine::{DuplexEngine, EngineError, TaskState};
use serialframe_frame::{Mission, Mission1, Mission2};
use serialframe_transport::PortHandle;

use crate::cmd::{LinkArgs, SendArgs};
use crate::exit::{engine_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_send_summary, OutputFormat, SendSummary};

/// Slack on top of the expected drain time before giving up on the writer.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

pub fn run(args: SendArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let mission = build_mission(&args)?;

    let engine = link
        .builder()
        .enable_reader(false)
        .enable_writer(args.threaded)
        .open(&link.port_config(&args.device))
        .map_err(|err| engine_error("open failed", err))?;

    let mut sent = 0usize;
    for i in 0..args.repeat {
        if i > 0 {
            thread::sleep(interval);
        }
        engine
            .send_mission(&*mission)
            .map_err(|err| engine_error("send failed", err))?;
        sent += 1;
    }

    if args.threaded {
        wait_for_drain(&engine, sent)?;
    }
    let report = engine.close();

    print_send_summary(
        &SendSummary {
            device: &args.device.display().to_string(),
            mission: mission.tag(),
            frames_sent: sent,
            threaded: args.threaded,
            discarded_bytes: report.discarded_bytes,
        },
        format,
    );
    Ok(SUCCESS)
}

fn build_mission(args: &SendArgs) -> CliResult<Box<dyn Mission>> {
    match args.mission {
        1 => {
            if args.y.is_some() {
                return Err(CliError::new(USAGE, "--y only applies to mission 2"));
            }
            Ok(Box::new(Mission1 { x: args.x }))
        }
        2 => {
            let x = u16::try_from(args.x).map_err(|_| {
                CliError::new(USAGE, format!("--x {} does not fit mission 2's u16", args.x))
            })?;
            let y = args
                .y
                .ok_or_else(|| CliError::new(USAGE, "mission 2 requires --y"))?;
            Ok(Box::new(Mission2::new(x, y)))
        }
        other => Err(CliError::new(USAGE, format!("unknown mission {other}"))),
    }
}

/// Block until the paced writer has put every queued frame on the wire.
fn wait_for_drain<P: PortHandle>(engine: &DuplexEngine<P>, frames: usize) -> CliResult<()> {
    let period = engine.config().frame_period();
    let budget = period.saturating_mul(u32::try_from(frames).unwrap_or(u32::MAX)) + DRAIN_GRACE;

    if engine.wait_idle(budget) {
        return Ok(());
    }
    if engine.writer_state() == TaskState::Faulted {
        return Err(engine_error(
            "send failed",
            EngineError::QueueOverflow {
                pending: engine.pending_bytes(),
                limit: engine.config().overflow_limit(),
            },
        ));
    }
    Err(CliError::new(
        TIMEOUT,
        format!("writer did not drain {} queued bytes", engine.unsent_bytes()),
    ))
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serialframe_engine::{EngineBuilder, EngineConfig, NullSink};
    use serialframe_frame::{FrameLayout, DEFAULT_FRAME_LEN, MISSION_1, MISSION_2};
    use serialframe_transport::MemoryPort;

    use super::*;

    fn args(mission: u8, x: u32, y: Option<f32>) -> SendArgs {
        SendArgs {
            device: PathBuf::from("/dev/null"),
            mission,
            x,
            y,
            repeat: 1,
            interval: "0ms".to_string(),
            threaded: false,
        }
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("0ms").unwrap(), Duration::ZERO);
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("-1s").is_err());
    }

    #[test]
    fn builds_requested_mission() {
        let layout = FrameLayout::new(10).unwrap();

        let m1 = build_mission(&args(1, 70_000, None)).unwrap();
        assert_eq!(m1.tag(), MISSION_1);
        let frame = layout.encode(|buf| m1.encode(buf)).unwrap();
        assert_eq!(frame.u32_le_at(3), Some(70_000));

        let m2 = build_mission(&args(2, 513, Some(-2.25))).unwrap();
        assert_eq!(m2.tag(), MISSION_2);
        let frame = layout.encode(|buf| m2.encode(buf)).unwrap();
        assert_eq!(frame.u16_le_at(3), Some(513));
        assert_eq!(frame.f32_le_at(5), Some(-2.25));
    }

    fn usage_code(args: &SendArgs) -> Option<i32> {
        build_mission(args).err().map(|err| err.code)
    }

    #[test]
    fn rejects_mismatched_fields() {
        assert_eq!(usage_code(&args(1, 1, Some(1.0))), Some(USAGE));
        assert_eq!(usage_code(&args(2, 1, None)), Some(USAGE));
        assert_eq!(usage_code(&args(2, 70_000, Some(1.0))), Some(USAGE));
    }

    #[test]
    fn drain_waits_for_every_paced_frame() {
        let (local, remote) = MemoryPort::pair("/nonexistent/sf-send", "/nonexistent/sf-peer");
        let config = EngineConfig {
            send_frequency_hz: 20.0,
            ..EngineConfig::default()
        };
        let engine = EngineBuilder::new(config)
            .log_sink(NullSink)
            .enable_reader(false)
            .start(local)
            .expect("engine should start");

        for x in 0..5 {
            engine.send_mission(&Mission1 { x }).expect("send");
        }
        wait_for_drain(&engine, 5).expect("writer should drain");
        let report = engine.close();

        assert_eq!(report.discarded_bytes, 0);
        assert_eq!(remote.available(), 5 * DEFAULT_FRAME_LEN);
    }
}
