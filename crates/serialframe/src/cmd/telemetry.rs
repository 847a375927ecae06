use crate::cmd::{LinkArgs, TelemetryArgs};
use crate::exit::{engine_error, CliResult, SUCCESS};

pub fn run(args: TelemetryArgs, link: &LinkArgs) -> CliResult<i32> {
    let engine = link
        .builder()
        .enable_reader(false)
        .enable_writer(false)
        .open(&link.port_config(&args.device))
        .map_err(|err| engine_error("open failed", err))?;

    engine
        .send_telemetry(&args.values)
        .map_err(|err| engine_error("telemetry failed", err))?;
    tracing::info!(
        device = %args.device.display(),
        values = args.values.len(),
        "telemetry packet sent"
    );
    Ok(SUCCESS)
}
