use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serialframe_engine::{DispatchTable, DuplexEngine};
use serialframe_frame::{Frame, Mission2Layout};
use serialframe_transport::{PortConfig, SerialLink};
use tracing::{debug, info, warn};

use crate::cmd::{LinkArgs, ListenArgs};
use crate::exit::{engine_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_frame, OutputFormat};

const POLL: Duration = Duration::from_millis(100);

pub fn run(args: ListenArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let (tx, rx) = mpsc::channel::<Frame>();
    let dispatch = every_tag(tx);

    let port = link.port_config(&args.device);
    let offline = Arc::new(AtomicBool::new(false));
    let engine = {
        let offline = Arc::clone(&offline);
        link.builder()
            .dispatch(dispatch)
            .enable_writer(false)
            .on_disconnect(move |_| offline.store(true, Ordering::SeqCst))
            .open(&port)
            .map_err(|err| engine_error("open failed", err))?
    };

    let device = args.device.display().to_string();
    let layout = Mission2Layout::default();
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        if offline.swap(false, Ordering::SeqCst) {
            if !args.reconnect {
                engine.close();
                return Err(CliError::new(FAILURE, format!("{device} disconnected")));
            }
            warn!(device = %device, "disconnected; waiting for the device to return");
            if !reconnect(&engine, &port, &running) {
                break;
            }
            info!(device = %device, "reconnected");
        }

        let frame = match rx.recv_timeout(POLL) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        print_frame(&frame, &device, layout, format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    engine.close();
    Ok(SUCCESS)
}

/// Reopen the device once its node is back and resume reading. Returns
/// false if interrupted first.
fn reconnect(engine: &DuplexEngine<SerialLink>, port: &PortConfig, running: &AtomicBool) -> bool {
    while running.load(Ordering::SeqCst) {
        if port.path.exists() {
            match engine.reopen(port).and_then(|()| engine.enable_reader()) {
                Ok(()) => return true,
                Err(err) => debug!(error = %err, "reopen failed; retrying"),
            }
        }
        thread::sleep(POLL);
    }
    false
}

/// Route every mission tag into one channel so nothing is dropped unprinted.
fn every_tag(tx: mpsc::Sender<Frame>) -> DispatchTable {
    (0..=u8::MAX).fold(DispatchTable::new(), |table, tag| {
        let tx = tx.clone();
        table.on(tag, move |frame: &Frame| {
            let _ = tx.send(frame.clone());
        })
    })
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
