use std::rc::Rc;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::sync::mpsc;
use tokio::task::LocalSet;

use crate::adapter::DumpReader;
use crate::cli::RunArgs;
use crate::display::{DisplaySink, NullDisplay};
use crate::input::InputArbiter;
use crate::input_bridge::RecordingInputDevice;
use crate::scheduler::{SchedulerSummary, TickScheduler};
use crate::script_host::ScriptHost;
use crate::scripts;
use crate::settings::Settings;
use crate::stream::StreamServer;

pub fn execute(args: RunArgs) -> Result<SchedulerSummary> {
    let RunArgs {
        settings,
        dump,
        stream_bind,
        reading_time,
        max_ticks,
    } = args;

    let settings_path = settings;
    let mut settings = Settings::load_or_default(&settings_path)
        .with_context(|| format!("loading settings from {}", settings_path.display()))?;
    if let Some(ms) = reading_time {
        settings.root.reading_time = Some(ms);
    }

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let reader = DumpReader::from_path(&dump)
        .with_context(|| format!("loading snapshot dump from {}", dump.display()))?
        .with_event_sink(events_tx);
    info!(
        "[ayaya_engine::runtime] replaying {} frames from {}",
        reader.frame_count(),
        dump.display()
    );

    let input = InputArbiter::new(Rc::new(RecordingInputDevice::logging()));

    let mut host = ScriptHost::new();
    let report = host.load(scripts::builtin().context("building built-in modules")?);
    for fault in &report.faults {
        warn!(
            "[ayaya_engine::runtime] {} failed to set up: {}",
            fault.module, fault.message
        );
    }

    let display: Box<dyn DisplaySink> = match stream_bind.as_ref() {
        Some(addr) => Box::new(StreamServer::bind(
            addr.as_str(),
            Some(env!("CARGO_PKG_VERSION").to_string()),
        )?),
        None => Box::new(NullDisplay),
    };

    let scheduler =
        TickScheduler::new(reader, host, input, display, settings).with_max_ticks(max_ticks);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    let local = LocalSet::new();
    let summary = local.block_on(&runtime, scheduler.run(events_rx, stop_signal()));

    info!(
        "[ayaya_engine::runtime] {} ticks, {} dispatched, {} module faults",
        summary.ticks, summary.dispatched, summary.module_faults
    );
    Ok(summary)
}

/// Resolves on Ctrl-C. If the handler cannot be installed the loop only
/// stops through `--max-ticks`.
async fn stop_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("[ayaya_engine::runtime] Ctrl-C handler unavailable: {err}");
        std::future::pending::<()>().await;
    }
}
