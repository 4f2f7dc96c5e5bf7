//! Adaptive tick loop.
//!
//! Each iteration reads the game, dispatches modules, publishes the overlay
//! payload and then waits `max(elapsed + min_interval, FLOOR_DELAY)` before
//! the next one, so the poll rate follows the measured read cost. Discrete
//! events are queued behind whatever task is running and processed on the
//! same thread.

use std::future::Future;
use std::time::Duration;

use ayaya_stream::PerformanceSample;
use log::{debug, info, warn};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep_until, Instant};

use crate::adapter::ProcessReader;
use crate::cache::StateCache;
use crate::display::{render_snapshot, DisplaySink, DrawList};
use crate::input::InputArbiter;
use crate::model::GameEvent;
use crate::projection::MatrixProjector;
use crate::queue::{Task, TaskQueue};
use crate::script_host::{DispatchReport, Manager, ScriptHost};
use crate::settings::Settings;
use crate::snapshot::{build_snapshot, Snapshot};

/// Lower bound on the pause between ticks.
pub const FLOOR_DELAY: Duration = Duration::from_millis(10);

pub fn compute_delay(elapsed: Duration, min_interval: Duration) -> Duration {
    elapsed.saturating_add(min_interval).max(FLOOR_DELAY)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub dispatched: bool,
    pub elapsed: Duration,
    pub delay: Duration,
    pub dispatch: DispatchReport,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerSummary {
    pub ticks: u64,
    pub dispatched: u64,
    pub skipped: u64,
    pub events: u64,
    pub module_faults: u64,
    pub max_elapsed: Duration,
}

pub struct TickScheduler<R> {
    state: SchedulerState,
    reader: R,
    cache: StateCache,
    host: ScriptHost,
    input: InputArbiter,
    display: Box<dyn DisplaySink>,
    settings: Settings,
    min_interval: Duration,
    max_ticks: Option<u64>,
    queue: TaskQueue,
    last_snapshot: Option<Snapshot>,
    read_failing: bool,
    summary: SchedulerSummary,
}

impl<R: ProcessReader> TickScheduler<R> {
    pub fn new(
        reader: R,
        host: ScriptHost,
        input: InputArbiter,
        display: Box<dyn DisplaySink>,
        settings: Settings,
    ) -> Self {
        let min_interval = settings.min_interval();
        Self {
            state: SchedulerState::Running,
            reader,
            cache: StateCache::new(),
            host,
            input,
            display,
            settings,
            min_interval,
            max_ticks: None,
            queue: TaskQueue::new(),
            last_snapshot: None,
            read_failing: false,
            summary: SchedulerSummary::default(),
        }
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn with_max_ticks(mut self, max_ticks: Option<u64>) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn stop(&mut self) {
        self.state = SchedulerState::Stopped;
    }

    pub fn cache(&self) -> &StateCache {
        &self.cache
    }

    pub fn host(&self) -> &ScriptHost {
        &self.host
    }

    pub fn last_snapshot(&self) -> Option<&Snapshot> {
        self.last_snapshot.as_ref()
    }

    pub fn max_elapsed(&self) -> Duration {
        self.summary.max_elapsed
    }

    pub fn summary(&self) -> &SchedulerSummary {
        &self.summary
    }

    /// One iteration: read, dispatch, publish, measure. A failed read skips
    /// dispatch but is still measured and rescheduled.
    pub fn run_tick(&mut self) -> TickReport {
        let start = Instant::now();
        self.summary.ticks += 1;
        let tick = self.summary.ticks;

        let (dispatched, dispatch) = match build_snapshot(&mut self.reader, &mut self.cache, tick) {
            Ok(snapshot) => {
                if self.read_failing {
                    info!("[ayaya_engine::scheduler] reads recovered at tick {tick}");
                }
                self.read_failing = false;
                self.summary.dispatched += 1;
                (true, self.dispatch_snapshot(snapshot, start))
            }
            Err(err) => {
                if self.read_failing {
                    debug!("[ayaya_engine::scheduler] tick {tick} skipped: {err}");
                } else {
                    warn!("[ayaya_engine::scheduler] tick {tick} skipped: {err}");
                }
                self.read_failing = true;
                self.summary.skipped += 1;
                // Nothing read this tick is current; events wait for the next good read.
                self.cache.begin_tick(tick);
                self.last_snapshot = None;
                (false, DispatchReport::default())
            }
        };

        let elapsed = start.elapsed();
        self.summary.max_elapsed = self.summary.max_elapsed.max(elapsed);
        self.summary.module_faults += dispatch.faults.len() as u64;

        TickReport {
            tick,
            dispatched,
            elapsed,
            delay: compute_delay(elapsed, self.min_interval),
            dispatch,
        }
    }

    fn dispatch_snapshot(&mut self, snapshot: Snapshot, start: Instant) -> DispatchReport {
        let projector = MatrixProjector::new(snapshot.projection, snapshot.screen_size);
        let manager = Manager::new(
            &snapshot,
            &self.cache,
            &self.input,
            &projector,
            &self.settings,
        );

        let mut report = self.host.dispatch_tick(&manager, snapshot.tick);
        let mut draw = DrawList::new();
        let draw_report = self.host.dispatch_draw(&mut draw, &manager);
        report.invoked += draw_report.invoked;
        report.faults.extend(draw_report.faults);

        let so_far = start.elapsed();
        let performance = PerformanceSample {
            time: millis(so_far),
            max: round_tenth(millis(self.summary.max_elapsed.max(so_far))),
        };
        self.display
            .publish(render_snapshot(&snapshot, performance, draw, &projector));
        self.last_snapshot = Some(snapshot);
        report
    }

    /// Forward a discrete event to the modules against the latest snapshot.
    pub fn dispatch_event(&mut self, event: GameEvent) -> Option<DispatchReport> {
        let Some(snapshot) = self.last_snapshot.as_ref() else {
            debug!(
                "[ayaya_engine::scheduler] no current snapshot; dropping {}",
                event.label()
            );
            return None;
        };
        let projector = MatrixProjector::new(snapshot.projection, snapshot.screen_size);
        let manager = Manager::new(
            snapshot,
            &self.cache,
            &self.input,
            &projector,
            &self.settings,
        );
        let report = match &event {
            GameEvent::MoveCreate { actor } => self.host.dispatch_move_create(actor, &manager),
            GameEvent::MissileCreate { missile } => {
                self.host.dispatch_missile_create(missile, &manager)
            }
        };
        self.summary.events += 1;
        self.summary.module_faults += report.faults.len() as u64;
        Some(report)
    }

    /// Drive the loop until `stop` resolves, the event channel and tick
    /// budget are exhausted, or `stop()` is called. Must run inside a
    /// `LocalSet` so modules can submit input actions.
    pub async fn run<S>(mut self, mut events: UnboundedReceiver<GameEvent>, stop: S) -> SchedulerSummary
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(stop);
        let mut next_tick = Instant::now();
        let mut events_open = true;

        while self.state == SchedulerState::Running {
            tokio::select! {
                biased;
                _ = &mut stop => {
                    info!("[ayaya_engine::scheduler] stop requested");
                    self.stop();
                }
                _ = sleep_until(next_tick) => self.queue.push(Task::Tick),
                event = events.recv(), if events_open => match event {
                    Some(event) => self.queue.push(event.into()),
                    None => events_open = false,
                },
            }

            while self.state == SchedulerState::Running {
                let Some(task) = self.queue.next() else {
                    break;
                };
                match task {
                    Task::Tick => {
                        let report = self.run_tick();
                        next_tick = Instant::now() + report.delay;
                        if self
                            .max_ticks
                            .is_some_and(|limit| self.summary.ticks >= limit)
                        {
                            self.stop();
                        }
                    }
                    Task::Event(event) => {
                        self.dispatch_event(event);
                    }
                }
            }
        }

        let dropped = self.queue.clear();
        if dropped > 0 {
            debug!("[ayaya_engine::scheduler] {dropped} queued tasks dropped at stop");
        }
        self.input.wait_idle().await;
        info!(
            "[ayaya_engine::scheduler] stopped after {} ticks ({} skipped, {} events), max elapsed {:.1}ms",
            self.summary.ticks,
            self.summary.skipped,
            self.summary.events,
            millis(self.summary.max_elapsed)
        );
        self.summary
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
