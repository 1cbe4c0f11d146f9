//! Panel controller
//!
//! Owns the e-paper device and a single background worker. Callers never
//! touch the bus for a draw: [`PanelController::draw_async`] only enqueues a
//! [`DrawTask`], and the worker renders it outside any lock before uploading
//! it inside one busy-bracketed transaction.
//!
//! ```text
//!  draw_async ──► [ FIFO, unbounded ] ──► worker: render ──► transaction { display }
//!  clear      ───────────────────────────────────────────► transaction { clear }
//! ```
//!
//! Draws are served strictly in submission order, one at a time. A failed
//! upload is logged and the worker moves on to the next task. A `clear` first
//! waits for every draw already queued, so a pattern requested before the
//! clear can never land on the panel after it.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use pattern::{render, DrawTask, PanelGeometry};
use platform::config::PANEL_DRAIN_TIMEOUT;
use platform::{join_with_timeout, lock, BusArbiter, Clock, DisplayError, PanelDevice};

/// Work item for the panel worker.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelCommand {
    /// Render and upload one pattern.
    Draw(DrawTask),
    /// Finish: everything queued before this is still drawn.
    Shutdown,
}

/// Panel controller errors
#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    /// Hardware bring-up failed; the busy flag has been released.
    #[error("panel initialization failed")]
    Init(#[source] DisplayError),
    /// A busy-bracketed bus transaction failed.
    #[error("panel transaction failed")]
    Transaction(#[source] DisplayError),
    /// The worker thread could not be started.
    #[error("failed to start panel worker")]
    Spawn(#[source] std::io::Error),
    /// The worker has been shut down and accepts no more draws.
    #[error("panel worker has stopped")]
    WorkerStopped,
}

struct Worker {
    tx: Sender<PanelCommand>,
    handle: JoinHandle<()>,
}

/// Draws accepted but not yet uploaded (or failed).
#[derive(Default)]
struct Backlog {
    pending: Mutex<usize>,
    drained: Condvar,
}

impl Backlog {
    fn add(&self) {
        *lock(&self.pending) += 1;
    }

    fn done(&self) {
        let mut pending = lock(&self.pending);
        *pending = pending.saturating_sub(1);
        drop(pending);
        self.drained.notify_all();
    }

    /// `true` if the backlog emptied within `timeout`.
    fn wait_drained(&self, timeout: Duration) -> bool {
        let pending = lock(&self.pending);
        let (pending, _) = self
            .drained
            .wait_timeout_while(pending, timeout, |pending| *pending > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *pending == 0
    }
}

#[derive(Default)]
struct State {
    initialized: bool,
    worker_started: bool,
    worker: Option<Worker>,
}

/// Serialised access to the e-paper panel.
///
/// Share as `Arc<PanelController<_>>`; every method takes `&self`.
pub struct PanelController<D> {
    device: Arc<Mutex<D>>,
    geometry: PanelGeometry,
    arbiter: Arc<BusArbiter>,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
    backlog: Arc<Backlog>,
    drain_timeout: Duration,
}

impl<D: PanelDevice + 'static> PanelController<D> {
    /// Wrap `device`. Nothing touches the hardware until the first
    /// [`init`](Self::init), [`clear`](Self::clear) or
    /// [`draw_async`](Self::draw_async).
    pub fn new(device: D, arbiter: Arc<BusArbiter>, clock: Arc<dyn Clock>) -> Self {
        let geometry = PanelGeometry::new(device.width() as usize, device.height() as usize);
        Self {
            device: Arc::new(Mutex::new(device)),
            geometry,
            arbiter,
            clock,
            state: Mutex::default(),
            backlog: Arc::default(),
            drain_timeout: PANEL_DRAIN_TIMEOUT,
        }
    }

    /// Cap how long [`clear`](Self::clear) waits for queued draws.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Panel geometry the worker renders for.
    pub fn geometry(&self) -> PanelGeometry {
        self.geometry
    }

    /// Bring the panel up once and start the worker once.
    ///
    /// Later calls return immediately. A failed bring-up is returned to the
    /// caller with the busy flag already cleared, and the next call retries.
    pub fn init(&self) -> Result<(), PanelError> {
        let mut state = lock(&self.state);

        if !state.initialized {
            tracing::info!("panel init start");
            self.arbiter
                .transaction(|| lock(&self.device).init())
                .map_err(|e| {
                    tracing::error!(error = %e, "panel init failed");
                    PanelError::Init(e)
                })?;
            state.initialized = true;
            tracing::info!("panel initialized");
        }

        if !state.worker_started {
            state.worker = Some(self.spawn_worker()?);
            state.worker_started = true;
            tracing::info!("panel worker started");
        }
        Ok(())
    }

    /// Blank both planes in one busy-bracketed transaction.
    ///
    /// Blocks until draws queued before the call have been uploaded, for at
    /// most the drain timeout; past that the clear goes ahead anyway.
    pub fn clear(&self) -> Result<(), PanelError> {
        self.init()?;
        if !self.backlog.wait_drained(self.drain_timeout) {
            tracing::warn!(timeout = ?self.drain_timeout, "queued draws still pending, clearing anyway");
        }
        tracing::info!("clear display");
        self.arbiter
            .transaction(|| lock(&self.device).clear())
            .map_err(PanelError::Transaction)
    }

    /// Queue `task` for the worker. Never blocks on the bus.
    pub fn draw_async(&self, task: DrawTask) -> Result<(), PanelError> {
        tracing::info!(?task, "draw requested");
        self.init()?;
        let state = lock(&self.state);
        let worker = state.worker.as_ref().ok_or(PanelError::WorkerStopped)?;
        self.backlog.add();
        worker.tx.send(PanelCommand::Draw(task)).map_err(|_| {
            self.backlog.done();
            PanelError::WorkerStopped
        })
    }

    /// Put the panel into deep sleep. The next operation re-initialises it.
    pub fn sleep(&self) -> Result<(), PanelError> {
        let mut state = lock(&self.state);
        if !state.initialized {
            return Ok(());
        }
        tracing::info!("panel sleep");
        let result = self
            .arbiter
            .transaction(|| lock(&self.device).sleep())
            .map_err(PanelError::Transaction);
        state.initialized = false;
        result
    }

    /// Let the worker drain its queue and stop, waiting at most `timeout`.
    ///
    /// Returns `true` if the worker has exited (or never ran).
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let Some(worker) = lock(&self.state).worker.take() else {
            return true;
        };
        // Only fails if the worker already exited.
        let _ = worker.tx.send(PanelCommand::Shutdown);
        let joined = join_with_timeout(worker.handle, timeout);
        if !joined {
            tracing::warn!(?timeout, "panel worker did not stop in time");
        }
        joined
    }

    fn spawn_worker(&self) -> Result<Worker, PanelError> {
        let (tx, rx) = mpsc::channel();
        let job = DrawJob {
            device: Arc::clone(&self.device),
            geometry: self.geometry,
            arbiter: Arc::clone(&self.arbiter),
            clock: Arc::clone(&self.clock),
            backlog: Arc::clone(&self.backlog),
        };
        let handle = thread::Builder::new()
            .name("panel-worker".into())
            .spawn(move || job.run(&rx))
            .map_err(PanelError::Spawn)?;
        Ok(Worker { tx, handle })
    }
}

/// Everything the worker thread needs, detached from the controller.
struct DrawJob<D> {
    device: Arc<Mutex<D>>,
    geometry: PanelGeometry,
    arbiter: Arc<BusArbiter>,
    clock: Arc<dyn Clock>,
    backlog: Arc<Backlog>,
}

impl<D: PanelDevice> DrawJob<D> {
    fn run(&self, rx: &Receiver<PanelCommand>) {
        tracing::info!("panel worker running");
        while let Ok(command) = rx.recv() {
            match command {
                PanelCommand::Draw(task) => {
                    self.draw(&task);
                    self.backlog.done();
                }
                PanelCommand::Shutdown => break,
            }
        }
        tracing::info!("panel worker stopped");
    }

    fn draw(&self, task: &DrawTask) {
        tracing::info!("buffer generation start");
        let seed = [self.clock.unix_seconds()];
        let black = render(task, &seed, self.geometry);
        let accent = vec![0u8; self.geometry.plane_len()];
        tracing::info!(seed = seed[0], "buffer generation done");

        let result = self.arbiter.transaction(|| {
            tracing::info!("draw start");
            lock(&self.device).display(&black, &accent)
        });
        match result {
            Ok(()) => tracing::info!("draw done"),
            Err(e) => tracing::error!(error = %e, "draw failed"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use platform::mocks::{MockClock, MockPanel, MockPanelHandle, PanelCall};
    use std::time::Instant;

    const SEED: f64 = 1_700_000_000.5;

    fn controller(panel: MockPanel) -> (PanelController<MockPanel>, MockPanelHandle, Arc<BusArbiter>) {
        let arbiter = Arc::new(BusArbiter::new(Duration::ZERO));
        let handle = panel.handle();
        let panel = panel.observing(Arc::clone(&arbiter));
        let ctl = PanelController::new(panel, Arc::clone(&arbiter), Arc::new(MockClock::new(SEED)));
        (ctl, handle, arbiter)
    }

    fn wait_for(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_init_is_idempotent() {
        let (ctl, handle, _) = controller(MockPanel::new(16, 2));
        ctl.init().unwrap();
        ctl.init().unwrap();
        ctl.clear().unwrap();
        assert_eq!(handle.calls(), vec![PanelCall::Init, PanelCall::Clear]);
        assert!(ctl.shutdown(Duration::from_secs(1)));
    }

    #[test]
    fn test_init_failure_propagates_and_releases_busy() {
        let (ctl, handle, arbiter) = controller(MockPanel::new(16, 2));
        handle.set_fail_init(true);

        assert!(matches!(
            ctl.init(),
            Err(PanelError::Init(DisplayError::InitFailed))
        ));
        assert!(!arbiter.is_busy());
        assert!(matches!(ctl.draw_async(DrawTask::default()), Err(PanelError::Init(_))));

        handle.set_fail_init(false);
        ctl.init().unwrap();
        assert_eq!(
            handle.calls(),
            vec![PanelCall::Init, PanelCall::Init, PanelCall::Init]
        );
        assert!(ctl.shutdown(Duration::from_secs(1)));
    }

    #[test]
    fn test_draw_renders_seeded_pattern_with_blank_accent() {
        let (ctl, handle, _) = controller(MockPanel::new(16, 4));
        let task = DrawTask {
            block_size: 2,
            hash_mode: 1,
            ..DrawTask::default()
        };
        ctl.draw_async(task).unwrap();
        assert!(ctl.shutdown(Duration::from_secs(5)));

        let expected = render(&task, &[SEED], PanelGeometry::new(16, 4));
        assert_eq!(
            handle.calls(),
            vec![
                PanelCall::Init,
                PanelCall::Display {
                    black: expected,
                    accent: vec![0; 8],
                },
            ]
        );
    }

    #[test]
    fn test_bus_calls_happen_while_busy() {
        let (ctl, handle, arbiter) = controller(MockPanel::new(8, 1));
        ctl.clear().unwrap();
        ctl.draw_async(DrawTask::default()).unwrap();
        assert!(ctl.shutdown(Duration::from_secs(5)));

        assert_eq!(handle.busy_during_calls(), vec![true, true, true]);
        assert!(!arbiter.is_busy());
    }

    /// Clock that notes the busy flag whenever the worker reads its seed,
    /// then stalls to stretch the render window.
    struct WatchedClock {
        arbiter: Arc<BusArbiter>,
        stall: Duration,
        busy_at_read: Mutex<Vec<bool>>,
    }

    impl Clock for WatchedClock {
        fn unix_seconds(&self) -> f64 {
            self.busy_at_read.lock().unwrap().push(self.arbiter.is_busy());
            thread::sleep(self.stall);
            SEED
        }
    }

    fn watched(stall: Duration) -> (PanelController<MockPanel>, MockPanelHandle, Arc<WatchedClock>) {
        let arbiter = Arc::new(BusArbiter::new(Duration::from_millis(5)));
        let clock = Arc::new(WatchedClock {
            arbiter: Arc::clone(&arbiter),
            stall,
            busy_at_read: Mutex::new(Vec::new()),
        });
        let panel = MockPanel::new(64, 16).observing(Arc::clone(&arbiter));
        let handle = panel.handle();
        let ctl = PanelController::new(panel, arbiter, Arc::clone(&clock) as Arc<dyn Clock>);
        (ctl, handle, clock)
    }

    #[test]
    fn test_pattern_is_computed_outside_the_busy_bracket() {
        let (ctl, handle, clock) = watched(Duration::ZERO);
        for _ in 0..3 {
            ctl.draw_async(DrawTask {
                perlin: true,
                ..DrawTask::default()
            })
            .unwrap();
        }
        assert!(ctl.shutdown(Duration::from_secs(5)));

        assert_eq!(handle.display_count(), 3);
        assert_eq!(*clock.busy_at_read.lock().unwrap(), vec![false; 3]);
        // The uploads themselves were bracketed.
        assert!(handle.busy_during_calls().iter().all(|busy| *busy));
    }

    #[test]
    fn test_clear_waits_for_queued_draw() {
        let (ctl, handle, _) = watched(Duration::from_millis(100));
        ctl.draw_async(DrawTask::default()).unwrap();
        // The worker is still rendering when the clear comes in.
        ctl.clear().unwrap();

        let calls = handle.calls();
        assert!(matches!(calls[1], PanelCall::Display { .. }));
        assert_eq!(calls.last(), Some(&PanelCall::Clear));
        assert!(ctl.shutdown(Duration::from_secs(1)));
    }

    #[test]
    fn test_clear_gives_up_waiting_after_drain_timeout() {
        let (ctl, handle, _) = watched(Duration::from_millis(300));
        let ctl = ctl.with_drain_timeout(Duration::from_millis(20));
        ctl.draw_async(DrawTask::default()).unwrap();
        ctl.clear().unwrap();

        assert_eq!(handle.calls(), vec![PanelCall::Init, PanelCall::Clear]);
        assert!(ctl.shutdown(Duration::from_secs(5)));
        assert_eq!(handle.display_count(), 1);
    }

    #[test]
    fn test_draws_are_fifo_and_not_deduplicated() {
        let panel = MockPanel::new(8, 2).with_latency(Duration::from_millis(5));
        let (ctl, handle, _) = controller(panel);
        let tasks: Vec<DrawTask> = (1..=3)
            .map(|block_size| DrawTask {
                block_size,
                hash_mode: 2,
                ..DrawTask::default()
            })
            .collect();
        for task in &tasks {
            ctl.draw_async(*task).unwrap();
        }
        assert!(ctl.shutdown(Duration::from_secs(5)));

        let drawn: Vec<Vec<u8>> = handle
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                PanelCall::Display { black, .. } => Some(black),
                _ => None,
            })
            .collect();
        let expected: Vec<Vec<u8>> = tasks
            .iter()
            .map(|t| render(t, &[SEED], PanelGeometry::new(8, 2)))
            .collect();
        assert_eq!(drawn, expected);
    }

    #[test]
    fn test_worker_survives_failed_upload() {
        let (ctl, handle, arbiter) = controller(MockPanel::new(8, 1));
        handle.fail_next_displays(1);

        ctl.draw_async(DrawTask::default()).unwrap();
        ctl.draw_async(DrawTask::default()).unwrap();
        wait_for(|| handle.display_count() == 2);

        assert!(!arbiter.is_busy());
        assert!(ctl.shutdown(Duration::from_secs(1)));
    }

    #[test]
    fn test_draw_async_does_not_wait_for_the_bus() {
        let panel = MockPanel::new(8, 1).with_latency(Duration::from_millis(200));
        let (ctl, handle, _) = controller(panel);
        ctl.init().unwrap();

        let started = Instant::now();
        ctl.draw_async(DrawTask::default()).unwrap();
        ctl.draw_async(DrawTask::default()).unwrap();
        assert!(started.elapsed() < Duration::from_millis(150));

        assert!(ctl.shutdown(Duration::from_secs(5)));
        assert_eq!(handle.display_count(), 2);
    }

    #[test]
    fn test_draw_after_shutdown_is_rejected() {
        let (ctl, _, _) = controller(MockPanel::new(8, 1));
        ctl.init().unwrap();
        assert!(ctl.shutdown(Duration::from_secs(1)));
        assert!(matches!(
            ctl.draw_async(DrawTask::default()),
            Err(PanelError::WorkerStopped)
        ));
        assert!(ctl.shutdown(Duration::from_secs(1)));
    }

    #[test]
    fn test_sleep_forces_reinit() {
        let (ctl, handle, _) = controller(MockPanel::new(8, 1));
        ctl.sleep().unwrap();
        ctl.clear().unwrap();
        ctl.sleep().unwrap();
        ctl.clear().unwrap();
        assert_eq!(
            handle.calls(),
            vec![
                PanelCall::Init,
                PanelCall::Clear,
                PanelCall::Sleep,
                PanelCall::Init,
                PanelCall::Clear,
            ]
        );
        assert!(ctl.shutdown(Duration::from_secs(1)));
    }
}
