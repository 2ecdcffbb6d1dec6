//! Lookahead playback scheduler
//!
//! A coarse poll timer wakes the scheduler ~40 times a second; each wake
//! schedules every step falling inside a short horizon ahead of the audio
//! clock, stamping triggers with exact backend-clock times. The poll timer
//! only decides *when scheduling work happens*, never *when audio sounds*,
//! so timer jitter cannot accumulate into playback drift.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use paradiddle_core::{GridSnapshot, Resolution};
use thiserror::Error;
use tracing::{debug, info};

use crate::backend::{AudioBackend, BackendError};
use crate::clock::Ticker;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("audio backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Transport playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
}

/// Scheduler tempo and tuning
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Tempo in quarter notes per minute
    pub bpm: f64,
    /// Step subdivision
    pub resolution: Resolution,
    /// Poll period of the lookahead loop
    pub poll_interval: Duration,
    /// How far ahead of the audio clock to schedule, seconds
    pub schedule_horizon: f64,
    /// Offset applied to the first event after `play()`, seconds
    pub initial_offset: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            resolution: Resolution::Sixteenth,
            poll_interval: Duration::from_millis(25),
            schedule_horizon: 0.120,
            initial_offset: 0.005,
        }
    }
}

impl SchedulerConfig {
    /// Seconds between adjacent grid steps. Tempo counts quarter notes;
    /// resolution subdivides them. The tempo floor keeps the lookahead
    /// loop finite for nonsense inputs.
    pub fn seconds_per_step(&self) -> f64 {
        (60.0 / self.bpm.max(1.0)) * (4.0 / self.resolution.per_whole() as f64)
    }
}

/// Live view of the grid, supplied by the host at `play()` time
pub type SnapshotFn = Arc<dyn Fn() -> GridSnapshot + Send + Sync>;

type StepFn = Arc<dyn Fn(usize) + Send + Sync>;

struct TransportInner {
    state: TransportState,
    step: usize,
    next_event_time: f64,
    snapshot_fn: Option<SnapshotFn>,
    config: SchedulerConfig,
}

/// Drives sample-accurate triggering from the step grid while the
/// transport runs. `stop()` and the poll body share one mutex, so once
/// `stop()` returns no further trigger can fire, even from an in-flight
/// poll.
pub struct PlaybackScheduler<B: AudioBackend, T: Ticker> {
    backend: Arc<B>,
    ticker: T,
    inner: Arc<Mutex<TransportInner>>,
    on_step: Option<StepFn>,
}

impl<B: AudioBackend + 'static, T: Ticker> PlaybackScheduler<B, T> {
    pub fn new(backend: Arc<B>, ticker: T, config: SchedulerConfig) -> Self {
        Self {
            backend,
            ticker,
            inner: Arc::new(Mutex::new(TransportInner {
                state: TransportState::Stopped,
                step: 0,
                next_event_time: 0.0,
                snapshot_fn: None,
                config,
            })),
            on_step: None,
        }
    }

    /// Install a callback fired once per scheduled step (cursor display)
    pub fn with_step_callback(mut self, on_step: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_step = Some(Arc::new(on_step));
        self
    }

    /// Begin looping playback from `start_step` (clamped into the grid).
    /// Awaits backend readiness first; a no-op when already playing.
    pub fn play(&mut self, snapshot_fn: SnapshotFn, start_step: usize) -> Result<(), SchedulerError> {
        self.backend.ensure_running()?;

        let poll_interval = {
            let Ok(mut inner) = self.inner.lock() else {
                return Ok(());
            };
            if inner.state == TransportState::Playing {
                return Ok(());
            }

            let columns = snapshot_fn().columns.max(1);
            inner.step = start_step.min(columns - 1);
            inner.next_event_time = self.backend.now() + inner.config.initial_offset;
            inner.snapshot_fn = Some(snapshot_fn);
            inner.state = TransportState::Playing;
            info!(step = inner.step, bpm = inner.config.bpm, "transport playing");
            inner.config.poll_interval
        };

        let inner = self.inner.clone();
        let backend = self.backend.clone();
        let on_step = self.on_step.clone();
        self.ticker.start(
            poll_interval,
            Box::new(move || poll(&inner, backend.as_ref(), on_step.as_ref())),
        );
        Ok(())
    }

    /// Stop playback and cancel the poll. Idempotent; atomic with respect
    /// to an in-flight poll.
    pub fn stop(&mut self) {
        {
            let Ok(mut inner) = self.inner.lock() else {
                return;
            };
            if inner.state == TransportState::Stopped {
                return;
            }
            inner.state = TransportState::Stopped;
            inner.snapshot_fn = None;
        }
        // the lock is released first: the ticker join may have to wait for
        // a poll that is itself waiting on the lock
        self.ticker.stop();
        info!("transport stopped");
    }

    pub fn state(&self) -> TransportState {
        self.inner
            .lock()
            .map(|inner| inner.state)
            .unwrap_or(TransportState::Stopped)
    }

    /// The next step the scheduler will emit
    pub fn current_step(&self) -> usize {
        self.inner.lock().map(|inner| inner.step).unwrap_or(0)
    }

    /// Retune the transport; takes effect from the next poll
    pub fn set_bpm(&mut self, bpm: f64) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.config.bpm = bpm;
        }
    }

    pub fn config(&self) -> SchedulerConfig {
        self.inner
            .lock()
            .map(|inner| inner.config)
            .unwrap_or_default()
    }
}

impl<B: AudioBackend, T: Ticker> Drop for PlaybackScheduler<B, T> {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.state = TransportState::Stopped;
            inner.snapshot_fn = None;
        }
        self.ticker.stop();
    }
}

/// One poll: schedule every step inside the horizon. Runs under the
/// transport mutex so a concurrent `stop()` either waits or is observed.
fn poll<B: AudioBackend>(
    inner: &Mutex<TransportInner>,
    backend: &B,
    on_step: Option<&StepFn>,
) {
    let Ok(mut inner) = inner.lock() else {
        return;
    };
    if inner.state != TransportState::Playing {
        return;
    }
    let Some(snapshot_fn) = inner.snapshot_fn.clone() else {
        return;
    };

    let horizon = backend.now() + inner.config.schedule_horizon;
    let seconds_per_step = inner.config.seconds_per_step();

    while inner.next_event_time < horizon {
        // re-snapshot per step so edits made while playing are heard
        let snapshot = snapshot_fn();
        let columns = snapshot.columns.max(1);
        let step = inner.step.min(columns - 1);

        for (instrument, velocity) in snapshot.grid.hits_at(step) {
            backend.trigger_sample(instrument, inner.next_event_time, velocity);
        }
        debug!(step, at = inner.next_event_time, "scheduled step");
        if let Some(on_step) = on_step {
            on_step(step);
        }

        inner.next_event_time += seconds_per_step;
        inner.step = (step + 1) % columns;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paradiddle_core::{Grid, GridSnapshot, Instrument, InstrumentId, Velocity};
    use std::sync::Mutex as StdMutex;

    /// Backend with a hand-advanced clock that records every trigger
    #[derive(Default)]
    struct FakeBackend {
        clock: StdMutex<f64>,
        triggers: StdMutex<Vec<(InstrumentId, f64, Velocity)>>,
    }

    impl FakeBackend {
        fn advance(&self, dt: f64) {
            *self.clock.lock().unwrap() += dt;
        }

        fn set(&self, t: f64) {
            *self.clock.lock().unwrap() = t;
        }

        fn triggers(&self) -> Vec<(InstrumentId, f64, Velocity)> {
            self.triggers.lock().unwrap().clone()
        }
    }

    impl AudioBackend for FakeBackend {
        fn ensure_running(&self) -> Result<(), BackendError> {
            Ok(())
        }

        fn now(&self) -> f64 {
            *self.clock.lock().unwrap()
        }

        fn trigger_sample(&self, instrument: InstrumentId, when: f64, velocity: Velocity) {
            self.triggers.lock().unwrap().push((instrument, when, velocity));
        }
    }

    /// Ticker fired by hand from the test body
    #[derive(Clone, Default)]
    struct ManualTicker {
        on_tick: Arc<StdMutex<Option<Box<dyn FnMut() + Send>>>>,
    }

    impl ManualTicker {
        fn fire(&self) {
            let mut guard = self.on_tick.lock().unwrap();
            if let Some(on_tick) = guard.as_mut() {
                on_tick();
            }
        }
    }

    impl Ticker for ManualTicker {
        fn start(&mut self, _period: Duration, on_tick: Box<dyn FnMut() + Send>) {
            *self.on_tick.lock().unwrap() = Some(on_tick);
        }

        fn stop(&mut self) {
            *self.on_tick.lock().unwrap() = None;
        }
    }

    /// Ticker whose stop() leaks the callback, modelling a timer that
    /// fires once more after cancellation
    #[derive(Clone, Default)]
    struct StragglerTicker(ManualTicker);

    impl Ticker for StragglerTicker {
        fn start(&mut self, period: Duration, on_tick: Box<dyn FnMut() + Send>) {
            self.0.start(period, on_tick);
        }

        fn stop(&mut self) {}
    }

    fn kick() -> InstrumentId {
        Instrument::by_label("Kick").unwrap().id
    }

    fn snare() -> InstrumentId {
        Instrument::by_label("Snare").unwrap().id
    }

    fn four_on_floor(columns: usize) -> SnapshotFn {
        let mut grid = Grid::zeroed(columns);
        for step in (0..columns).step_by(4) {
            grid.set_velocity(kick(), step, 100);
        }
        let snapshot = GridSnapshot::capture(&grid);
        Arc::new(move || snapshot.clone())
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig::default()
    }

    #[test]
    fn test_seconds_per_step() {
        let cfg = SchedulerConfig { bpm: 120.0, resolution: Resolution::Sixteenth, ..config() };
        assert!((cfg.seconds_per_step() - 0.0625).abs() < 1e-9);

        let cfg = SchedulerConfig { bpm: 60.0, resolution: Resolution::Quarter, ..config() };
        assert!((cfg.seconds_per_step() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_first_trigger_lands_inside_the_start_window() {
        let backend = Arc::new(FakeBackend::default());
        backend.set(10.0);
        let ticker = ManualTicker::default();
        let handle = ticker.clone();
        let mut scheduler = PlaybackScheduler::new(backend.clone(), ticker, config());

        scheduler.play(four_on_floor(16), 0).unwrap();
        handle.fire();

        let triggers = backend.triggers();
        assert!(!triggers.is_empty());
        let (instrument, when, velocity) = triggers[0];
        assert_eq!(instrument, kick());
        assert_eq!(velocity, 100);
        assert!(when >= 10.0 && when <= 10.03, "first trigger at {when}");
    }

    #[test]
    fn test_lookahead_fills_exactly_the_horizon() {
        // every step active: horizon 0.120 over 0.0625s steps schedules
        // events at +0.005 and +0.0675 on the first poll
        let backend = Arc::new(FakeBackend::default());
        let ticker = ManualTicker::default();
        let handle = ticker.clone();
        let mut scheduler = PlaybackScheduler::new(backend.clone(), ticker, config());

        let mut grid = Grid::zeroed(16);
        for step in 0..16 {
            grid.set_velocity(kick(), step, 100);
        }
        let snapshot = GridSnapshot::capture(&grid);
        scheduler.play(Arc::new(move || snapshot.clone()), 0).unwrap();
        handle.fire();

        let times: Vec<f64> = backend.triggers().iter().map(|t| t.1).collect();
        assert_eq!(times.len(), 2);
        assert!((times[0] - 0.005).abs() < 1e-9);
        assert!((times[1] - 0.0675).abs() < 1e-9);

        // nothing new until the clock moves
        handle.fire();
        assert_eq!(backend.triggers().len(), 2);

        backend.advance(0.0625);
        handle.fire();
        let times: Vec<f64> = backend.triggers().iter().map(|t| t.1).collect();
        assert_eq!(times.len(), 3);
        assert!((times[2] - 0.130).abs() < 1e-9);
    }

    #[test]
    fn test_trigger_times_are_clock_derived_not_timer_derived() {
        // a late poll must not delay the musical grid: times stay at
        // multiples of seconds_per_step from the start offset
        let backend = Arc::new(FakeBackend::default());
        let ticker = ManualTicker::default();
        let handle = ticker.clone();
        let mut scheduler = PlaybackScheduler::new(backend.clone(), ticker, config());

        let mut grid = Grid::zeroed(16);
        for step in 0..16 {
            grid.set_velocity(kick(), step, 100);
        }
        let snapshot = GridSnapshot::capture(&grid);
        scheduler.play(Arc::new(move || snapshot.clone()), 0).unwrap();

        handle.fire();
        backend.advance(0.101); // jittery, late wake
        handle.fire();

        let times: Vec<f64> = backend.triggers().iter().map(|t| t.1).collect();
        for (i, when) in times.iter().enumerate() {
            let expected = 0.005 + i as f64 * 0.0625;
            assert!((when - expected).abs() < 1e-9, "event {i} drifted to {when}");
        }
    }

    #[test]
    fn test_cursor_wraps_modulo_columns() {
        let backend = Arc::new(FakeBackend::default());
        let ticker = ManualTicker::default();
        let handle = ticker.clone();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let log = seen.clone();

        let mut scheduler = PlaybackScheduler::new(backend.clone(), ticker, config())
            .with_step_callback(move |step| log.lock().unwrap().push(step));

        scheduler.play(four_on_floor(4), 0).unwrap();
        for _ in 0..6 {
            handle.fire();
            backend.advance(0.0625);
        }

        let seen = seen.lock().unwrap();
        assert!(seen.len() >= 5);
        for (i, step) in seen.iter().enumerate() {
            assert_eq!(*step, i % 4);
        }
    }

    #[test]
    fn test_play_clamps_start_step() {
        let backend = Arc::new(FakeBackend::default());
        let ticker = ManualTicker::default();
        let mut scheduler = PlaybackScheduler::new(backend.clone(), ticker, config());

        scheduler.play(four_on_floor(8), 500).unwrap();
        assert_eq!(scheduler.current_step(), 7);
    }

    #[test]
    fn test_play_while_playing_is_a_noop() {
        let backend = Arc::new(FakeBackend::default());
        let ticker = ManualTicker::default();
        let handle = ticker.clone();
        let mut scheduler = PlaybackScheduler::new(backend.clone(), ticker, config());

        scheduler.play(four_on_floor(16), 0).unwrap();
        handle.fire();
        let scheduled = backend.triggers().len();

        scheduler.play(four_on_floor(16), 0).unwrap();
        handle.fire();
        assert_eq!(backend.triggers().len(), scheduled); // no re-schedule
    }

    #[test]
    fn test_stop_is_idempotent_and_silences_polls() {
        let backend = Arc::new(FakeBackend::default());
        let ticker = ManualTicker::default();
        let handle = ticker.clone();
        let mut scheduler = PlaybackScheduler::new(backend.clone(), ticker, config());

        scheduler.play(four_on_floor(16), 0).unwrap();
        handle.fire();
        let scheduled = backend.triggers().len();
        assert!(scheduled > 0);

        scheduler.stop();
        scheduler.stop(); // second stop is a no-op
        assert_eq!(scheduler.state(), TransportState::Stopped);

        backend.advance(10.0);
        handle.fire();
        assert_eq!(backend.triggers().len(), scheduled);
    }

    #[test]
    fn test_stop_is_atomic_against_a_straggling_tick() {
        // the ticker "cancels" without tearing the callback down, like a
        // timer firing once more mid-cancellation; the transport state
        // check under the mutex must still silence it
        let backend = Arc::new(FakeBackend::default());
        let ticker = StragglerTicker::default();
        let handle = ticker.0.clone();
        let mut scheduler = PlaybackScheduler::new(backend.clone(), ticker, config());

        scheduler.play(four_on_floor(16), 0).unwrap();
        handle.fire();
        let scheduled = backend.triggers().len();

        scheduler.stop();
        backend.advance(10.0);
        handle.fire(); // straggler
        assert_eq!(backend.triggers().len(), scheduled);
    }

    #[test]
    fn test_stop_then_play_does_not_double_schedule() {
        let backend = Arc::new(FakeBackend::default());
        let ticker = ManualTicker::default();
        let handle = ticker.clone();
        let mut scheduler = PlaybackScheduler::new(backend.clone(), ticker, config());

        scheduler.play(four_on_floor(16), 0).unwrap();
        handle.fire();
        scheduler.stop();
        let after_first_run = backend.triggers().len();

        backend.set(50.0);
        scheduler.play(four_on_floor(16), 0).unwrap();
        handle.fire();

        let triggers = backend.triggers();
        let new: Vec<_> = triggers[after_first_run..].to_vec();
        assert!(!new.is_empty());
        // step 0 is scheduled exactly once in the new window
        let step_zero_times: Vec<f64> = new
            .iter()
            .filter(|(_, when, _)| *when < 50.03)
            .map(|(_, when, _)| *when)
            .collect();
        assert_eq!(step_zero_times.len(), 1);
        assert!(step_zero_times[0] >= 50.0);
    }

    #[test]
    fn test_live_grid_edits_are_picked_up() {
        // the snapshot closure reads shared state; a cell toggled while
        // playing sounds on the next scheduled pass
        let backend = Arc::new(FakeBackend::default());
        let ticker = ManualTicker::default();
        let handle = ticker.clone();
        let mut scheduler = PlaybackScheduler::new(backend.clone(), ticker, config());

        let shared = Arc::new(StdMutex::new(Grid::zeroed(4)));
        let reader = shared.clone();
        let snapshot_fn: SnapshotFn =
            Arc::new(move || GridSnapshot::capture(&reader.lock().unwrap()));

        scheduler.play(snapshot_fn, 0).unwrap();
        handle.fire();
        assert!(backend.triggers().is_empty()); // silent grid

        shared.lock().unwrap().set_velocity(snare(), 2, 100);
        backend.advance(0.0625);
        handle.fire();
        backend.advance(0.0625);
        handle.fire();

        let triggers = backend.triggers();
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].0, snare());
    }

    #[test]
    fn test_velocity_reaches_the_backend() {
        let backend = Arc::new(FakeBackend::default());
        let ticker = ManualTicker::default();
        let handle = ticker.clone();
        let mut scheduler = PlaybackScheduler::new(backend.clone(), ticker, config());

        let mut grid = Grid::zeroed(4);
        grid.set_velocity(kick(), 0, 100);
        grid.set_velocity(snare(), 0, 64);
        let snapshot = GridSnapshot::capture(&grid);

        scheduler.play(Arc::new(move || snapshot.clone()), 0).unwrap();
        handle.fire();

        let triggers = backend.triggers();
        let velocities: Vec<Velocity> = triggers
            .iter()
            .filter(|(_, when, _)| *when < 0.01)
            .map(|&(_, _, velocity)| velocity)
            .collect();
        assert_eq!(velocities, vec![64, 100]); // snare lane sits above kick
    }
}
