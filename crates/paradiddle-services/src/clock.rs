//! Periodic tick capability for the scheduler poll loop

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Sender};

/// Periodic callback driver. The production implementation runs a thread;
/// scheduler tests fire ticks by hand instead.
pub trait Ticker: Send {
    /// Begin invoking `on_tick` every `period`. Replaces any previous run.
    fn start(&mut self, period: Duration, on_tick: Box<dyn FnMut() + Send>);

    /// Stop ticking. Must not return while a tick callback is mid-flight.
    fn stop(&mut self);
}

/// Ticker backed by a dedicated thread and a crossbeam tick channel
#[derive(Default)]
pub struct ThreadTicker {
    worker: Option<(Sender<()>, JoinHandle<()>)>,
}

impl ThreadTicker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Ticker for ThreadTicker {
    fn start(&mut self, period: Duration, mut on_tick: Box<dyn FnMut() + Send>) {
        self.stop();

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ticks = tick(period);
        let handle = thread::spawn(move || loop {
            select! {
                recv(ticks) -> _ => on_tick(),
                recv(stop_rx) -> _ => return,
            }
        });
        self.worker = Some((stop_tx, handle));
    }

    fn stop(&mut self) {
        if let Some((stop_tx, handle)) = self.worker.take() {
            let _ = stop_tx.send(());
            let _ = handle.join();
        }
    }
}

impl Drop for ThreadTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
