//! cpal-backed audio output
//!
//! Owns the device stream and mixes triggered sample voices, each starting
//! at its exact requested frame. The stream lives on a dedicated owner
//! thread (`cpal::Stream` is not `Send`); everything the callback and the
//! scheduler share sits behind atomics and mutexes.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{bounded, Receiver, Sender};
use paradiddle_core::{InstrumentId, Velocity};
use tracing::{debug, error, info};

use crate::backend::{AudioBackend, BackendError};
use crate::samples::SampleBank;

/// One playing sample instance
struct Voice {
    data: Arc<Vec<f32>>,
    start_frame: u64,
    cursor: usize,
    gain: f32,
}

/// State shared between the scheduler side and the audio callback
struct Shared {
    /// Frames rendered so far; the backend clock
    frames: AtomicU64,
    /// Device sample rate, 0 until the stream is up
    sample_rate: AtomicU32,
    voices: Mutex<Vec<Voice>>,
    bank: Mutex<SampleBank>,
}

enum ReadyState {
    Pending(Receiver<Result<u32, BackendError>>),
    Running,
    Failed(BackendError),
}

/// Reference [`AudioBackend`] over the default cpal output device
pub struct CpalBackend {
    shared: Arc<Shared>,
    ready: Mutex<ReadyState>,
    /// Dropping this ends the stream-owner thread
    _shutdown_tx: Sender<()>,
}

impl CpalBackend {
    /// Spawn the stream-owner thread immediately; the stream comes up in
    /// the background and `ensure_running` rendezvouses with it.
    pub fn new(bank: SampleBank) -> Self {
        let shared = Arc::new(Shared {
            frames: AtomicU64::new(0),
            sample_rate: AtomicU32::new(0),
            voices: Mutex::new(Vec::new()),
            bank: Mutex::new(bank),
        });

        let (ready_tx, ready_rx) = bounded(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let worker_shared = shared.clone();
        thread::spawn(move || match build_stream(&worker_shared) {
            Ok((stream, sample_rate)) => {
                worker_shared.sample_rate.store(sample_rate, Ordering::SeqCst);
                let _ = ready_tx.send(Ok(sample_rate));
                // park until the backend is dropped; the stream dies here
                let _ = shutdown_rx.recv();
                drop(stream);
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
            }
        });

        Self {
            shared,
            ready: Mutex::new(ReadyState::Pending(ready_rx)),
            _shutdown_tx: shutdown_tx,
        }
    }

    /// Device sample rate once running
    pub fn sample_rate(&self) -> Option<u32> {
        match self.shared.sample_rate.load(Ordering::SeqCst) {
            0 => None,
            rate => Some(rate),
        }
    }

    /// Decode and assign a WAV sample; requires the stream to be running
    /// so the target rate is known.
    pub fn load_wav(
        &self,
        instrument: InstrumentId,
        path: &std::path::Path,
    ) -> Result<(), BackendError> {
        self.ensure_running()?;
        let rate = self.shared.sample_rate.load(Ordering::SeqCst);
        let Ok(mut bank) = self.shared.bank.lock() else {
            return Err(BackendError::WorkerGone);
        };
        bank.load_wav(instrument, path, rate)
            .map_err(|e| BackendError::Stream(e.to_string()))
    }

    /// Assign already-decoded device-rate sample data
    pub fn set_sample(&self, instrument: InstrumentId, data: Arc<Vec<f32>>) {
        if let Ok(mut bank) = self.shared.bank.lock() {
            bank.insert(instrument, data);
        }
    }
}

impl AudioBackend for CpalBackend {
    fn ensure_running(&self) -> Result<(), BackendError> {
        let Ok(mut ready) = self.ready.lock() else {
            return Err(BackendError::WorkerGone);
        };
        let outcome = match &*ready {
            ReadyState::Running => return Ok(()),
            ReadyState::Failed(e) => return Err(e.clone()),
            ReadyState::Pending(rx) => rx.recv().map_err(|_| BackendError::WorkerGone),
        };
        match outcome {
            Ok(Ok(sample_rate)) => {
                info!(sample_rate, "audio backend running");
                *ready = ReadyState::Running;
                Ok(())
            }
            Ok(Err(e)) | Err(e) => {
                error!(%e, "audio backend failed to start");
                *ready = ReadyState::Failed(e.clone());
                Err(e)
            }
        }
    }

    fn now(&self) -> f64 {
        let rate = self.shared.sample_rate.load(Ordering::SeqCst);
        if rate == 0 {
            return 0.0;
        }
        self.shared.frames.load(Ordering::SeqCst) as f64 / rate as f64
    }

    fn trigger_sample(&self, instrument: InstrumentId, when: f64, velocity: Velocity) {
        let rate = self.shared.sample_rate.load(Ordering::SeqCst);
        if rate == 0 || velocity == 0 {
            return;
        }

        let data = match self.shared.bank.lock() {
            Ok(bank) => bank.get(instrument),
            Err(_) => return,
        };
        let Some(data) = data else {
            // absent sample is a non-event, transport keeps rolling
            debug!(instrument = instrument.0, "no sample loaded, skipping trigger");
            return;
        };

        let start_frame = (when.max(0.0) * rate as f64).round() as u64;
        if let Ok(mut voices) = self.shared.voices.lock() {
            voices.push(Voice {
                data,
                start_frame,
                cursor: 0,
                gain: velocity.min(127) as f32 / 127.0,
            });
        }
    }
}

fn build_stream(shared: &Arc<Shared>) -> Result<(cpal::Stream, u32), BackendError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(BackendError::NoDevices)?;

    let supported_config = device
        .default_output_config()
        .map_err(|e| BackendError::Config(e.to_string()))?;
    let sample_rate = supported_config.sample_rate().0;
    let channels = supported_config.channels() as usize;

    let config: StreamConfig = supported_config.into();
    let callback_shared = shared.clone();

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                render(&callback_shared, data, channels);
            },
            move |err| error!("output stream error: {err}"),
            None,
        )
        .map_err(|e| BackendError::Stream(e.to_string()))?;

    stream
        .play()
        .map_err(|e| BackendError::Stream(e.to_string()))?;

    info!(
        device = %device.name().unwrap_or_default(),
        sample_rate,
        channels,
        "started output stream"
    );

    Ok((stream, sample_rate))
}

/// Mix due voices into the output buffer (audio thread)
fn render(shared: &Arc<Shared>, buffer: &mut [f32], channels: usize) {
    buffer.fill(0.0);
    let base_frame = shared.frames.load(Ordering::SeqCst);
    let num_frames = buffer.len() / channels;

    if let Ok(mut voices) = shared.voices.lock() {
        for frame_idx in 0..num_frames {
            let absolute = base_frame + frame_idx as u64;
            let mut mix = 0.0f32;
            for voice in voices.iter_mut() {
                if absolute < voice.start_frame {
                    continue;
                }
                if let Some(&sample) = voice.data.get(voice.cursor) {
                    mix += sample * voice.gain;
                    voice.cursor += 1;
                }
            }
            let out = mix.clamp(-1.0, 1.0);
            let frame = &mut buffer[frame_idx * channels..(frame_idx + 1) * channels];
            frame.fill(out);
        }
        voices.retain(|voice| voice.cursor < voice.data.len());
    }

    shared.frames.fetch_add(num_frames as u64, Ordering::SeqCst);
}
