//! WAV decoding and the per-instrument sample bank
//!
//! Samples are decoded to mono f32 and resampled to the output device rate
//! once at load time, so the audio callback only ever copies.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use paradiddle_core::InstrumentId;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("failed to read WAV: {0}")]
    Wav(#[from] hound::Error),
    #[error("resample failed: {0}")]
    Resample(String),
}

/// Decoded, device-rate sample data keyed by instrument
#[derive(Debug, Default)]
pub struct SampleBank {
    samples: HashMap<InstrumentId, Arc<Vec<f32>>>,
}

impl SampleBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, instrument: InstrumentId, data: Arc<Vec<f32>>) {
        self.samples.insert(instrument, data);
    }

    pub fn get(&self, instrument: InstrumentId) -> Option<Arc<Vec<f32>>> {
        self.samples.get(&instrument).cloned()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Decode a WAV file, downmix to mono, resample to `target_rate`, and
    /// assign it to the instrument
    pub fn load_wav(
        &mut self,
        instrument: InstrumentId,
        path: &Path,
        target_rate: u32,
    ) -> Result<(), SampleError> {
        let (mono, source_rate) = read_wav_mono(path)?;
        let frames = mono.len();
        let data = resample(mono, source_rate, target_rate)?;
        info!(
            instrument = instrument.0,
            path = %path.display(),
            frames,
            source_rate,
            target_rate,
            "loaded sample"
        );
        self.insert(instrument, Arc::new(data));
        Ok(())
    }
}

/// Read a WAV file to mono f32 samples. Returns (samples, sample_rate).
pub fn read_wav_mono(path: &Path) -> Result<(Vec<f32>, u32), SampleError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let full_scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / full_scale))
                .collect::<Result<_, _>>()?
        }
    };

    Ok((to_mono(&samples, spec.channels as usize), spec.sample_rate))
}

/// Convert interleaved samples to mono by averaging channels
pub fn to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn resample(samples: Vec<f32>, from_rate: u32, to_rate: u32) -> Result<Vec<f32>, SampleError> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples);
    }

    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
        WindowFunction,
    };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        to_rate as f64 / from_rate as f64,
        2.0,
        params,
        samples.len(),
        1,
    )
    .map_err(|e| SampleError::Resample(format!("init: {e}")))?;

    let input = vec![samples];
    let output = resampler
        .process(&input, None)
        .map_err(|e| SampleError::Resample(e.to_string()))?;

    Ok(output.into_iter().flatten().collect())
}
