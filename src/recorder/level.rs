// src/recorder/level.rs

use ringbuf::traits::Consumer;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Window size of the spectrum estimate.
const FFT_SIZE: usize = 256;

/// Frequency-domain input level meter. Feeds on the monitor ring buffer
/// and produces a normalized [0, 1] level once per update.
pub struct LevelMeter<C: Consumer<Item = f32>> {
    consumer: C,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    scratch: Vec<f32>,
    value: f32,
}

impl<C: Consumer<Item = f32>> LevelMeter<C> {
    pub fn new(consumer: C) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            consumer,
            fft: planner.plan_fft_forward(FFT_SIZE),
            window: vec![0.0; FFT_SIZE],
            scratch: Vec::new(),
            value: 0.0,
        }
    }

    /// Pull whatever arrived since the last update, keep the newest
    /// `FFT_SIZE` samples, and refresh the level.
    pub fn update(&mut self) {
        self.scratch.clear();
        while let Some(s) = self.consumer.try_pop() {
            self.scratch.push(s);
        }
        if self.scratch.is_empty() {
            return;
        }

        if self.scratch.len() >= FFT_SIZE {
            self.window
                .copy_from_slice(&self.scratch[self.scratch.len() - FFT_SIZE..]);
        } else {
            self.window.rotate_left(self.scratch.len());
            let start = FFT_SIZE - self.scratch.len();
            self.window[start..].copy_from_slice(&self.scratch);
        }

        self.value = spectrum_level(self.fft.as_ref(), &self.window);
    }

    pub fn value(&self) -> f32 {
        self.value
    }
}

/// Mean spectral magnitude of `window`, normalized so a full-scale tone
/// reads 1.0. Square-rooted to keep quiet signals visible on the meter.
pub(crate) fn spectrum_level(fft: &dyn Fft<f32>, window: &[f32]) -> f32 {
    let mut bins: Vec<Complex<f32>> = window.iter().map(|&s| Complex::new(s, 0.0)).collect();
    fft.process(&mut bins);

    let half = bins.len() / 2;
    if half == 0 {
        return 0.0;
    }
    // A full-scale tone puts all of its energy (N/2) into a single bin, so
    // dividing the summed magnitudes by N/2 caps the raw level near 1.
    let raw = bins[..half].iter().map(|c| c.norm()).sum::<f32>() / (window.len() as f32 / 2.0);
    raw.sqrt().clamp(0.0, 1.0)
}
