// src/decoder/resample.rs

use anyhow::Result;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    calculate_cutoff,
};

use crate::decoder::dsp;

/// Staging buffer between the decoder and the ring buffer: collects decoded
/// frames until the resampler can consume a full input block, and passes
/// audio straight through when source and device rates already match.
pub struct ResampleStage {
    resampler: Option<SincFixedIn<f32>>,
    planar: Vec<Vec<f32>>,
    channels: usize,
}

impl ResampleStage {
    pub fn new(src_rate: u32, dst_rate: u32, channels: usize) -> Result<Self> {
        let resampler = if src_rate == dst_rate {
            None
        } else {
            let ratio = dst_rate as f64 / src_rate as f64;
            let sinc_len = 256usize;
            let window = WindowFunction::BlackmanHarris2;
            let params = SincInterpolationParameters {
                sinc_len,
                f_cutoff: calculate_cutoff(sinc_len, window),
                interpolation: SincInterpolationType::Linear,
                oversampling_factor: 128,
                window,
            };
            Some(SincFixedIn::<f32>::new(ratio, 2.0, params, 1024, channels)?)
        };

        Ok(Self {
            resampler,
            planar: vec![Vec::with_capacity(4096); channels],
            channels,
        })
    }

    /// Drop staged frames and internal resampler history (used after a seek).
    pub fn reset(&mut self) {
        for ch in &mut self.planar {
            ch.clear();
        }
        if let Some(r) = &mut self.resampler {
            r.reset();
        }
    }

    /// Feed decoded interleaved frames; returns whatever full output blocks
    /// became available, interleaved at the device rate.
    pub fn push(&mut self, interleaved: &[f32]) -> Vec<f32> {
        let Some(resampler) = self.resampler.as_mut() else {
            return interleaved.to_vec();
        };

        dsp::append_to_planar(interleaved, &mut self.planar, self.channels);

        let mut out = Vec::new();
        loop {
            let need = resampler.input_frames_next();
            if dsp::planar_frames(&self.planar) < need {
                break;
            }
            let block = dsp::split_planar(&mut self.planar, need);
            match resampler.process(&block, None) {
                Ok(resampled) => out.extend_from_slice(&dsp::interleave(&resampled)),
                Err(e) => {
                    log::warn!("resampler error, dropping block: {e}");
                    break;
                }
            }
        }
        out
    }

    /// Flush staged frames and resampler tail at end of stream.
    pub fn finish(&mut self) -> Vec<f32> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Vec::new();
        };

        let mut out = Vec::new();
        let frames = dsp::planar_frames(&self.planar);
        if frames > 0 {
            let block = dsp::split_planar(&mut self.planar, frames);
            if let Ok(resampled) = resampler.process_partial(Some(block.as_slice()), None) {
                out.extend_from_slice(&dsp::interleave(&resampled));
            }
        }
        if let Ok(tail) = resampler.process_partial::<Vec<f32>>(None, None) {
            out.extend_from_slice(&dsp::interleave(&tail));
        }
        out
    }
}
