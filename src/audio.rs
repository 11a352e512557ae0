// src/audio.rs

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::traits::Consumer;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::player::PlayerShared;

/// Helper struct to hold output device info
pub struct OutputConfig {
    pub device: Device,
    pub config: StreamConfig,
    pub sample_format: SampleFormat,
    pub output_channels: usize,
    pub output_sample_rate: u32,
}

/// Finds the default audio output device and its config.
pub fn setup_output_device() -> Result<OutputConfig, anyhow::Error> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("No output device available"))?;
    let supported_config = device.default_output_config()?;
    let sample_format = supported_config.sample_format();
    let config = supported_config.config();
    let output_channels = config.channels as usize;
    let output_sample_rate = config.sample_rate.0;

    log::debug!(
        "🔊 Output device: channels: {}, sample_rate: {:?}",
        output_channels, config.sample_rate
    );

    Ok(OutputConfig {
        device,
        config,
        sample_format,
        output_channels,
        output_sample_rate,
    })
}

/// Build the CPAL output stream for one engine binding.
///
/// The callback pulls decoded samples from the binding's ring buffer and
/// applies its volume/mute state. A seek bumps `flush` on the shared state;
/// the callback then drops whatever was decoded before the seek so playback
/// resumes at the new position instead of replaying stale audio.
pub fn build_stream<T, C>(
    device: Device,
    config: StreamConfig,
    shared: Arc<PlayerShared>,
    mut consumer: C,
    err_fn: fn(cpal::StreamError),
) -> Result<Stream, anyhow::Error>
where
    T: cpal::Sample + cpal::FromSample<f32> + SizedSample,
    C: Consumer<Item = f32> + Send + 'static,
{
    let mut flush_seen = 0u32;

    device
        .build_output_stream(
            &config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let flush = shared.flush.load(Ordering::Relaxed);
                if flush != flush_seen {
                    while consumer.try_pop().is_some() {}
                    flush_seen = flush;
                }

                let vol = f32::from_bits(shared.volume.load(Ordering::Relaxed));
                let gain = if shared.muted.load(Ordering::Relaxed) { 0.0 } else { vol };
                let playing = shared.playing.load(Ordering::Relaxed);
                let mut starved = playing;

                for out in data.iter_mut() {
                    let s = if playing {
                        match consumer.try_pop() {
                            Some(s) => {
                                starved = false;
                                shared.time_samples.fetch_add(1, Ordering::Relaxed);
                                s
                            }
                            None => 0.0,
                        }
                    } else {
                        0.0
                    };
                    *out = T::from_sample(s * gain);
                }

                // The decoder ran out and nothing is left to pull: end of source.
                if starved && shared.decode_done.load(Ordering::Relaxed) {
                    shared.finished.store(true, Ordering::Relaxed);
                }
            },
            err_fn,
            None,
        )
        .map_err(Into::into)
}
