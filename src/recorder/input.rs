// src/recorder/input.rs

use anyhow::{Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::traits::Producer;

/// One selectable input device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputDevice {
    pub id: String,
    pub label: String,
}

/// List the host's audio input devices. Fails soft: enumeration errors are
/// logged and produce an empty list so playback keeps working without a
/// microphone.
pub fn enumerate_input_devices() -> Vec<InputDevice> {
    let host = cpal::default_host();
    match host.input_devices() {
        Ok(devices) => devices
            .filter_map(|d| d.name().ok())
            .map(|name| InputDevice {
                id: name.clone(),
                label: name,
            })
            .collect(),
        Err(e) => {
            log::warn!("input device enumeration failed: {e}");
            Vec::new()
        }
    }
}

/// Holds the live CPAL input stream. Captured samples flow from the device
/// callback into the capture ring buffer, mirrored into the level-meter
/// ring buffer.
pub struct AudioInput {
    _stream: Stream,
    pub channels: usize,
    pub sample_rate: u32,
}

impl AudioInput {
    /// Open `device_id` (or the default input device) and start capturing.
    /// Failing to open the device is the platform's way of denying access.
    pub fn open<PRec, PMon>(
        device_id: Option<&str>,
        producer_rec: PRec,
        producer_mon: PMon,
    ) -> Result<Self>
    where
        PRec: Producer<Item = f32> + Send + 'static,
        PMon: Producer<Item = f32> + Send + 'static,
    {
        let host = cpal::default_host();
        let device = match device_id {
            Some(id) => host
                .input_devices()?
                .find(|d| d.name().map(|n| n == id).unwrap_or(false))
                .ok_or_else(|| anyhow!("input device '{id}' not found"))?,
            None => host
                .default_input_device()
                .ok_or_else(|| anyhow!("no input device available"))?,
        };

        let supported_config = device.default_input_config()?;
        let sample_format = supported_config.sample_format();
        let config: StreamConfig = supported_config.into();
        let channels = config.channels as usize;
        let sample_rate = config.sample_rate.0;

        let stream = match sample_format {
            SampleFormat::F32 => build_input_stream::<f32, _, _>(&device, &config, producer_rec, producer_mon)?,
            SampleFormat::I16 => build_input_stream::<i16, _, _>(&device, &config, producer_rec, producer_mon)?,
            SampleFormat::U16 => build_input_stream::<u16, _, _>(&device, &config, producer_rec, producer_mon)?,
            other => anyhow::bail!("Unsupported sample format: {:?}", other),
        };
        stream.play()?;

        log::info!("🎙️ Input open: {channels}ch @ {sample_rate} Hz");

        Ok(Self {
            _stream: stream,
            channels,
            sample_rate,
        })
    }
}

/// Build the input stream for any device sample format, converting to f32.
fn build_input_stream<T, PRec, PMon>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut producer_rec: PRec,
    mut producer_mon: PMon,
) -> Result<Stream>
where
    T: SizedSample,
    f32: cpal::FromSample<T>,
    PRec: Producer<Item = f32> + Send + 'static,
    PMon: Producer<Item = f32> + Send + 'static,
{
    let err_fn = |err| log::error!("input stream error: {err}");

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _| {
            let mut conv = Vec::with_capacity(data.len());
            for &s in data {
                conv.push(f32::from_sample(s));
            }

            // Push into the capture buffer; mirror the same region into the
            // level-meter buffer, best effort.
            let mut pushed = 0usize;
            while pushed < conv.len() {
                let slice = &conv[pushed..];
                let n = producer_rec.push_slice(slice);
                if n == 0 {
                    // capture buffer full -> drop the remainder
                    break;
                }
                let _ = producer_mon.push_slice(&slice[..n]);
                pushed += n;
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}
