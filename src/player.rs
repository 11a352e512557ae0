// src/player.rs

use crate::audio::{OutputConfig, build_stream, setup_output_device};
use crate::decoder::{DecoderCmd, spawn_decoder};
use crate::engine::track::SourceLocator;
use crate::engine::{AudioEngine, EngineEvent, EngineFactory};
use anyhow::Context;
use cpal::traits::StreamTrait;
use cpal::{SampleFormat, Stream};
use ringbuf::HeapRb;
use ringbuf::traits::Split;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;
use std::time::Duration;

/// Samples buffered between the decode thread and the output callback.
/// Kept small so a post-seek flush does not audibly replay stale audio.
const RING_CAPACITY: usize = 32_768;

/// State shared between a binding's API, its decode thread and its output
/// callback.
pub struct PlayerShared {
    pub playing: AtomicBool,
    pub muted: AtomicBool,
    pub volume: AtomicU32, // f32 bits
    pub time_samples: AtomicU64,
    pub duration_millis: AtomicU64,
    pub ready: AtomicBool,
    pub decode_done: AtomicBool,
    pub finished: AtomicBool,
    pub flush: AtomicU32,
    pub alive: AtomicBool,
    pub output_sample_rate: u32,
    pub output_channels: usize,
}

impl PlayerShared {
    fn new(output_sample_rate: u32, output_channels: usize) -> Self {
        Self {
            playing: AtomicBool::new(false),
            muted: AtomicBool::new(false),
            volume: AtomicU32::new(1.0f32.to_bits()),
            time_samples: AtomicU64::new(0),
            duration_millis: AtomicU64::new(0),
            ready: AtomicBool::new(false),
            decode_done: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            flush: AtomicU32::new(0),
            alive: AtomicBool::new(true),
            output_sample_rate,
            output_channels,
        }
    }

    /// Called by the decode thread once the source has been probed.
    pub fn set_ready(&self, duration: Duration) {
        self.duration_millis
            .store(duration.as_millis() as u64, Ordering::Relaxed);
        self.ready.store(true, Ordering::Relaxed);
    }
}

/// One playback engine bound to one audio source: a decode thread feeding a
/// ring buffer drained by the binding's own CPAL output stream. Loading is
/// asynchronous; readiness and end-of-source surface through `poll_event`.
pub struct StemPlayer {
    _stream: Stream,
    _decoder_handle: JoinHandle<()>,
    shared: Arc<PlayerShared>,
    seek_tx: Sender<DecoderCmd>,
    ready_emitted: bool,
    finish_emitted: bool,
}

impl StemPlayer {
    /// Bind a new engine to `path`. Returns immediately; the decode thread
    /// probes the file and reports readiness through `poll_event`.
    pub fn bind(path: &Path) -> Result<Self, anyhow::Error> {
        let output = setup_output_device()?;
        let shared = Arc::new(PlayerShared::new(
            output.output_sample_rate,
            output.output_channels,
        ));

        let rb = HeapRb::<f32>::new(RING_CAPACITY);
        let (producer, consumer) = rb.split();

        let (decoder_handle, seek_tx) = spawn_decoder(path.to_path_buf(), producer, shared.clone());

        let err_fn = |err| log::error!("output stream error: {err}");
        let OutputConfig {
            device,
            config,
            sample_format,
            ..
        } = output;

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32, _>(device, config, shared.clone(), consumer, err_fn)?,
            SampleFormat::I16 => build_stream::<i16, _>(device, config, shared.clone(), consumer, err_fn)?,
            SampleFormat::U16 => build_stream::<u16, _>(device, config, shared.clone(), consumer, err_fn)?,
            other => anyhow::bail!("Unsupported sample format: {:?}", other),
        };
        stream.play().context("starting output stream")?;

        Ok(Self {
            _stream: stream,
            _decoder_handle: decoder_handle,
            shared,
            seek_tx,
            ready_emitted: false,
            finish_emitted: false,
        })
    }
}

impl AudioEngine for StemPlayer {
    fn play(&mut self) {
        self.shared.playing.store(true, Ordering::Relaxed);
    }

    fn pause(&mut self) {
        self.shared.playing.store(false, Ordering::Relaxed);
    }

    fn set_time(&mut self, pos: Duration) {
        let _ = self.seek_tx.send(DecoderCmd::Seek(pos));
        // Tell the output callback to drop whatever was decoded before the seek.
        self.shared.flush.fetch_add(1, Ordering::Relaxed);
        self.shared.finished.store(false, Ordering::Relaxed);
        self.finish_emitted = false;
        // Reported time jumps immediately rather than waiting for the decoder.
        let frames = pos.as_secs_f64() * self.shared.output_sample_rate as f64;
        let samples = frames.round() as u64 * self.shared.output_channels as u64;
        self.shared.time_samples.store(samples, Ordering::Relaxed);
    }

    fn set_volume(&mut self, volume: f32) {
        self.shared
            .volume
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    fn set_muted(&mut self, muted: bool) {
        self.shared.muted.store(muted, Ordering::Relaxed);
    }

    fn current_time(&self) -> Duration {
        let samples = self.shared.time_samples.load(Ordering::Relaxed) as f64;
        let frames = samples / self.shared.output_channels as f64;
        Duration::from_secs_f64(frames / self.shared.output_sample_rate as f64)
    }

    fn duration(&self) -> Option<Duration> {
        if self.shared.ready.load(Ordering::Relaxed) {
            Some(Duration::from_millis(
                self.shared.duration_millis.load(Ordering::Relaxed),
            ))
        } else {
            None
        }
    }

    fn poll_event(&mut self) -> Option<EngineEvent> {
        if !self.ready_emitted && self.shared.ready.load(Ordering::Relaxed) {
            self.ready_emitted = true;
            return Some(EngineEvent::Ready {
                duration: Duration::from_millis(self.shared.duration_millis.load(Ordering::Relaxed)),
            });
        }
        if !self.finish_emitted && self.shared.finished.load(Ordering::Relaxed) {
            self.finish_emitted = true;
            self.shared.playing.store(false, Ordering::Relaxed);
            return Some(EngineEvent::Finish);
        }
        None
    }
}

impl Drop for StemPlayer {
    fn drop(&mut self) {
        // Unblocks a decode thread parked on a full ring buffer; the stream
        // and command channel close with us.
        self.shared.alive.store(false, Ordering::Relaxed);
    }
}

/// Binds `StemPlayer` engines against the default output device.
pub struct CpalPlayerFactory;

impl EngineFactory for CpalPlayerFactory {
    type Engine = StemPlayer;

    fn bind(&self, locator: &SourceLocator) -> Result<StemPlayer, anyhow::Error> {
        StemPlayer::bind(locator.path())
    }
}
