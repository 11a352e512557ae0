// src/recorder/mod.rs

pub mod input;
pub mod level;
pub mod take;

use anyhow::{Context, Result, anyhow};
use ringbuf::storage::Heap;
use ringbuf::traits::{Consumer, Split};
use ringbuf::wrap::caching::Caching;
use ringbuf::{HeapRb, SharedRb};
use std::path::PathBuf;
use std::sync::Arc;

use input::{AudioInput, InputDevice, enumerate_input_devices};
use level::LevelMeter;
use take::TakeFile;

type CaptureCons = Caching<Arc<SharedRb<Heap<f32>>>, false, true>;

/// Capture ring: a few seconds of headroom so a slow UI tick never drops
/// samples mid-recording.
const CAPTURE_CAPACITY: usize = 192_000;
const MONITOR_CAPACITY: usize = 48_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    AwaitingPermission,
    Armed,
    Recording,
}

/// Microphone capture: owns the input stream, the level meter and the
/// sample buffer of the take in progress. The input stream is never shared
/// with the playback side.
pub struct RecordingCapture {
    state: CaptureState,
    input: Option<AudioInput>,
    capture_rx: Option<CaptureCons>,
    level: Option<LevelMeter<CaptureCons>>,
    buffered: Vec<f32>,
    sample_rate: u32,
    channels: usize,
    take_dir: PathBuf,
    take_count: u32,
}

impl Default for RecordingCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingCapture {
    pub fn new() -> Self {
        Self {
            state: CaptureState::Idle,
            input: None,
            capture_rx: None,
            level: None,
            buffered: Vec::new(),
            sample_rate: 0,
            channels: 0,
            take_dir: std::env::temp_dir(),
            take_count: 0,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == CaptureState::Recording
    }

    /// Available input devices; empty (and logged) when enumeration fails.
    pub fn devices(&self) -> Vec<InputDevice> {
        enumerate_input_devices()
    }

    /// Ask the platform for microphone access by opening the input stream.
    /// On success the capture is armed and the level meter starts running;
    /// on denial the error is returned for the UI and the state stays idle.
    pub fn request_permission(&mut self, device_id: Option<&str>) -> Result<()> {
        if self.input.is_some() {
            self.state = CaptureState::Armed;
            return Ok(());
        }
        self.state = CaptureState::AwaitingPermission;

        let (prod_rec, cons_rec) = HeapRb::<f32>::new(CAPTURE_CAPACITY).split();
        let (prod_mon, cons_mon) = HeapRb::<f32>::new(MONITOR_CAPACITY).split();

        match AudioInput::open(device_id, prod_rec, prod_mon) {
            Ok(input) => {
                self.sample_rate = input.sample_rate;
                self.channels = input.channels;
                self.capture_rx = Some(cons_rec);
                self.level = Some(LevelMeter::new(cons_mon));
                self.input = Some(input);
                self.state = CaptureState::Armed;
                Ok(())
            }
            Err(e) => {
                self.state = CaptureState::Idle;
                Err(e).context("microphone access denied")
            }
        }
    }

    /// Begin buffering a take, acquiring the input stream first if the
    /// user has not granted it yet.
    pub fn start(&mut self) -> Result<()> {
        if self.state == CaptureState::Recording {
            return Ok(());
        }
        if self.input.is_none() {
            self.request_permission(None)?;
        }
        // Drop anything captured before the user hit record.
        if let Some(rx) = self.capture_rx.as_mut() {
            while rx.try_pop().is_some() {}
        }
        self.buffered.clear();
        self.state = CaptureState::Recording;
        log::info!("🔴 Recording started");
        Ok(())
    }

    /// Runs at the UI frame cadence: refreshes the input level while armed
    /// or recording, and drains captured samples while recording.
    pub fn tick(&mut self) {
        if let Some(level) = self.level.as_mut() {
            level.update();
        }
        let Some(rx) = self.capture_rx.as_mut() else {
            return;
        };
        if self.state == CaptureState::Recording {
            let mut tmp = [0.0f32; 4096];
            loop {
                let n = rx.pop_slice(&mut tmp);
                if n == 0 {
                    break;
                }
                self.buffered.extend_from_slice(&tmp[..n]);
            }
        } else {
            // Keep the ring from backing up while merely armed.
            while rx.try_pop().is_some() {}
        }
    }

    /// Whole seconds recorded so far.
    pub fn elapsed_secs(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        (self.buffered.len() as u64 / self.channels as u64) / self.sample_rate as u64
    }

    /// Normalized input level, meaningful while armed or recording.
    pub fn input_level(&self) -> f32 {
        self.level.as_ref().map(|l| l.value()).unwrap_or(0.0)
    }

    /// Finalize the buffered take into a single WAV file and report its
    /// whole-second duration. The capture stays armed for the next take.
    pub fn stop(&mut self) -> Result<(TakeFile, u64)> {
        if self.state != CaptureState::Recording {
            return Err(anyhow!("not recording"));
        }
        self.tick(); // drain the tail
        let elapsed = self.elapsed_secs();

        self.take_count += 1;
        let name = format!("take-{}-{}", std::process::id(), self.take_count);
        let take = take::finalize_take(
            &self.buffered,
            self.sample_rate,
            self.channels,
            &self.take_dir,
            &name,
        )?;

        self.buffered.clear();
        self.state = CaptureState::Armed;
        log::info!("⏹️ Recording stopped ({elapsed}s)");
        Ok((take, elapsed))
    }

    /// Release the input device, the analysis chain and any buffered
    /// samples. Safe to call at any time; used on cancel and on teardown.
    pub fn teardown(&mut self) {
        self.input = None; // stops the stream
        self.capture_rx = None;
        self.level = None;
        self.buffered.clear();
        self.state = CaptureState::Idle;
    }
}

impl Drop for RecordingCapture {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle_with_nothing_buffered() {
        let capture = RecordingCapture::new();
        assert_eq!(capture.state(), CaptureState::Idle);
        assert_eq!(capture.elapsed_secs(), 0);
        assert_eq!(capture.input_level(), 0.0);
    }

    #[test]
    fn stop_without_a_running_take_is_an_error() {
        let mut capture = RecordingCapture::new();
        assert!(capture.stop().is_err());
        assert_eq!(capture.state(), CaptureState::Idle);
    }

    #[test]
    fn teardown_is_idempotent() {
        let mut capture = RecordingCapture::new();
        capture.teardown();
        capture.teardown();
        assert_eq!(capture.state(), CaptureState::Idle);
    }
}
