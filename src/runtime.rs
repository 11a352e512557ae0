// src/runtime.rs

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::{Session, TrackKind};
use crate::player::{CpalPlayerFactory, StemPlayer};
use crate::recorder::input::InputDevice;
use crate::recorder::{CaptureState, RecordingCapture};
use crate::stems::StemDescriptor;

/// Per-track view handed to the UI.
pub struct TrackSnapshot {
    pub id: u32,
    pub name: String,
    pub color: &'static str,
    pub volume: f32,
    pub muted: bool,
    pub soloed: bool,
    pub audible: bool,
    pub ready: bool,
    pub overdub: bool,
    /// Raw source location, doubling as the download/export target.
    pub download: PathBuf,
}

/// Transport view handed to the UI.
pub struct TransportSnapshot {
    pub playing: bool,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub solo_active: bool,
}

/// Owns the session, the engine factory and the recording capture, and
/// exposes the API the host UI drives. All engine state lives on the UI
/// thread; the audio callbacks communicate through atomics inside each
/// binding, so no locking is needed here.
pub struct SessionRuntime {
    session: Session<StemPlayer>,
    factory: CpalPlayerFactory,
    capture: RecordingCapture,
}

impl Default for SessionRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRuntime {
    pub fn new() -> Self {
        Self {
            session: Session::new(),
            factory: CpalPlayerFactory,
            capture: RecordingCapture::new(),
        }
    }

    /// Replace the session with a fresh stem set and bind every stem.
    pub fn load_stems(&mut self, stems: Vec<StemDescriptor>) {
        log::info!("loading stem set with {} stems", stems.len());
        self.session.set_tracks(stems);
        self.session.mount(&self.factory);
    }

    /// One frame of housekeeping; the UI calls this at its redraw cadence.
    pub fn tick(&mut self) {
        self.session.tick();
        self.capture.tick();
    }

    // --- TRANSPORT ---

    pub fn toggle_play(&mut self) {
        self.session.toggle_play();
    }

    pub fn seek(&mut self, time_secs: f64) {
        self.session.seek(time_secs);
    }

    pub fn skip_forward(&mut self) {
        self.session.skip_forward();
    }

    pub fn skip_backward(&mut self) {
        self.session.skip_backward();
    }

    // --- MIX ---

    pub fn toggle_mute(&mut self, index: usize) {
        self.session.toggle_mute(index);
    }

    pub fn toggle_solo(&mut self, index: usize) {
        self.session.toggle_solo(index);
    }

    pub fn set_volume(&mut self, index: usize, volume: f32) {
        self.session.set_volume(index, volume);
    }

    pub fn adjust_volume(&mut self, index: usize, delta: f32) {
        let Some(track) = self.session.tracks().get(index) else {
            return;
        };
        let volume = track.volume + delta;
        self.session.set_volume(index, volume);
    }

    // --- TRACKS ---

    pub fn track_count(&self) -> usize {
        self.session.len()
    }

    pub fn remove_track(&mut self, index: usize) {
        self.session.remove(index);
    }

    pub fn track_snapshots(&self) -> Vec<TrackSnapshot> {
        self.session
            .tracks()
            .iter()
            .enumerate()
            .map(|(index, t)| TrackSnapshot {
                id: t.id.0,
                name: t.name.clone(),
                color: t.category.color(),
                volume: t.volume,
                muted: t.muted,
                soloed: t.soloed,
                audible: self.session.effective_audible(index),
                ready: t.is_ready(),
                overdub: t.kind == TrackKind::Overdub,
                download: t.locator.path().to_path_buf(),
            })
            .collect()
    }

    pub fn transport_snapshot(&self) -> TransportSnapshot {
        TransportSnapshot {
            playing: self.session.is_playing(),
            position: self.session.position(),
            duration: self.session.duration(),
            solo_active: self.session.solo_active(),
        }
    }

    // --- RECORDING ---

    pub fn input_devices(&self) -> Vec<InputDevice> {
        self.capture.devices()
    }

    pub fn capture_state(&self) -> CaptureState {
        self.capture.state()
    }

    pub fn input_level(&self) -> f32 {
        self.capture.input_level()
    }

    pub fn recording_secs(&self) -> u64 {
        self.capture.elapsed_secs()
    }

    pub fn arm_recording(&mut self, device_id: Option<&str>) -> Result<()> {
        self.capture.request_permission(device_id)
    }

    pub fn start_recording(&mut self) -> Result<()> {
        self.capture.start()
    }

    /// Finish the take and append it to the session as a new overdub
    /// track. The transport is left exactly as it was; the new track joins
    /// playback on the next explicit play.
    pub fn stop_recording(&mut self) -> Result<()> {
        let (take, secs) = self.capture.stop()?;
        log::info!("🎙️ captured a {secs}s take");
        self.session.append_take(take);
        self.session.mount(&self.factory);
        Ok(())
    }

    pub fn cancel_recording(&mut self) {
        self.capture.teardown();
    }
}
