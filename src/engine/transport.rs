// src/engine/transport.rs

use std::time::{Duration, Instant};

use super::track::LoadState;
use super::{AudioEngine, EngineEvent, Session};

/// Seconds moved by the skip controls.
const SKIP_SECONDS: f64 = 10.0;

/// Global transport state. While playing, the position follows the
/// reference track's engine; every other engine is free to drift slightly.
#[derive(Clone, Copy, Debug, Default)]
pub struct Transport {
    pub playing: bool,
    pub position: Duration,
}

impl<E: AudioEngine> Session<E> {
    pub fn is_playing(&self) -> bool {
        self.transport.playing
    }

    pub fn position(&self) -> Duration {
        self.transport.position
    }

    /// Start or stop all tracks together. On start, every binding is first
    /// seeked to the reference track's time so they begin aligned; only
    /// then does each one receive its play command.
    pub fn toggle_play(&mut self) {
        if self.tracks.is_empty() {
            return;
        }
        if self.transport.playing {
            self.pause_all();
            return;
        }

        let start = self.reference_time().unwrap_or(self.transport.position);
        for track in &mut self.tracks {
            if let Some(engine) = track.engine.as_mut() {
                engine.set_time(start);
            }
        }
        for track in &mut self.tracks {
            if let Some(engine) = track.engine.as_mut() {
                engine.play();
            }
        }
        self.transport.position = start;
        self.transport.playing = true;
    }

    pub(crate) fn pause_all(&mut self) {
        for track in &mut self.tracks {
            if let Some(engine) = track.engine.as_mut() {
                engine.pause();
            }
        }
        self.transport.playing = false;
    }

    /// The reference track's engine time, if track 0 is bound.
    pub(crate) fn reference_time(&self) -> Option<Duration> {
        self.tracks
            .first()
            .and_then(|t| t.engine.as_ref())
            .map(|e| e.current_time())
    }

    /// Jump every track to `time` (seconds, clamped to the known duration)
    /// and move the cursor immediately, without waiting for the engines.
    pub fn seek(&mut self, time: f64) {
        let upper = self.duration().map(|d| d.as_secs_f64()).unwrap_or(0.0);
        let pos = Duration::from_secs_f64(time.clamp(0.0, upper));
        for track in &mut self.tracks {
            if let Some(engine) = track.engine.as_mut() {
                engine.set_time(pos);
            }
        }
        self.transport.position = pos;
    }

    pub fn skip_forward(&mut self) {
        self.seek(self.transport.position.as_secs_f64() + SKIP_SECONDS);
    }

    pub fn skip_backward(&mut self) {
        self.seek(self.transport.position.as_secs_f64() - SKIP_SECONDS);
    }

    /// One scheduling beat of the session, run at the UI frame cadence:
    /// drains engine events, enforces the load timeout, and refreshes the
    /// cursor from the reference track.
    pub fn tick(&mut self) {
        let mut reference_finished = false;
        let mut interaction: Option<Duration> = None;
        let mut readiness_changed = false;

        for (index, track) in self.tracks.iter_mut().enumerate() {
            let Some(engine) = track.engine.as_mut() else {
                continue;
            };
            while let Some(event) = engine.poll_event() {
                match event {
                    EngineEvent::Ready { .. } => {
                        track.load = LoadState::Ready;
                        readiness_changed = true;
                    }
                    EngineEvent::Finish if index == 0 => reference_finished = true,
                    // Other tracks run out on their own; that drift is accepted.
                    EngineEvent::Finish => {}
                    EngineEvent::Interaction { time } => interaction = Some(time),
                }
            }
        }

        let now = Instant::now();
        for track in &mut self.tracks {
            if let LoadState::Pending { deadline } = track.load {
                if now >= deadline {
                    log::warn!("track '{}' never became ready, giving up on it", track.name);
                    track.load = LoadState::Failed;
                    readiness_changed = true;
                }
            }
        }

        if readiness_changed {
            self.recompute_duration();
        }
        if reference_finished && self.transport.playing {
            self.pause_all();
        }
        // A manual reposition inside any one track realigns all of them.
        if let Some(time) = interaction {
            self.seek(time.as_secs_f64());
        }

        if self.transport.playing {
            if let Some(time) = self.reference_time() {
                self.transport.position = time;
            }
        }
    }
}
