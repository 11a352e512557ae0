// src/engine/mod.rs

pub mod mixer;
pub mod track;
pub mod transport;

pub use track::{LoadState, SourceLocator, StemCategory, Track, TrackId, TrackKind};
pub use transport::Transport;

use std::time::{Duration, Instant};

use crate::recorder::take::TakeFile;
use crate::stems::StemDescriptor;

/// How long a bound engine may stay silent before the registry gives up on
/// it and stops letting it block duration computation.
pub const LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Events an engine binding reports back to the session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EngineEvent {
    /// The engine probed its source and now reports a finite duration.
    Ready { duration: Duration },
    /// Playback reached the end of this engine's source.
    Finish,
    /// The user repositioned inside this track's own view.
    Interaction { time: Duration },
}

/// Per-track playback engine: one bound audio source with its own
/// transport position, volume and mute state. Commands are fire-and-forget;
/// lifecycle news comes back through `poll_event`.
pub trait AudioEngine {
    fn play(&mut self);
    fn pause(&mut self);
    fn set_time(&mut self, pos: Duration);
    fn set_volume(&mut self, volume: f32);
    fn set_muted(&mut self, muted: bool);
    fn current_time(&self) -> Duration;
    fn duration(&self) -> Option<Duration>;
    fn poll_event(&mut self) -> Option<EngineEvent>;
}

/// Creates engine bindings during a mount pass.
pub trait EngineFactory {
    type Engine: AudioEngine;

    fn bind(&self, locator: &SourceLocator) -> Result<Self::Engine, anyhow::Error>;
}

/// The active multi-track session: the ordered track list plus the shared
/// transport. Track 0 is the reference track; its engine drives the cursor.
pub struct Session<E: AudioEngine> {
    tracks: Vec<Track<E>>,
    transport: Transport,
    duration: Option<Duration>,
    next_id: u32,
    overdub_count: u32,
}

impl<E: AudioEngine> Default for Session<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: AudioEngine> Session<E> {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            transport: Transport::default(),
            duration: None,
            next_id: 0,
            overdub_count: 0,
        }
    }

    pub fn tracks(&self) -> &[Track<E>] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Longest duration reported so far; None until the first full set of
    /// bound tracks has settled.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    fn alloc_id(&mut self) -> TrackId {
        let id = TrackId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Replace the whole track list. Every existing binding is destroyed
    /// before the new records are created, and recorded takes are released;
    /// nothing of the old session survives into the new one.
    pub fn set_tracks(&mut self, descriptors: Vec<StemDescriptor>) {
        self.clear_tracks();
        for descriptor in &descriptors {
            let id = self.alloc_id();
            self.tracks.push(Track::from_stem(id, descriptor));
        }
        self.duration = None;
        self.transport = Transport::default();
    }

    fn clear_tracks(&mut self) {
        for track in &mut self.tracks {
            // The binding dies before its locator is released.
            track.engine = None;
            track.locator.revoke();
        }
        self.tracks.clear();
    }

    /// Bind every track that does not have an engine yet, then push the
    /// retained mix state into the fresh bindings. Idempotent: once every
    /// track is bound this does no work until the list changes. A factory
    /// failure marks only that track as failed.
    pub fn mount<F>(&mut self, factory: &F)
    where
        F: EngineFactory<Engine = E>,
    {
        let mut bound_any = false;
        for track in &mut self.tracks {
            if track.engine.is_some() || matches!(track.load, LoadState::Failed) {
                continue;
            }
            match factory.bind(&track.locator) {
                Ok(engine) => {
                    track.engine = Some(engine);
                    track.load = LoadState::Pending {
                        deadline: Instant::now() + LOAD_TIMEOUT,
                    };
                    bound_any = true;
                }
                Err(e) => {
                    log::error!("failed to bind engine for '{}': {e:#}", track.name);
                    track.load = LoadState::Failed;
                }
            }
        }
        if bound_any {
            self.apply_mix_state();
        }
    }

    /// Append one recorded take as a new track without touching existing
    /// bindings. The track stays unbound until the next mount pass and does
    /// not join running playback.
    pub fn append_take(&mut self, take: TakeFile) -> TrackId {
        let id = self.alloc_id();
        self.overdub_count += 1;
        let name = format!("Recording {}", self.overdub_count);
        self.tracks.push(Track::from_take(id, name, take));
        id
    }

    /// Remove one track: its binding dies first, then its take (if it has
    /// one) is released exactly once. No other track is touched.
    pub fn remove(&mut self, index: usize) {
        if index >= self.tracks.len() {
            return;
        }
        let mut track = self.tracks.remove(index);
        track.engine = None;
        track.locator.revoke();
    }

    /// Recompute the session duration. Runs only once every bound track has
    /// settled (ready or failed); the result can extend the previously
    /// computed duration but never shrink it.
    pub(crate) fn recompute_duration(&mut self) {
        let bound: Vec<&Track<E>> = self.tracks.iter().filter(|t| t.engine.is_some()).collect();
        if bound.is_empty() {
            return;
        }
        if bound
            .iter()
            .any(|t| matches!(t.load, LoadState::Pending { .. }))
        {
            return;
        }
        let longest = bound
            .iter()
            .filter(|t| t.is_ready())
            .filter_map(|t| t.engine.as_ref().and_then(|e| e.duration()))
            .max();
        if let Some(longest) = longest {
            self.duration = Some(match self.duration {
                Some(current) => current.max(longest),
                None => longest,
            });
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::path::PathBuf;

    #[derive(Clone, Debug, PartialEq)]
    pub enum Cmd {
        Play,
        Pause,
        SetTime(Duration),
        SetVolume(f32),
        SetMuted(bool),
    }

    /// Command-recording engine used by the registry/mixer/transport tests.
    pub struct FakeEngine {
        pub log: Vec<Cmd>,
        pub time: Duration,
        pub playing: bool,
        pub muted: bool,
        pub volume: f32,
        pub total: Duration,
        pub ready: bool,
        pub events: VecDeque<EngineEvent>,
    }

    impl FakeEngine {
        pub fn with_duration(total: Duration) -> Self {
            let mut events = VecDeque::new();
            events.push_back(EngineEvent::Ready { duration: total });
            Self {
                log: Vec::new(),
                time: Duration::ZERO,
                playing: false,
                muted: false,
                volume: 1.0,
                total,
                ready: false,
                events,
            }
        }

        /// An engine that never reports ready (stuck load).
        pub fn never_ready() -> Self {
            Self {
                log: Vec::new(),
                time: Duration::ZERO,
                playing: false,
                muted: false,
                volume: 1.0,
                total: Duration::ZERO,
                ready: false,
                events: VecDeque::new(),
            }
        }
    }

    impl AudioEngine for FakeEngine {
        fn play(&mut self) {
            self.playing = true;
            self.log.push(Cmd::Play);
        }

        fn pause(&mut self) {
            self.playing = false;
            self.log.push(Cmd::Pause);
        }

        fn set_time(&mut self, pos: Duration) {
            self.time = pos;
            self.log.push(Cmd::SetTime(pos));
        }

        fn set_volume(&mut self, volume: f32) {
            self.volume = volume;
            self.log.push(Cmd::SetVolume(volume));
        }

        fn set_muted(&mut self, muted: bool) {
            self.muted = muted;
            self.log.push(Cmd::SetMuted(muted));
        }

        fn current_time(&self) -> Duration {
            self.time
        }

        fn duration(&self) -> Option<Duration> {
            self.ready.then_some(self.total)
        }

        fn poll_event(&mut self) -> Option<EngineEvent> {
            let event = self.events.pop_front();
            if let Some(EngineEvent::Ready { .. }) = event {
                self.ready = true;
            }
            event
        }
    }

    /// Hands out fake engines with preset durations, in bind order; paths
    /// listed in `refuse` fail to bind.
    pub struct FakeFactory {
        pub durations: RefCell<VecDeque<Duration>>,
        pub refuse: Vec<String>,
        pub stuck: Vec<String>,
    }

    impl FakeFactory {
        pub fn with_durations(secs: &[u64]) -> Self {
            Self {
                durations: RefCell::new(secs.iter().map(|&s| Duration::from_secs(s)).collect()),
                refuse: Vec::new(),
                stuck: Vec::new(),
            }
        }
    }

    impl EngineFactory for FakeFactory {
        type Engine = FakeEngine;

        fn bind(&self, locator: &SourceLocator) -> Result<FakeEngine, anyhow::Error> {
            let name = locator
                .path()
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if self.refuse.iter().any(|r| name.contains(r.as_str())) {
                anyhow::bail!("bind refused for {name}");
            }
            if self.stuck.iter().any(|s| name.contains(s.as_str())) {
                return Ok(FakeEngine::never_ready());
            }
            let duration = self
                .durations
                .borrow_mut()
                .pop_front()
                .unwrap_or(Duration::from_secs(60));
            Ok(FakeEngine::with_duration(duration))
        }
    }

    pub fn descriptors(names: &[&str]) -> Vec<StemDescriptor> {
        names
            .iter()
            .map(|name| StemDescriptor {
                name: format!("{name}.wav"),
                locator: PathBuf::from(format!("/tmp/stems/{name}.wav")),
            })
            .collect()
    }

    /// A session with one fake engine per name, mounted and ticked until
    /// every track has reported ready.
    pub fn ready_session(names: &[&str], secs: &[u64]) -> Session<FakeEngine> {
        let mut session = Session::new();
        session.set_tracks(descriptors(names));
        session.mount(&FakeFactory::with_durations(secs));
        session.tick();
        session
    }

    pub fn engine(session: &Session<FakeEngine>, index: usize) -> &FakeEngine {
        session.tracks()[index].engine.as_ref().unwrap()
    }

    pub fn engine_mut(session: &mut Session<FakeEngine>, index: usize) -> &mut FakeEngine {
        session.tracks[index].engine.as_mut().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn duration_is_the_longest_ready_track() {
        let session = ready_session(&["vocals", "drums", "bass"], &[180, 182, 179]);
        assert_eq!(session.duration(), Some(Duration::from_secs(182)));
    }

    #[test]
    fn duration_waits_for_the_slowest_track() {
        let mut session = Session::new();
        session.set_tracks(descriptors(&["vocals", "drums"]));
        let mut factory = FakeFactory::with_durations(&[180]);
        factory.stuck = vec!["drums".into()];
        session.mount(&factory);
        session.tick();
        // One track never settled, so no duration may be reported yet.
        assert_eq!(session.duration(), None);
    }

    #[test]
    fn mount_is_idempotent() {
        let mut session = ready_session(&["vocals", "drums"], &[100, 100]);
        let before: Vec<usize> = session.tracks().iter().map(|t| t.engine.as_ref().unwrap().log.len()).collect();
        session.mount(&FakeFactory::with_durations(&[5]));
        let after: Vec<usize> = session.tracks().iter().map(|t| t.engine.as_ref().unwrap().log.len()).collect();
        assert_eq!(before, after, "a full remount must not reissue commands");
    }

    #[test]
    fn bind_failure_is_isolated_to_one_track() {
        let mut session = Session::new();
        session.set_tracks(descriptors(&["vocals", "drums", "bass"]));
        let mut factory = FakeFactory::with_durations(&[100, 100]);
        factory.refuse = vec!["drums".into()];
        session.mount(&factory);
        session.tick();

        assert!(session.tracks()[0].engine.is_some());
        assert!(session.tracks()[1].engine.is_none());
        assert!(matches!(session.tracks()[1].load, LoadState::Failed));
        assert!(session.tracks()[2].engine.is_some());
        // The failed track does not block the others' duration.
        assert_eq!(session.duration(), Some(Duration::from_secs(100)));
    }

    #[test]
    fn replacing_tracks_resets_the_session() {
        let mut session = ready_session(&["vocals", "drums"], &[100, 120]);
        session.toggle_play();
        assert!(session.is_playing());

        session.set_tracks(descriptors(&["piano"]));
        assert_eq!(session.len(), 1);
        assert!(session.tracks()[0].engine.is_none());
        assert_eq!(session.duration(), None);
        assert!(!session.is_playing());
        assert_eq!(session.position(), Duration::ZERO);
    }

    #[test]
    fn appended_track_extends_but_never_shrinks_duration() {
        let mut session = ready_session(&["vocals"], &[100]);
        assert_eq!(session.duration(), Some(Duration::from_secs(100)));

        // A shorter take arrives: duration holds.
        session.append_take(crate::recorder::take::TakeFile::new("/tmp/take-a.wav".into()));
        session.mount(&FakeFactory::with_durations(&[40]));
        session.tick();
        assert_eq!(session.duration(), Some(Duration::from_secs(100)));

        // A longer take arrives: duration grows.
        session.append_take(crate::recorder::take::TakeFile::new("/tmp/take-b.wav".into()));
        session.mount(&FakeFactory::with_durations(&[150]));
        session.tick();
        assert_eq!(session.duration(), Some(Duration::from_secs(150)));
    }

    #[test]
    fn removing_a_recorded_track_releases_its_take_and_nothing_else() {
        let dir = tempfile::tempdir().unwrap();
        let take_path = dir.path().join("take.wav");
        std::fs::write(&take_path, b"riff").unwrap();

        let mut session = ready_session(&["vocals"], &[100]);
        session.append_take(crate::recorder::take::TakeFile::new(take_path.clone()));
        session.mount(&FakeFactory::with_durations(&[10]));
        session.tick();

        session.remove(1);

        assert!(!take_path.exists(), "take file must be released on removal");
        assert!(std::fs::read(&take_path).is_err());
        assert_eq!(session.len(), 1);
        assert!(session.tracks()[0].engine.is_some(), "other bindings stay untouched");
    }

    #[test]
    fn track_ids_are_never_reused() {
        let mut session = ready_session(&["vocals", "drums"], &[100, 100]);
        let second = session.tracks()[1].id;
        session.remove(0);
        let appended = session.append_take(crate::recorder::take::TakeFile::new("/tmp/take.wav".into()));
        assert_ne!(appended, second);
        assert!(appended.0 > second.0);
    }
}
