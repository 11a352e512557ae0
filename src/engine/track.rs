// src/engine/track.rs

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::recorder::take::TakeFile;
use crate::stems::StemDescriptor;

/// Identifier for a track, stable for the track's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TrackId(pub u32);

/// Provenance of a track's audio.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackKind {
    /// A separated stem delivered by the worker.
    Stem,
    /// A microphone take recorded inside the session.
    Overdub,
}

/// Display category derived from the track name. Carries the lane color
/// the UI renders the track with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StemCategory {
    Drums,
    Bass,
    Other,
    Vocals,
    Piano,
    Guitar,
    Recording,
    Default,
}

impl StemCategory {
    /// Keywords in match priority order.
    const KEYWORDS: &'static [(&'static str, StemCategory)] = &[
        ("drums", StemCategory::Drums),
        ("bass", StemCategory::Bass),
        ("other", StemCategory::Other),
        ("vocals", StemCategory::Vocals),
        ("piano", StemCategory::Piano),
        ("guitar", StemCategory::Guitar),
        ("recording", StemCategory::Recording),
    ];

    /// Case-insensitive substring match against the known stem keywords.
    pub fn classify(name: &str) -> Self {
        let lower = name.to_lowercase();
        for (keyword, category) in Self::KEYWORDS {
            if lower.contains(keyword) {
                return *category;
            }
        }
        StemCategory::Default
    }

    pub fn color(&self) -> &'static str {
        match self {
            StemCategory::Drums => "#FF6B8B",
            StemCategory::Bass => "#5E7CE2",
            StemCategory::Other => "#FFC145",
            StemCategory::Vocals => "#B39EF3",
            StemCategory::Piano => "#A78BFA",
            StemCategory::Guitar => "#F97316",
            StemCategory::Recording => "#10B981",
            StemCategory::Default => "#4ECDC4",
        }
    }
}

/// Where a track's audio lives. Stem files belong to the worker's output
/// directory and double as the download location; takes are owned by the
/// session and must be released exactly once.
#[derive(Debug)]
pub enum SourceLocator {
    Stem(PathBuf),
    Take(TakeFile),
}

impl SourceLocator {
    pub fn path(&self) -> &Path {
        match self {
            SourceLocator::Stem(path) => path,
            SourceLocator::Take(take) => take.path(),
        }
    }

    /// Release the underlying resource if this locator owns one.
    pub fn revoke(&mut self) {
        if let SourceLocator::Take(take) = self {
            take.revoke();
        }
    }
}

/// Binding/readiness state of a track's engine.
#[derive(Clone, Copy, Debug)]
pub enum LoadState {
    /// No engine bound yet (waiting for the next mount pass).
    Unmounted,
    /// Engine bound, still decoding toward readiness.
    Pending { deadline: Instant },
    /// Engine reported a finite duration.
    Ready,
    /// Binding failed or timed out; the track no longer blocks the session.
    Failed,
}

pub const DEFAULT_VOLUME: f32 = 0.8;

/// One mixable audio unit.
pub struct Track<E> {
    pub id: TrackId,
    pub name: String,
    pub category: StemCategory,
    pub locator: SourceLocator,
    pub engine: Option<E>,
    pub volume: f32,
    pub muted: bool,
    pub soloed: bool,
    pub kind: TrackKind,
    pub load: LoadState,
}

impl<E> Track<E> {
    pub fn from_stem(id: TrackId, descriptor: &StemDescriptor) -> Self {
        let name = strip_extension(&descriptor.name);
        let category = StemCategory::classify(&name);
        Self {
            id,
            name,
            category,
            locator: SourceLocator::Stem(descriptor.locator.clone()),
            engine: None,
            volume: DEFAULT_VOLUME,
            muted: false,
            soloed: false,
            kind: TrackKind::Stem,
            load: LoadState::Unmounted,
        }
    }

    pub fn from_take(id: TrackId, name: String, take: TakeFile) -> Self {
        Self {
            id,
            name,
            category: StemCategory::Recording,
            locator: SourceLocator::Take(take),
            engine: None,
            volume: DEFAULT_VOLUME,
            muted: false,
            soloed: false,
            kind: TrackKind::Overdub,
            load: LoadState::Unmounted,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.load, LoadState::Ready)
    }
}

fn strip_extension(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_known_stems() {
        assert_eq!(StemCategory::classify("vocals"), StemCategory::Vocals);
        assert_eq!(StemCategory::classify("Drums"), StemCategory::Drums);
        assert_eq!(StemCategory::classify("my_bass_line"), StemCategory::Bass);
        assert_eq!(StemCategory::classify("GUITAR solo"), StemCategory::Guitar);
        assert_eq!(StemCategory::classify("Recording 3"), StemCategory::Recording);
    }

    #[test]
    fn classify_falls_back_for_unknown_names() {
        assert_eq!(StemCategory::classify("synth lead"), StemCategory::Default);
        assert_eq!(StemCategory::classify(""), StemCategory::Default);
    }

    #[test]
    fn stem_track_strips_extension() {
        let descriptor = StemDescriptor {
            name: "vocals.wav".into(),
            locator: PathBuf::from("/tmp/out/vocals.wav"),
        };
        let track: Track<()> = Track::from_stem(TrackId(0), &descriptor);
        assert_eq!(track.name, "vocals");
        assert_eq!(track.category, StemCategory::Vocals);
        assert_eq!(track.kind, TrackKind::Stem);
        assert_eq!(track.volume, DEFAULT_VOLUME);
    }
}
