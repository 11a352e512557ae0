// src/lib.rs

pub mod audio;
pub mod controller;
pub mod decoder;
pub mod engine;
pub mod player;
pub mod recorder;
pub mod runtime;
pub mod stems;

pub use engine::{AudioEngine, EngineEvent, EngineFactory, Session};
pub use player::StemPlayer;
pub use recorder::RecordingCapture;
pub use runtime::SessionRuntime;
