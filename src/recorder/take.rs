// src/recorder/take.rs

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::{Path, PathBuf};

/// A finalized recording on disk. The file is owned by the session and is
/// deleted exactly once, when the owning track is removed or the track
/// list is replaced — never implicitly.
#[derive(Debug)]
pub struct TakeFile {
    path: PathBuf,
    revoked: bool,
}

impl TakeFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            revoked: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    /// Delete the backing file. Later calls do nothing.
    pub fn revoke(&mut self) {
        if self.revoked {
            return;
        }
        self.revoked = true;
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::warn!("failed to delete take {:?}: {e}", self.path);
        }
    }
}

/// Encode buffered capture samples into a single WAV take.
pub fn finalize_take(
    samples: &[f32],
    sample_rate: u32,
    channels: usize,
    dir: &Path,
    name: &str,
) -> Result<TakeFile> {
    let spec = WavSpec {
        channels: channels as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let path = dir.join(format!("{name}.wav"));
    let mut writer =
        WavWriter::create(&path, spec).with_context(|| format!("creating take {path:?}"))?;
    for &s in samples {
        let v = if s.is_finite() {
            (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
        } else {
            0
        };
        writer.write_sample(v)?;
    }
    writer.finalize()?;
    Ok(TakeFile::new(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_writes_a_readable_wav() {
        let dir = tempfile::tempdir().unwrap();
        let samples: Vec<f32> = (0..44_100).map(|i| (i as f32 * 0.001).sin() * 0.5).collect();

        let take = finalize_take(&samples, 44_100, 1, dir.path(), "take-1").unwrap();
        let reader = hound::WavReader::open(take.path()).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, 44_100);
        assert_eq!(reader.len(), 44_100);
    }

    #[test]
    fn revoke_deletes_the_file_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut take = finalize_take(&[0.0; 512], 48_000, 1, dir.path(), "take-2").unwrap();
        assert!(take.path().exists());

        take.revoke();
        assert!(take.is_revoked());
        assert!(!take.path().exists());
        assert!(hound::WavReader::open(take.path()).is_err());

        // Second call must be inert.
        take.revoke();
        assert!(take.is_revoked());
    }

    #[test]
    fn non_finite_samples_are_silenced() {
        let dir = tempfile::tempdir().unwrap();
        let take =
            finalize_take(&[f32::NAN, f32::INFINITY, 0.5], 8_000, 1, dir.path(), "take-3").unwrap();
        let mut reader = hound::WavReader::open(take.path()).unwrap();
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded[0], 0);
        assert_eq!(decoded[1], 0);
        assert!(decoded[2] > 0);
    }
}
