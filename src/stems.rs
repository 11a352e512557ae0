// src/stems.rs

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One stem as delivered by the separation worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StemDescriptor {
    pub name: String,
    pub locator: PathBuf,
}

/// Manifest the worker leaves next to its output: stem name → audio path.
#[derive(Debug, Deserialize)]
struct StemManifest {
    #[serde(default)]
    song: Option<String>,
    stems: BTreeMap<String, PathBuf>,
}

const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac", "ogg", "aac", "m4a"];

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Read a worker manifest (`stems.json`). Paths in the manifest are
/// resolved relative to the manifest's own directory.
pub fn load_manifest(path: &Path) -> Result<Vec<StemDescriptor>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading stem manifest {path:?}"))?;
    let manifest: StemManifest =
        serde_json::from_str(&data).with_context(|| format!("parsing stem manifest {path:?}"))?;
    if let Some(song) = &manifest.song {
        log::info!("stem set for '{song}': {} stems", manifest.stems.len());
    }

    let base = path.parent().unwrap_or(Path::new("."));
    Ok(manifest
        .stems
        .into_iter()
        .map(|(name, locator)| StemDescriptor {
            name,
            locator: if locator.is_absolute() {
                locator
            } else {
                base.join(locator)
            },
        })
        .collect())
}

/// Scan a worker output directory (e.g. `song_stems/`) for stem audio
/// files, in name order.
pub fn scan_stem_dir(dir: &Path) -> Result<Vec<StemDescriptor>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("reading stem directory {dir:?}"))?;

    let mut stems = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !is_audio_file(&path) {
            continue;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        stems.push(StemDescriptor {
            name,
            locator: path,
        });
    }
    stems.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(stems)
}

/// Resolve the user's command-line sources into a stem set: a manifest
/// file, a stems directory, or individual audio files.
pub fn load_stem_set(sources: &[String]) -> Result<Vec<StemDescriptor>> {
    let mut stems = Vec::new();
    for source in sources {
        let path = Path::new(source);
        if path.is_dir() {
            stems.extend(scan_stem_dir(path)?);
        } else if path.extension().and_then(|e| e.to_str()) == Some("json") {
            stems.extend(load_manifest(path)?);
        } else if is_audio_file(path) {
            stems.push(StemDescriptor {
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| source.clone()),
                locator: path.to_path_buf(),
            });
        } else {
            bail!("'{source}' is not a stems directory, manifest or audio file");
        }
    }
    Ok(stems)
}
