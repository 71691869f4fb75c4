//! Where downloaded media and run artifacts are placed

use crate::config::OutputConfig;
use crate::media::{media_file_name, MediaKind, PoolClass};
use std::path::{Path, PathBuf};

/// Output directory layout of a run
///
/// Images land directly in the output directory; video-class media go into a
/// sub-directory of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
    video_dir: PathBuf,
    transcript: PathBuf,
    manifest: PathBuf,
}

impl OutputLayout {
    pub fn new(config: &OutputConfig) -> Self {
        let root = PathBuf::from(&config.directory);
        Self {
            video_dir: root.join(&config.video_subdir),
            transcript: root.join(&config.transcript_name),
            manifest: root.join(&config.manifest_name),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory that media of `kind` are stored in
    pub fn directory_for(&self, kind: MediaKind) -> &Path {
        match kind.pool() {
            PoolClass::Image => &self.root,
            PoolClass::Video => &self.video_dir,
        }
    }

    /// Deterministic destination of a media URL
    pub fn destination(&self, url: &str, kind: MediaKind) -> PathBuf {
        self.directory_for(kind).join(media_file_name(url, kind))
    }

    pub fn transcript_path(&self) -> &Path {
        &self.transcript
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest
    }
}
