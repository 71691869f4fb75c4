//! Run reconciliation
//!
//! Cross-references the tasks recorded in a transcript against what exists
//! in storage. Reconciling never downloads anything, so it can be repeated
//! against the same directory and transcript with the same result.

use crate::media::MediaKind;
use crate::output::transcript::{read_tasks, TranscriptTask};
use crate::storage::{OutputLayout, Storage};
use crate::HarvestError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Reconciliation outcome of one transcript URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledEntry {
    pub url: String,
    pub kind: MediaKind,
    pub path: PathBuf,
    pub present: bool,
}

/// Success/failure accounting of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Unique URLs recorded in the transcript
    pub attempted: usize,
    /// URLs whose file exists
    pub found: usize,
    /// URLs whose file does not exist
    pub missing: usize,
    pub entries: Vec<ReconciledEntry>,
}

impl Reconciliation {
    pub fn is_complete(&self) -> bool {
        self.missing == 0
    }

    pub fn missing_entries(&self) -> impl Iterator<Item = &ReconciledEntry> {
        self.entries.iter().filter(|e| !e.present)
    }
}

/// Reconciles the transcript at `transcript` against storage
///
/// # Arguments
///
/// * `transcript` - Transcript file written during the run
/// * `layout` - Output layout deciding where each URL's file should be
/// * `storage` - Storage the workers wrote to
///
/// # Returns
///
/// * `Ok(Reconciliation)` - Counts and per-URL detail
/// * `Err(HarvestError::Transcript)` - The transcript could not be read
pub async fn reconcile(
    transcript: &Path,
    layout: &OutputLayout,
    storage: &dyn Storage,
) -> Result<Reconciliation, HarvestError> {
    let tasks = read_tasks(transcript).await?;
    Ok(reconcile_tasks(&tasks, layout, storage).await)
}

/// Reconciles already-parsed transcript tasks
///
/// Duplicate URLs are counted once, at their first occurrence.
pub async fn reconcile_tasks(
    tasks: &[TranscriptTask],
    layout: &OutputLayout,
    storage: &dyn Storage,
) -> Reconciliation {
    let mut seen = HashSet::new();
    let mut report = Reconciliation::default();

    for task in tasks {
        if !seen.insert(task.url.as_str()) {
            continue;
        }

        let path = layout.destination(&task.url, task.kind);
        let present = storage.exists(&path).await;

        report.attempted += 1;
        if present {
            report.found += 1;
        } else {
            report.missing += 1;
        }

        report.entries.push(ReconciledEntry {
            url: task.url.clone(),
            kind: task.kind,
            path,
            present,
        });
    }

    report
}

/// Writes the manifest: each URL followed by its file name or `MISSING`
pub async fn write_manifest(path: &Path, reconciliation: &Reconciliation) -> Result<(), HarvestError> {
    tokio::fs::write(path, render_manifest(reconciliation))
        .await
        .map_err(|source| HarvestError::Transcript {
            path: path.display().to_string(),
            source,
        })
}

/// Renders the manifest text
pub fn render_manifest(reconciliation: &Reconciliation) -> String {
    let mut out = String::new();

    for entry in &reconciliation.entries {
        let name = if entry.present {
            entry
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            "MISSING".to_string()
        };
        out.push_str(&format!("{}\t{}\n", entry.url, name));
    }

    out.push_str(&format!(
        "\n{} of {} downloaded, {} missing\n",
        reconciliation.found, reconciliation.attempted, reconciliation.missing
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputConfig;
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    fn layout(dir: &Path) -> OutputLayout {
        OutputLayout::new(&OutputConfig {
            directory: dir.display().to_string(),
            video_subdir: "video".to_string(),
            transcript_name: "transcript.txt".to_string(),
            manifest_name: "manifest.txt".to_string(),
        })
    }

    fn task(kind: MediaKind, url: &str) -> TranscriptTask {
        TranscriptTask {
            kind,
            url: url.to_string(),
            context: None,
        }
    }

    #[tokio::test]
    async fn test_found_and_missing() {
        let dir = TempDir::new().unwrap();
        let layout = layout(dir.path());
        std::fs::write(dir.path().join("A.png"), b"x").unwrap();
        std::fs::create_dir_all(dir.path().join("video")).unwrap();
        std::fs::write(dir.path().join("video").join("c.mp4"), b"x").unwrap();

        let tasks = vec![
            task(MediaKind::Image, "https://img.example.com/media/A?format=png"),
            task(MediaKind::Image, "https://img.example.com/media/B?format=png"),
            task(MediaKind::Video, "https://video.example.com/pu/vid/c.mp4"),
            task(MediaKind::Image, "https://img.example.com/media/A?format=png"),
        ];

        let report = reconcile_tasks(&tasks, &layout, &LocalStorage::new()).await;
        assert_eq!(report.attempted, 3);
        assert_eq!(report.found, 2);
        assert_eq!(report.missing, 1);
        assert!(!report.is_complete());

        let missing: Vec<_> = report.missing_entries().map(|e| e.url.as_str()).collect();
        assert_eq!(missing, vec!["https://img.example.com/media/B?format=png"]);
    }

    #[tokio::test]
    async fn test_reconcile_is_repeatable() {
        let dir = TempDir::new().unwrap();
        let layout = layout(dir.path());
        std::fs::write(
            layout.transcript_path(),
            "# header\nTASK\timage\thttps://img.example.com/media/A?format=png\t-\n",
        )
        .unwrap();

        let storage = LocalStorage::new();
        let first = reconcile(layout.transcript_path(), &layout, &storage)
            .await
            .unwrap();
        let second = reconcile(layout.transcript_path(), &layout, &storage)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.attempted, 1);
        assert_eq!(first.missing, 1);
        // Nothing was created by reconciling
        assert!(!dir.path().join("A.png").exists());
    }

    #[tokio::test]
    async fn test_manifest() {
        let dir = TempDir::new().unwrap();
        let layout = layout(dir.path());
        std::fs::write(dir.path().join("A.png"), b"x").unwrap();

        let tasks = vec![
            task(MediaKind::Image, "https://img.example.com/media/A?format=png"),
            task(MediaKind::Image, "https://img.example.com/media/B?format=png"),
        ];
        let report = reconcile_tasks(&tasks, &layout, &LocalStorage::new()).await;
        write_manifest(layout.manifest_path(), &report).await.unwrap();

        let manifest = std::fs::read_to_string(layout.manifest_path()).unwrap();
        assert!(manifest.contains("https://img.example.com/media/A?format=png\tA.png\n"));
        assert!(manifest.contains("https://img.example.com/media/B?format=png\tMISSING\n"));
        assert!(manifest.ends_with("1 of 2 downloaded, 1 missing\n"));
    }
}
