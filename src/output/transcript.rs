//! Plain-text transcript of the tasks a run emitted
//!
//! The transcript is what the run reconciler works from, so it is written
//! line by line and flushed as tasks are produced. Its format is:
//!
//! ```text
//! # media-harvest transcript
//! # started: 2025-06-10T09:00:00+00:00
//! # window: 2025-06-01T00:00:00+00:00 .. 2025-06-10T23:59:59+00:00
//! # config: 3f2a...
//! TASK	image	https://img.example.com/media/A?format=png&name=large	https://site.example/p/1
//! TASK	video	https://video.example.com/ext_tw_video/1/pu/vid/a.mp4	-
//!
//! == run summary ==
//! attempted=2 found=1 missing=1
//! ```

use crate::media::{classify_url, MediaKind};
use crate::output::Reconciliation;
use crate::pipeline::CandidateReference;
use crate::HarvestError;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

const TASK_PREFIX: &str = "TASK";
const NO_CONTEXT: &str = "-";

/// Marker line opening the summary block
pub const SUMMARY_MARKER: &str = "== run summary ==";

/// One task line read back from a transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptTask {
    pub kind: MediaKind,
    pub url: String,
    pub context: Option<String>,
}

/// Header values written at the top of a transcript
#[derive(Debug, Clone)]
pub struct TranscriptHeader {
    pub started_at: DateTime<Utc>,
    pub window: String,
    pub config_hash: String,
}

/// Append-only transcript of one run
#[derive(Debug)]
pub struct TranscriptLog {
    path: PathBuf,
    file: File,
    recorded: usize,
}

impl TranscriptLog {
    /// Creates (or truncates) the transcript and writes its header
    ///
    /// # Arguments
    ///
    /// * `path` - Location of the transcript file
    /// * `header` - Run metadata recorded as `#` comment lines
    ///
    /// # Returns
    ///
    /// * `Ok(TranscriptLog)` - Transcript ready for task lines
    /// * `Err(HarvestError::Transcript)` - The file could not be created
    pub async fn create(path: &Path, header: &TranscriptHeader) -> Result<Self, HarvestError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| transcript_error(path, e))?;
        }

        let file = File::create(path)
            .await
            .map_err(|e| transcript_error(path, e))?;

        let mut log = Self {
            path: path.to_path_buf(),
            file,
            recorded: 0,
        };

        let text = format!(
            "# media-harvest transcript\n# started: {}\n# window: {}\n# config: {}\n",
            header.started_at.to_rfc3339(),
            header.window,
            header.config_hash
        );
        log.write(&text).await?;
        Ok(log)
    }

    /// Appends one task line
    pub async fn record_task(&mut self, reference: &CandidateReference) -> Result<(), HarvestError> {
        let context = reference
            .source_context
            .as_deref()
            .map(single_field)
            .unwrap_or_else(|| NO_CONTEXT.to_string());

        let line = format!(
            "{}\t{}\t{}\t{}\n",
            TASK_PREFIX,
            reference.kind.as_str(),
            single_field(&reference.url),
            context
        );
        self.write(&line).await?;
        self.recorded += 1;
        Ok(())
    }

    /// Number of task lines written so far
    pub fn recorded(&self) -> usize {
        self.recorded
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write(&mut self, text: &str) -> Result<(), HarvestError> {
        self.file
            .write_all(text.as_bytes())
            .await
            .map_err(|e| transcript_error(&self.path, e))?;
        self.file
            .flush()
            .await
            .map_err(|e| transcript_error(&self.path, e))
    }
}

/// Appends the summary block to an existing transcript
pub async fn append_summary(path: &Path, reconciliation: &Reconciliation) -> Result<(), HarvestError> {
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .await
        .map_err(|e| transcript_error(path, e))?;

    let block = format!(
        "\n{}\nattempted={} found={} missing={}\n",
        SUMMARY_MARKER, reconciliation.attempted, reconciliation.found, reconciliation.missing
    );
    file.write_all(block.as_bytes())
        .await
        .map_err(|e| transcript_error(path, e))?;
    file.flush().await.map_err(|e| transcript_error(path, e))
}

/// Reads every task line of a transcript, in file order
///
/// Comment lines, the summary block and malformed lines are ignored.
pub async fn read_tasks(path: &Path) -> Result<Vec<TranscriptTask>, HarvestError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| transcript_error(path, e))?;
    Ok(parse_tasks(&content))
}

/// Parses task lines out of transcript text
pub fn parse_tasks(content: &str) -> Vec<TranscriptTask> {
    content
        .lines()
        .filter(|line| line.starts_with(TASK_PREFIX))
        .filter_map(|line| {
            let task = parse_task_line(line);
            if task.is_none() {
                tracing::warn!("Ignoring malformed transcript line: {}", line);
            }
            task
        })
        .collect()
}

fn parse_task_line(line: &str) -> Option<TranscriptTask> {
    let mut fields = line.split('\t');
    if fields.next()? != TASK_PREFIX {
        return None;
    }

    let label = fields.next()?;
    let url = fields.next()?.trim();
    if url.is_empty() {
        return None;
    }

    let kind = MediaKind::from_label(label).unwrap_or_else(|| classify_url(url));
    let context = fields
        .next()
        .map(str::trim)
        .filter(|c| !c.is_empty() && *c != NO_CONTEXT)
        .map(str::to_string);

    Some(TranscriptTask {
        kind,
        url: url.to_string(),
        context,
    })
}

/// Keeps a value on one tab-separated field
fn single_field(value: &str) -> String {
    value
        .chars()
        .map(|c| if c == '\t' || c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

fn transcript_error(path: &Path, source: std::io::Error) -> HarvestError {
    HarvestError::Transcript {
        path: path.display().to_string(),
        source,
    }
}
