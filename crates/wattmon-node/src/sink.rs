use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use wattmon_common::snapshot::RoundDocument;

use crate::config::OutputMode;

/// The run's ordered document sequence and its on-disk form.
///
/// Documents always accumulate in memory; `Stream` mode additionally appends
/// each one to the run file as its round completes, `Batch` mode writes the
/// whole collection once at run end. A write failure is reported and the
/// document retained in memory regardless.
pub struct SnapshotLog {
    documents: Vec<RoundDocument>,
    mode: OutputMode,
    dir: PathBuf,
    started: DateTime<Utc>,
    stream_file: Option<fs::File>,
}

impl SnapshotLog {
    /// `started` is the run's start time; it is embedded in the output file
    /// name.
    pub fn new(dir: impl AsRef<Path>, mode: OutputMode, started: DateTime<Utc>) -> Self {
        Self {
            documents: Vec::new(),
            mode,
            dir: dir.as_ref().to_path_buf(),
            started,
            stream_file: None,
        }
    }

    /// Output path for this run, named after the start timestamp.
    pub fn path(&self) -> PathBuf {
        let extension = match self.mode {
            OutputMode::Batch => "json",
            OutputMode::Stream => "jsonl",
        };
        self.dir.join(format!(
            "{}_metrics.{extension}",
            self.started.format("%d%m%y-%H%M%S")
        ))
    }

    /// Appends one round's document.
    pub fn push(&mut self, document: RoundDocument) {
        if self.mode == OutputMode::Stream {
            if let Err(e) = self.append_line(&document) {
                tracing::error!(error = %e, "round append failed, document retained in memory");
            }
        }
        self.documents.push(document);
    }

    fn append_line(&mut self, document: &RoundDocument) -> anyhow::Result<()> {
        if self.stream_file.is_none() {
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.path())?;
            self.stream_file = Some(file);
        }
        let file = self
            .stream_file
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("stream file unavailable"))?;
        let line = serde_json::to_string(document)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    pub fn documents(&self) -> &[RoundDocument] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Finishes the run: batch mode writes the ordered collection now,
    /// stream mode has already written everything. Returns the output path
    /// if anything was written.
    pub fn finish(&mut self) -> anyhow::Result<Option<PathBuf>> {
        if self.documents.is_empty() {
            return Ok(None);
        }
        match self.mode {
            OutputMode::Stream => Ok(Some(self.path())),
            OutputMode::Batch => {
                let path = self.path();
                let json = serde_json::to_string_pretty(&self.documents)?;
                fs::write(&path, json)?;
                Ok(Some(path))
            }
        }
    }
}
