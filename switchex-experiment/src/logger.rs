use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{debug, info};

use switchex_core::{Condition, TrialRecord};

/// Persistence failures are fatal to the session: a trial stream with gaps
/// would violate the exactly-once logging invariant, so there is no retry.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to create session log at {path}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write session manifest at {path}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to append trial record to session log")]
    Append(#[source] std::io::Error),
    #[error("session log is not open")]
    NotOpen,
}

#[derive(Serialize)]
struct SessionManifest<'a> {
    started: &'a str,
    schedule: &'a [Condition],
}

/// Append-only CSV results log, one file per session.
///
/// The filename carries the session start timestamp and the file is opened
/// with `create_new`, so a prior session's results can never be clobbered.
#[derive(Debug)]
pub struct SessionLog {
    path: PathBuf,
    file: File,
}

impl SessionLog {
    /// Create the session-data directory on demand, the CSV log with its
    /// header row, and a JSON manifest of the counterbalanced schedule.
    pub fn create(dir: &Path, schedule: &[Condition]) -> Result<Self, SessionError> {
        let stamp = timestamp_slug();
        let path = dir.join(format!("results_{stamp}.csv"));
        let io_err = |source| SessionError::Create {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(dir).map_err(io_err)?;
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(io_err)?;
        writeln!(file, "{}", TrialRecord::CSV_HEADER).map_err(io_err)?;
        file.flush().map_err(io_err)?;

        write_manifest(dir, &stamp, schedule)?;

        info!(path = %path.display(), "session log created");
        Ok(Self { path, file })
    }

    /// Durably append one trial record. Exactly one row per submission.
    pub fn append(&mut self, record: &TrialRecord) -> Result<(), SessionError> {
        writeln!(self.file, "{}", record.csv_row()).map_err(SessionError::Append)?;
        self.file.flush().map_err(SessionError::Append)?;
        debug!(trial = record.trial, correct = record.correct, "trial appended");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_manifest(dir: &Path, stamp: &str, schedule: &[Condition]) -> Result<(), SessionError> {
    let path = dir.join(format!("results_{stamp}.meta.json"));
    let manifest = SessionManifest {
        started: stamp,
        schedule,
    };
    let file = File::create(&path).map_err(|source| SessionError::Create {
        path: path.clone(),
        source,
    })?;
    serde_json::to_writer_pretty(file, &manifest)
        .map_err(|source| SessionError::Manifest { path, source })
}

fn timestamp_slug() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&format_description!(
        "[year][month][day]_[hour][minute][second]"
    ))
    .unwrap_or_else(|_| "session".into())
}
