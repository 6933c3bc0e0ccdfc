//! Filesystem-backed candidate artifact store.
//!
//! A root directory with an inbox folder (artifacts awaiting
//! attribution) and a processed folder (artifacts already loaded).
//! Lookup is by exact file name: zero matches and multiple matches are
//! both fatal, with the conflicting paths in the error.

use crate::config::StoreConfig;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use traffic::CandidateIp;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no artifacts in {}", .folder.display())]
    EmptyFolder { folder: PathBuf },
    #[error("no artifact named {name} in {}", .folder.display())]
    NotFound { folder: PathBuf, name: String },
    #[error("multiple artifacts named {name}: {matches:?}")]
    Multiple { name: String, matches: Vec<PathBuf> },
    #[error("unparsable endpoint address {address:?} in {}", .path.display())]
    BadAddress { path: PathBuf, address: String },
    #[error("artifact store I/O error")]
    Io(#[from] std::io::Error),
}

pub struct ArtifactStore {
    inbox: PathBuf,
    processed: PathBuf,
}

impl ArtifactStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            inbox: config.root.join(&config.inbox),
            processed: config.root.join(&config.processed),
        }
    }

    /// Write one candidate artifact into the inbox, one endpoint
    /// address per line, ranked order preserved. An empty candidate
    /// list still produces an (empty) artifact.
    pub fn write_candidates(
        &self,
        name: &str,
        candidates: &[CandidateIp],
    ) -> Result<PathBuf, StoreError> {
        std::fs::create_dir_all(&self.inbox)?;
        let path = self.inbox.join(name);
        let mut body = String::new();
        for candidate in candidates {
            body.push_str(&candidate.ip.to_string());
            body.push('\n');
        }
        std::fs::write(&path, body)?;
        Ok(path)
    }

    /// Find exactly one inbox artifact with the given file name.
    pub fn find_artifact(&self, name: &str) -> Result<PathBuf, StoreError> {
        let mut entries = Vec::new();
        for entry in walkdir::WalkDir::new(&self.inbox).min_depth(1) {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() {
                entries.push(entry.into_path());
            }
        }
        if entries.is_empty() {
            return Err(StoreError::EmptyFolder {
                folder: self.inbox.clone(),
            });
        }

        let matches: Vec<PathBuf> = entries
            .into_iter()
            .filter(|path| path.file_name().map_or(false, |base| base == name))
            .collect();
        if matches.len() > 1 {
            return Err(StoreError::Multiple {
                name: name.to_owned(),
                matches,
            });
        }
        matches.into_iter().next().ok_or_else(|| StoreError::NotFound {
            folder: self.inbox.clone(),
            name: name.to_owned(),
        })
    }

    /// Read the endpoint list out of an artifact. Blank lines are
    /// skipped; anything else must parse as an IP address.
    pub fn read_ips(&self, path: &Path) -> Result<Vec<IpAddr>, StoreError> {
        let body = std::fs::read_to_string(path)?;
        body.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                line.parse().map_err(|_| StoreError::BadAddress {
                    path: path.to_owned(),
                    address: line.to_owned(),
                })
            })
            .collect()
    }

    /// Move a loaded artifact from the inbox to the processed folder.
    /// Falls back to copy-and-remove when rename fails (e.g. across
    /// filesystems).
    pub fn move_to_processed(&self, path: &Path) -> Result<PathBuf, StoreError> {
        std::fs::create_dir_all(&self.processed)?;
        let file_name = path
            .file_name()
            .ok_or_else(|| StoreError::NotFound {
                folder: self.inbox.clone(),
                name: path.display().to_string(),
            })?;
        let destination = self.processed.join(file_name);
        if std::fs::rename(path, &destination).is_err() {
            std::fs::copy(path, &destination)?;
            std::fs::remove_file(path)?;
        }
        Ok(destination)
    }
}
