//! Export and restore of the vector index directory
//!
//! A snapshot is a zip of the index directory. Export writes it to the
//! configured archive path (optionally also split into fixed-size parts for
//! hosts with upload limits); an upload replaces that archive; restore wipes
//! the index directory and extracts the archive into it.

use serde::Serialize;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use crate::config::SnapshotConfig;
use crate::error::{Error, Result};
use crate::retrieval::INDEX_FILE;

/// Result of an export or upload
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotInfo {
    pub archive: PathBuf,
    pub bytes: u64,
    /// Files inside the archive
    pub files: usize,
    /// Split parts, in order; empty when the archive fits in one part
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<PathBuf>,
}

/// Manages the snapshot archive on disk
#[derive(Debug, Clone)]
pub struct SnapshotManager {
    archive_path: PathBuf,
    part_size: u64,
}

impl SnapshotManager {
    pub fn new(config: &SnapshotConfig) -> Self {
        Self {
            archive_path: config.archive_path.clone(),
            part_size: config.part_size,
        }
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Whether an archive is available for download or restore
    pub fn has_archive(&self) -> bool {
        self.archive_path.is_file()
    }

    fn archive_dir(&self) -> Result<PathBuf> {
        let dir = self
            .archive_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Zip `index_dir` into the archive path, then split if it is larger
    /// than the part size
    pub fn export(&self, index_dir: &Path) -> Result<SnapshotInfo> {
        if !index_dir.is_dir() {
            return Err(Error::Snapshot(format!(
                "index directory {} does not exist",
                index_dir.display()
            )));
        }

        let mut tmp = tempfile::NamedTempFile::new_in(self.archive_dir()?)?;
        let files = {
            let mut writer = zip::ZipWriter::new(tmp.as_file_mut());
            let options = zip::write::SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated);

            let mut files = 0usize;
            for entry in walkdir::WalkDir::new(index_dir).sort_by_file_name() {
                let entry = entry.map_err(std::io::Error::from)?;
                let relative = match entry.path().strip_prefix(index_dir) {
                    Ok(relative) if !relative.as_os_str().is_empty() => relative,
                    _ => continue,
                };
                let name = archive_name(relative);

                if entry.file_type().is_dir() {
                    writer.add_directory(name, options)?;
                } else if entry.file_type().is_file() {
                    writer.start_file(name, options)?;
                    let mut source = File::open(entry.path())?;
                    std::io::copy(&mut source, &mut writer)?;
                    files += 1;
                }
            }
            writer.finish()?;
            files
        };

        tmp.persist(&self.archive_path)
            .map_err(|e| Error::Io(e.error))?;
        let bytes = std::fs::metadata(&self.archive_path)?.len();
        let parts = self.split_parts(bytes)?;

        tracing::info!(
            archive = %self.archive_path.display(),
            bytes,
            files,
            parts = parts.len(),
            "Exported index snapshot"
        );
        Ok(SnapshotInfo {
            archive: self.archive_path.clone(),
            bytes,
            files,
            parts,
        })
    }

    fn part_path(&self, number: usize) -> PathBuf {
        let stem = self
            .archive_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "snapshot".to_string());
        self.archive_path
            .with_file_name(format!("{}_part{}.zip", stem, number))
    }

    /// Remove parts of a previous export, then write new ones if needed
    fn split_parts(&self, bytes: u64) -> Result<Vec<PathBuf>> {
        let mut number = 1;
        loop {
            let stale = self.part_path(number);
            if !stale.exists() {
                break;
            }
            std::fs::remove_file(&stale)?;
            number += 1;
        }

        if self.part_size == 0 || bytes <= self.part_size {
            return Ok(Vec::new());
        }

        let mut source = File::open(&self.archive_path)?;
        let mut parts = Vec::new();
        let mut remaining = bytes;

        while remaining > 0 {
            let path = self.part_path(parts.len() + 1);
            let mut part = File::create(&path)?;
            let mut limited = (&mut source).take(self.part_size);
            let written = std::io::copy(&mut limited, &mut part)?;
            if written == 0 {
                break;
            }
            remaining = remaining.saturating_sub(written);
            parts.push(path);
        }
        Ok(parts)
    }

    /// Validate an uploaded archive and make it the staged snapshot
    pub fn stage_upload(&self, data: &[u8]) -> Result<SnapshotInfo> {
        let files = validate_archive(Cursor::new(data))?;

        let mut tmp = tempfile::NamedTempFile::new_in(self.archive_dir()?)?;
        std::io::Write::write_all(&mut tmp, data)?;
        tmp.persist(&self.archive_path)
            .map_err(|e| Error::Io(e.error))?;

        tracing::info!(archive = %self.archive_path.display(), bytes = data.len(), "Staged uploaded snapshot");
        Ok(SnapshotInfo {
            archive: self.archive_path.clone(),
            bytes: data.len() as u64,
            files,
            parts: Vec::new(),
        })
    }

    /// Replace the contents of `index_dir` with the staged archive.
    ///
    /// The archive is validated before anything is deleted. Entries that
    /// would escape `index_dir` are skipped.
    pub fn restore_into(&self, index_dir: &Path) -> Result<usize> {
        let file = File::open(&self.archive_path).map_err(|e| {
            Error::Snapshot(format!(
                "no snapshot archive at {}: {}",
                self.archive_path.display(),
                e
            ))
        })?;
        validate_archive(&file)?;

        let mut archive = zip::ZipArchive::new(File::open(&self.archive_path)?)?;

        if index_dir.exists() {
            std::fs::remove_dir_all(index_dir)?;
        }
        std::fs::create_dir_all(index_dir)?;

        let mut restored = 0usize;
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let Some(relative) = entry.enclosed_name() else {
                tracing::warn!(name = entry.name(), "Skipping archive entry outside the index directory");
                continue;
            };
            let target = index_dir.join(relative);

            if entry.is_dir() {
                std::fs::create_dir_all(&target)?;
                continue;
            }
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target)?;
            std::io::copy(&mut entry, &mut out)?;
            restored += 1;
        }

        tracing::info!(
            archive = %self.archive_path.display(),
            index = %index_dir.display(),
            files = restored,
            "Restored index snapshot"
        );
        Ok(restored)
    }
}

/// Zip entry name for a relative path, always `/`-separated
fn archive_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// A snapshot must be a readable zip with the index database at its root
fn validate_archive<R: Read + Seek>(reader: R) -> Result<usize> {
    let archive = zip::ZipArchive::new(reader)
        .map_err(|e| Error::Snapshot(format!("not a valid zip archive: {}", e)))?;

    if !archive.file_names().any(|name| name == INDEX_FILE) {
        return Err(Error::Snapshot(format!(
            "archive does not contain {}",
            INDEX_FILE
        )));
    }
    Ok(archive.file_names().filter(|name| !name.ends_with('/')).count())
}
