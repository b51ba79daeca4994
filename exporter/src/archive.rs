//! Archive creation for staged trees.
//!
//! The archiver streams a staged directory into a single zip or tar-family
//! file. Entry names are relative to the staged root and use `/`
//! separators, file contents are streamed from disk one entry at a time,
//! and timestamps and ownership are normalized so identical trees produce
//! identical archives.
//!
//! Output goes to a temporary file beside the destination and is renamed
//! into place only once the container has been finalized and synced, so a
//! failed run never leaves a complete-looking archive behind.

use crate::error::{ExportError, Result};
use crate::workspace::normalize_path;
use camino::{Utf8Path, Utf8PathBuf};
use flate2::Compression;
use flate2::write::GzEncoder;
use log::{debug, trace};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, ErrorKind, Read, Seek, Write};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Container format for the exported archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveFormat {
    /// Deflate-compressed zip.
    #[default]
    Zip,
    /// Uncompressed tar.
    Tar,
    /// Gzip-compressed tar.
    TarGz,
    /// Zstandard-compressed tar.
    TarZst,
}

impl ArchiveFormat {
    /// File extension, without the leading dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Tar => "tar",
            Self::TarGz => "tar.gz",
            Self::TarZst => "tar.zst",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Errors arising while writing an archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Reading the staged tree or writing the archive failed.
    #[error("archive I/O error: {0}")]
    Io(#[from] io::Error),

    /// The zip writer rejected an entry or failed to finalize.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The destination would be written inside the tree being archived.
    #[error("archive destination {0} lies inside the staged tree")]
    DestinationInsideTree(Utf8PathBuf),

    /// The background writer panicked before reporting a result.
    #[error("archive worker panicked")]
    WorkerPanicked,
}

/// Archive settings selected once per run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveOptions {
    /// Container format.
    pub format: ArchiveFormat,
    /// Emit explicit entries for empty directories. Directories that contain
    /// anything are always implied by their children's paths.
    pub include_empty_dirs: bool,
}

/// Description of a finished archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    /// Final archive path.
    pub path: Utf8PathBuf,
    /// Container format used.
    pub format: ArchiveFormat,
    /// Number of file and symlink entries.
    pub file_entries: usize,
    /// Number of empty-directory entries.
    pub dir_entries: usize,
    /// Lowercase hex SHA-256 of the archive file.
    pub sha256: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Symlink,
    EmptyDir,
}

#[derive(Debug, Clone)]
struct ArchiveEntry {
    source: Utf8PathBuf,
    name: String,
    kind: EntryKind,
}

/// Writes staged trees into archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct Archiver {
    options: ArchiveOptions,
}

impl Archiver {
    /// Create an archiver with the given options.
    #[must_use]
    pub const fn new(options: ArchiveOptions) -> Self {
        Self { options }
    }

    /// The options this archiver was created with.
    #[must_use]
    pub const fn options(&self) -> ArchiveOptions {
        self.options
    }

    /// Archive path for a staged root: `<root>.<extension>`.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8Path;
    /// use module_exporter::archive::{ArchiveFormat, ArchiveOptions, Archiver};
    ///
    /// let archiver = Archiver::new(ArchiveOptions {
    ///     format: ArchiveFormat::TarGz,
    ///     include_empty_dirs: false,
    /// });
    /// let path = archiver.archive_path_for(Utf8Path::new("/out/Clock"));
    /// assert_eq!(path, "/out/Clock.tar.gz");
    /// ```
    #[must_use]
    pub fn archive_path_for(&self, staged_root: &Utf8Path) -> Utf8PathBuf {
        Utf8PathBuf::from(format!(
            "{}.{}",
            staged_root.as_str().trim_end_matches(['/', '\\']),
            self.options.format.extension()
        ))
    }

    /// Write `staged_root` into `archive_path` on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::ArchiveWrite`] on any failure; no file is left
    /// at `archive_path` in that case.
    pub fn write(&self, staged_root: &Utf8Path, archive_path: &Utf8Path) -> Result<ArchiveSummary> {
        write_archive(self.options, staged_root, archive_path).map_err(|source| {
            ExportError::ArchiveWrite {
                path: archive_path.to_owned(),
                source,
            }
        })
    }

    /// Start writing `staged_root` into `archive_path` on a worker thread.
    ///
    /// The returned [`ArchiveJob`] must be waited on before the archive is
    /// used.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::ArchiveWrite`] if the worker cannot be spawned.
    pub fn spawn(&self, staged_root: Utf8PathBuf, archive_path: Utf8PathBuf) -> Result<ArchiveJob> {
        let archiver = *self;
        let worker_path = archive_path.clone();
        let handle = thread::Builder::new()
            .name("archive-writer".to_owned())
            .spawn(move || archiver.write(&staged_root, &worker_path))
            .map_err(|e| ExportError::ArchiveWrite {
                path: archive_path.clone(),
                source: ArchiveError::Io(e),
            })?;
        Ok(ArchiveJob {
            handle,
            path: archive_path,
        })
    }
}

/// Handle to an archive being written in the background.
#[derive(Debug)]
pub struct ArchiveJob {
    handle: JoinHandle<Result<ArchiveSummary>>,
    path: Utf8PathBuf,
}

impl ArchiveJob {
    /// Destination of the archive.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Block until the archive is finished or has failed.
    ///
    /// # Errors
    ///
    /// Returns the worker's [`ExportError::ArchiveWrite`], or one wrapping
    /// [`ArchiveError::WorkerPanicked`] if the worker died.
    pub fn wait(self) -> Result<ArchiveSummary> {
        match self.handle.join() {
            Ok(result) => result,
            Err(_) => Err(ExportError::ArchiveWrite {
                path: self.path,
                source: ArchiveError::WorkerPanicked,
            }),
        }
    }
}

fn write_archive(
    options: ArchiveOptions,
    staged_root: &Utf8Path,
    archive_path: &Utf8Path,
) -> std::result::Result<ArchiveSummary, ArchiveError> {
    if normalize_path(archive_path).starts_with(normalize_path(staged_root)) {
        return Err(ArchiveError::DestinationInsideTree(archive_path.to_owned()));
    }
    remove_stale(archive_path)?;

    let entries = collect_entries(staged_root, options.include_empty_dirs)?;
    let parent = match archive_path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let partial = tempfile::Builder::new()
        .prefix(".export-")
        .suffix(".partial")
        .tempfile_in(parent)?;
    let file = partial.as_file().try_clone()?;

    let file = match options.format {
        ArchiveFormat::Zip => write_zip(file, &entries)?,
        ArchiveFormat::Tar => {
            let writer = write_tar(BufWriter::new(file), &entries)?;
            into_file(writer)?
        }
        ArchiveFormat::TarGz => {
            let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
            into_file(write_tar(encoder, &entries)?.finish()?)?
        }
        ArchiveFormat::TarZst => {
            let encoder = zstd::Encoder::new(BufWriter::new(file), 0)?;
            into_file(write_tar(encoder, &entries)?.finish()?)?
        }
    };
    file.sync_all()?;
    drop(file);

    let sha256 = sha256_hex(partial.path())?;
    partial.persist(archive_path).map_err(|e| e.error)?;

    let file_entries = entries
        .iter()
        .filter(|entry| entry.kind != EntryKind::EmptyDir)
        .count();
    let summary = ArchiveSummary {
        path: archive_path.to_owned(),
        format: options.format,
        file_entries,
        dir_entries: entries.len() - file_entries,
        sha256,
    };
    debug!(
        "wrote {} with {} file entries and {} directory entries",
        summary.path, summary.file_entries, summary.dir_entries
    );
    Ok(summary)
}

fn remove_stale(archive_path: &Utf8Path) -> io::Result<()> {
    match fs::remove_file(archive_path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn into_file(writer: BufWriter<File>) -> io::Result<File> {
    writer.into_inner().map_err(io::IntoInnerError::into_error)
}

/// Walk `root` and list archive entries in sorted order.
fn collect_entries(
    root: &Utf8Path,
    include_empty_dirs: bool,
) -> std::result::Result<Vec<ArchiveEntry>, ArchiveError> {
    let mut entries = Vec::new();
    let mut components = Vec::new();
    walk(root, &mut components, include_empty_dirs, &mut entries)?;
    Ok(entries)
}

fn walk(
    dir: &Utf8Path,
    components: &mut Vec<String>,
    include_empty_dirs: bool,
    entries: &mut Vec<ArchiveEntry>,
) -> io::Result<()> {
    let mut children = dir
        .read_dir_utf8()?
        .map(|entry| entry.map(camino::Utf8DirEntry::into_path))
        .collect::<io::Result<Vec<_>>>()?;
    children.sort();

    for child in children {
        let name = child.file_name().unwrap_or_default().to_owned();
        components.push(name);
        let file_type = fs::symlink_metadata(&child)?.file_type();
        if file_type.is_dir() {
            let is_empty = child.read_dir_utf8()?.next().is_none();
            if is_empty && include_empty_dirs {
                entries.push(ArchiveEntry {
                    source: child.clone(),
                    name: components.join("/"),
                    kind: EntryKind::EmptyDir,
                });
            }
            walk(&child, components, include_empty_dirs, entries)?;
        } else {
            let kind = if file_type.is_symlink() {
                EntryKind::Symlink
            } else {
                EntryKind::File
            };
            entries.push(ArchiveEntry {
                source: child,
                name: components.join("/"),
                kind,
            });
        }
        components.pop();
    }
    Ok(())
}

fn write_tar<W: Write>(writer: W, entries: &[ArchiveEntry]) -> io::Result<W> {
    let mut builder = tar::Builder::new(writer);
    builder.mode(tar::HeaderMode::Deterministic);
    builder.follow_symlinks(false);
    for entry in entries {
        trace!("adding {} to tar archive", entry.name);
        builder.append_path_with_name(&entry.source, &entry.name)?;
    }
    builder.into_inner()
}

fn write_zip<W: Write + Seek>(writer: W, entries: &[ArchiveEntry]) -> zip::result::ZipResult<W> {
    let mut zip = ZipWriter::new(writer);

    for entry in entries {
        trace!("adding {} to zip archive", entry.name);
        match entry.kind {
            EntryKind::EmptyDir => {
                zip.add_directory(entry.name.as_str(), zip_options().unix_permissions(0o755))?;
            }
            EntryKind::Symlink => {
                let target = entry.source.read_link_utf8()?;
                zip.add_symlink(entry.name.as_str(), target.as_str(), zip_options())?;
            }
            EntryKind::File => {
                let mut source = File::open(&entry.source)?;
                let metadata = source.metadata()?;
                let options = zip_options()
                    .unix_permissions(file_mode(&metadata))
                    .large_file(metadata.len() >= u64::from(u32::MAX));
                zip.start_file(entry.name.as_str(), options)?;
                io::copy(&mut source, &mut zip)?;
            }
        }
    }
    zip.finish()
}

/// Deflated entries with a fixed timestamp.
fn zip_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    if metadata.permissions().mode() & 0o111 == 0 {
        0o644
    } else {
        0o755
    }
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> u32 {
    0o644
}

/// Compute the lowercase hex SHA-256 digest of a file.
fn sha256_hex(path: &std::path::Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
#[path = "archive_tests.rs"]
mod tests;
