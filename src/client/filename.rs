//! Image file naming and placement.
//!
//! Files are named `<concept>_<n>.<ext>`. The number is claimed with an
//! exclusive create, so two fetches writing into the same directory can never
//! overwrite each other, and an incomplete file is removed unless it is
//! explicitly kept.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tracing::debug;

use crate::task::ImageFormat;

/// Upper bound on numbering attempts before giving up on a directory.
const MAX_NAME_ATTEMPTS: u32 = 1_000_000;

/// Maps an image `Content-Type` to a file extension; `None` for non-images.
pub(crate) fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/bmp" => Some("bmp"),
        "image/tiff" => Some("tiff"),
        "image/svg+xml" => Some("svg"),
        _ => None,
    }
}

/// Returns true when an image with `extension` satisfies the requested format.
pub(crate) fn extension_matches_format(extension: &str, format: ImageFormat) -> bool {
    match format {
        ImageFormat::Any => true,
        other => other.as_str() == extension,
    }
}

/// Reduces a concept name to a filesystem-safe file stem.
pub(crate) fn sanitize_filename_component(value: &str) -> String {
    let mut out = String::new();
    let mut prev_sep = false;
    for ch in value.chars() {
        let mapped = match ch {
            c if c.is_alphanumeric() || matches!(c, '-' | '.') => c,
            _ => '_',
        };
        if mapped == '_' {
            if !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else {
            out.push(mapped);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches(|c| c == '_' || c == '.');
    if trimmed.is_empty() {
        "image".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Hands out collision-free numbered files in one directory.
#[derive(Debug)]
pub(crate) struct UniqueFileAllocator {
    dir: PathBuf,
    stem: String,
    next: u32,
}

impl UniqueFileAllocator {
    /// Creates an allocator for `<dir>/<stem>_<n>.<ext>` files.
    pub(crate) fn new(dir: &Path, stem: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            stem: sanitize_filename_component(stem),
            next: 1,
        }
    }

    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the next free file, skipping numbers already taken on disk.
    pub(crate) async fn create(&mut self, extension: &str) -> io::Result<(PathBuf, File)> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = self
                .dir
                .join(format!("{}_{}.{extension}", self.stem, self.next));
            self.next = self.next.saturating_add(1);

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((path, file)),
                Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {}
                Err(error) => return Err(error),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free file name for '{}' in {}", self.stem, self.dir.display()),
        ))
    }
}

/// Removes the file on drop unless [`PartialFile::keep`] was called.
///
/// Covers errors mid-stream as well as the fetch future being dropped on
/// timeout, so an unfinished image is never left behind.
#[derive(Debug)]
pub(crate) struct PartialFile {
    path: Option<PathBuf>,
}

impl PartialFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    /// Marks the file complete and returns its path.
    pub(crate) fn keep(mut self) -> PathBuf {
        self.path.take().unwrap_or_default()
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            debug!(path = %path.display(), "removing incomplete image");
            let _ = std::fs::remove_file(&path);
        }
    }
}
