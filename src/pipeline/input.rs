//! Input resolution: normalise a user-supplied path or URL to a local file
//! and sniff whether it is a PDF or a raster image.
//!
//! pdfium needs a file-system path, so URL inputs are downloaded into a
//! `TempDir` that lives as long as the [`ResolvedInput`]. The format is
//! decided from magic bytes, never from the file extension: photographed
//! menus often arrive as `menu.pdf` that are really JPEGs, or without any
//! extension at all.

use crate::error::MenuError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// The kind of file a menu input turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    Png,
    Jpeg,
}

impl InputKind {
    /// Classify a file from its first bytes.
    pub fn sniff(magic: &[u8]) -> Option<Self> {
        if magic.starts_with(b"%PDF") {
            Some(InputKind::Pdf)
        } else if magic.starts_with(&[0x89, b'P', b'N', b'G']) {
            Some(InputKind::Png)
        } else if magic.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(InputKind::Jpeg)
        } else {
            None
        }
    }
}

/// A local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local { path: PathBuf, kind: InputKind },
    /// Input was a URL; the file lives in a temp directory kept alive here.
    Downloaded {
        path: PathBuf,
        kind: InputKind,
        _temp_dir: TempDir,
    },
}

impl ResolvedInput {
    /// Path to the local copy regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local { path, .. } | ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    pub fn kind(&self) -> InputKind {
        match self {
            ResolvedInput::Local { kind, .. } | ResolvedInput::Downloaded { kind, .. } => *kind,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local PDF or image file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, MenuError> {
    if input.trim().is_empty() {
        return Err(MenuError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

fn classify(path: PathBuf, bytes: &[u8]) -> Result<(PathBuf, InputKind), MenuError> {
    match InputKind::sniff(bytes) {
        Some(kind) => Ok((path, kind)),
        None => {
            let mut magic = [0u8; 4];
            let n = bytes.len().min(4);
            magic[..n].copy_from_slice(&bytes[..n]);
            Err(MenuError::UnsupportedFormat { path, magic })
        }
    }
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, MenuError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(MenuError::FileNotFound { path });
    }

    let mut magic = Vec::with_capacity(4);
    match std::fs::File::open(&path) {
        Ok(f) => {
            f.take(4)
                .read_to_end(&mut magic)
                .map_err(|e| MenuError::Internal(format!("Failed to read '{}': {e}", path.display())))?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(MenuError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(MenuError::FileNotFound { path });
        }
    }

    let (path, kind) = classify(path, &magic)?;
    debug!("Resolved local {:?}: {}", kind, path.display());
    Ok(ResolvedInput::Local { path, kind })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, MenuError> {
    info!("Downloading menu from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| MenuError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            MenuError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            MenuError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(MenuError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = filename_from_url(url);
    let temp_dir = TempDir::new().map_err(|e| MenuError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| MenuError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let (path, kind) = classify(file_path, &bytes)?;

    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| MenuError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {:?} to: {}", kind, path.display());

    Ok(ResolvedInput::Downloaded {
        path,
        kind,
        _temp_dir: temp_dir,
    })
}

/// Last non-empty path segment of a URL, or a generic name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }

    "menu.download".to_string()
}

/// Human-readable label for an input, used in page reports.
pub fn source_label(input: &str) -> String {
    if is_url(input) {
        return input.to_string();
    }
    Path::new(input)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.to_string())
}
