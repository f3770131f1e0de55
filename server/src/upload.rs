//! Upload persistence
//!
//! Uploaded images take a round trip through disk before inference. Client
//! filenames are sanitized and prefixed with a UUID; the file is removed again
//! by [`SavedUpload::remove`] (or, failing that, when the guard drops) unless
//! uploads are configured to stay.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

/// Name used when nothing survives sanitization
const FALLBACK_NAME: &str = "upload";

const WINDOWS_DEVICE_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Reduce a client-supplied filename to a safe single path component
///
/// Non-ASCII characters are dropped, path separators become word breaks,
/// whitespace runs become `_`, anything outside `[A-Za-z0-9_.-]` is removed and
/// leading/trailing dots and underscores are trimmed. May return an empty
/// string.
pub fn secure_filename(name: &str) -> String {
    let ascii: String = name
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    let trimmed = kept.trim_matches(|c| c == '.' || c == '_');

    let stem = trimmed.split('.').next().unwrap_or_default().to_ascii_uppercase();
    if !trimmed.is_empty() && WINDOWS_DEVICE_NAMES.contains(&stem.as_str()) {
        format!("_{}", trimmed)
    } else {
        trimmed.to_string()
    }
}

/// On-disk name for an upload: unique prefix plus the sanitized client name
pub fn stored_name(original: Option<&str>) -> String {
    let safe = original.map(secure_filename).unwrap_or_default();
    let safe = if safe.is_empty() { FALLBACK_NAME.to_string() } else { safe };
    format!("{}_{}", Uuid::new_v4().simple(), safe)
}

/// An uploaded file written to the upload directory
#[derive(Debug)]
pub struct SavedUpload {
    path: PathBuf,
    keep: bool,
    removed: bool,
}

impl SavedUpload {
    /// Write `bytes` into `dir` under a sanitized, collision-free name
    pub async fn write(
        dir: &Path,
        original_name: Option<&str>,
        bytes: &[u8],
        keep: bool,
    ) -> io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(stored_name(original_name));
        tokio::fs::write(&path, bytes).await?;
        debug!("Saved upload ({} bytes) to {:?}", bytes.len(), path);
        Ok(Self {
            path,
            keep,
            removed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file unless uploads are kept
    ///
    /// Uses blocking filesystem calls; run it inside `spawn_blocking`.
    pub fn remove(mut self) {
        self.remove_file();
    }

    fn remove_file(&mut self) {
        if self.keep || self.removed {
            return;
        }
        self.removed = true;
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed upload {:?}", self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove upload {:?}: {}", self.path, e),
        }
    }
}

// Requests cancelled before `remove` still clean up.
impl Drop for SavedUpload {
    fn drop(&mut self) {
        self.remove_file();
    }
}
