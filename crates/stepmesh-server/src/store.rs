//! Scratch artifact storage.
//!
//! Every file the service writes lives directly under one scratch root and
//! is owned by an [`ArtifactGuard`]: dropping the guard deletes the file.
//! Deferred outputs are the only files left without a guard; the
//! filesystem itself is their registry until a download claims them or the
//! reaper expires them.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use stepmesh_kernel::MeshFormat;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::StorageConfig;

/// Prefix of files renamed by a winning download.
const CLAIM_PREFIX: &str = ".claim-";

/// Fallback stem when nothing of the uploaded name survives sanitizing.
const DEFAULT_STEM: &str = "model";

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact not found")]
    NotFound,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Scratch locations for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Where the upload is persisted.
    pub input: PathBuf,
    /// Where the kernel writes the mesh.
    pub output: PathBuf,
    /// File name of `output`, also the name clients download it under.
    pub download_name: String,
}

/// Owns a scratch file and deletes it when dropped.
#[derive(Debug)]
pub struct ArtifactGuard {
    path: Option<PathBuf>,
}

impl ArtifactGuard {
    /// Take ownership of `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// The guarded file.
    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Give up ownership without deleting the file.
    pub fn disarm(mut self) -> PathBuf {
        self.path.take().unwrap_or_default()
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            delete_file(&path);
        }
    }
}

/// Remove a file, ignoring a missing one and logging anything else.
pub fn delete_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed scratch file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove scratch file"),
    }
}

/// Reduce an uploaded filename to a safe base name.
///
/// Directory components (either separator) are dropped. In the stem and
/// the extension, ASCII alphanumerics, `.`, `-` and `_` are kept, runs of
/// whitespace become `_` and everything else is removed. Leading dots and
/// underscores are trimmed. An empty stem becomes `model`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let (stem, ext) = match base.rsplit_once('.') {
        Some((stem, ext)) => (stem, sanitize_component(ext)),
        None => (base, String::new()),
    };

    let mut stem = sanitize_component(stem);
    if stem.is_empty() {
        stem = DEFAULT_STEM.to_string();
    }
    if ext.is_empty() {
        stem
    } else {
        format!("{stem}.{ext}")
    }
}

fn sanitize_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            out.push(c);
        }
    }
    out.trim_start_matches(['.', '_']).to_string()
}

/// Stem of a sanitized name.
fn stem_of(sanitized: &str) -> &str {
    match sanitized.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => sanitized,
    }
}

/// Whether `name` has the shape of a generated download name.
fn is_download_name(name: &str) -> bool {
    let Some((id, rest)) = name.split_once('_') else {
        return false;
    };
    if id.len() != 36 || Uuid::parse_str(id).is_err() {
        return false;
    }
    let Some((stem, ext)) = rest.rsplit_once('.') else {
        return false;
    };
    MeshFormat::from_extension(ext).is_some_and(|f| f.extension() == ext)
        && !stem.is_empty()
        && !stem.starts_with('.')
        && stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
}

/// Whether `name` is a file this store created: an upload or mesh named
/// `{uuid}_...`, or a claimed download named `.claim-{uuid}-...`.
fn is_artifact_name(name: &str) -> bool {
    let (rest, separator) = match name.strip_prefix(CLAIM_PREFIX) {
        Some(rest) => (rest, b'-'),
        None => (name, b'_'),
    };
    rest.get(..36).is_some_and(|id| Uuid::parse_str(id).is_ok())
        && rest.as_bytes().get(36) == Some(&separator)
}

/// The scratch directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open (creating if needed) the scratch directory at `root`.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Open the scratch directory named by the storage config.
    pub fn from_config(config: &StorageConfig) -> io::Result<Self> {
        Self::open(&config.scratch_dir)
    }

    /// The scratch root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scratch paths for a request. Distinct request ids never collide.
    pub fn allocate_paths(
        &self,
        request_id: Uuid,
        original_name: &str,
        format: MeshFormat,
    ) -> ArtifactPaths {
        let sanitized = sanitize_filename(original_name);
        let download_name = format!(
            "{request_id}_{}.{}",
            stem_of(&sanitized),
            format.extension()
        );
        ArtifactPaths {
            input: self.root.join(format!("{request_id}_{sanitized}")),
            output: self.root.join(&download_name),
            download_name,
        }
    }

    /// Write `bytes` to `path` and guard the result.
    ///
    /// A partially written file is removed before the error is returned.
    pub async fn persist(&self, bytes: &[u8], path: &Path) -> io::Result<ArtifactGuard> {
        let guard = ArtifactGuard::new(path);
        tokio::fs::write(path, bytes).await?;
        Ok(guard)
    }

    /// Best-effort delete.
    pub fn delete(&self, path: &Path) {
        delete_file(path);
    }

    /// Whether `path` exists.
    pub fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    /// Guard an existing file.
    pub fn guard(&self, path: impl Into<PathBuf>) -> ArtifactGuard {
        ArtifactGuard::new(path)
    }

    /// Path of a pending download, if `name` is a generated output name.
    ///
    /// Anything else (separators, traversal, foreign files) yields `None`,
    /// so the result always lies directly inside the scratch root.
    pub fn resolve_download(&self, name: &str) -> Option<PathBuf> {
        is_download_name(name).then(|| self.root.join(name))
    }

    /// Take exclusive ownership of a pending download.
    ///
    /// The file is renamed to a private name, so of several concurrent
    /// claims exactly one succeeds.
    pub async fn claim(&self, name: &str) -> Result<ArtifactGuard, StoreError> {
        let path = self.resolve_download(name).ok_or(StoreError::NotFound)?;
        let claimed = self
            .root
            .join(format!("{CLAIM_PREFIX}{}-{name}", Uuid::new_v4()));
        match tokio::fs::rename(&path, &claimed).await {
            Ok(()) => Ok(ArtifactGuard::new(claimed)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    /// Remove store-created files last modified more than `max_age` ago.
    /// Anything else in the scratch root is left alone. Returns how many
    /// were removed.
    pub async fn sweep_expired(&self, max_age: Duration) -> io::Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_name().to_str().is_some_and(is_artifact_name) {
                continue;
            }
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let age = meta
                .modified()
                .ok()
                .and_then(|m| now.duration_since(m).ok())
                .unwrap_or_default();
            if age >= max_age {
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => {
                        warn!(path = %entry.path().display(), error = %e, "Failed to expire scratch file")
                    }
                }
            }
        }
        Ok(removed)
    }
}
