//! Working-directory resolution
//!
//! Mapping an agent's virtual path onto the host filesystem belongs to the
//! caller's sandbox policy. [`WorkspaceResolver`] is that seam;
//! [`JailedWorkspace`] is the default implementation used by the binary.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Resolves a virtual working directory to a host path.
pub trait WorkspaceResolver: Send + Sync {
    /// Resolve `virtual_path` (or the default directory when `None`).
    fn resolve(&self, virtual_path: Option<&str>) -> Result<PathBuf>;
}

/// Resolver that keeps every directory under an optional root.
#[derive(Debug, Clone, Default)]
pub struct JailedWorkspace {
    root: Option<PathBuf>,
}

impl JailedWorkspace {
    /// Jail directories under `root`; `None` disables the jail.
    #[must_use]
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    fn base(&self) -> Result<PathBuf> {
        match &self.root {
            Some(root) => Ok(root.clone()),
            None => std::env::current_dir()
                .map_err(|_| Error::InvalidWorkingDirectory(PathBuf::from("."))),
        }
    }
}

impl WorkspaceResolver for JailedWorkspace {
    fn resolve(&self, virtual_path: Option<&str>) -> Result<PathBuf> {
        let base = self.base()?;
        let Some(raw) = virtual_path.filter(|p| !p.trim().is_empty()) else {
            return Ok(base);
        };

        let requested = Path::new(raw);
        let joined = match (&self.root, requested.is_absolute()) {
            // Inside a jail "/" names the jail root.
            (Some(_), true) => base.join(requested.strip_prefix("/").unwrap_or(requested)),
            (None, true) => requested.to_path_buf(),
            (_, false) => base.join(requested),
        };

        let normalized = normalize(&joined)
            .ok_or_else(|| Error::InvalidWorkingDirectory(requested.to_path_buf()))?;

        if let Some(root) = &self.root {
            if !normalized.starts_with(root) {
                return Err(Error::InvalidWorkingDirectory(requested.to_path_buf()));
            }
            // Symlinks inside the jail must not lead out of it.
            if let (Ok(real), Ok(real_root)) =
                (std::fs::canonicalize(&normalized), std::fs::canonicalize(root))
            {
                if !real.starts_with(&real_root) {
                    return Err(Error::InvalidWorkingDirectory(requested.to_path_buf()));
                }
            }
        }

        Ok(normalized)
    }
}

/// Lexically resolve `.` and `..`. Returns `None` when `..` climbs past the
/// filesystem root.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    Some(out)
}

/// Re-validate a resolved directory right before spawning.
pub(crate) fn ensure_directory(path: &Path) -> Result<PathBuf> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(path.to_path_buf()),
        _ => Err(Error::InvalidWorkingDirectory(path.to_path_buf())),
    }
}
