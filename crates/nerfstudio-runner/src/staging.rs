//! Staging of local inputs into a location the tool can reach
//!
//! Inputs already inside the workspace are addressed directly through the
//! workspace mount. Anything else is copied under the staging root and
//! addressed through the staging mount. A path that does not exist is passed
//! through untouched, since callers sometimes route non-path values through
//! path-typed arguments.

use crate::environment::ExecutionEnvironment;
use crate::error::{Error, Result};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A local filesystem path that must be made visible to the tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathArg {
    local_path: PathBuf,
    copy_depth: usize,
}

impl PathArg {
    /// Wrap `local_path`, copying `copy_depth` parent levels along with it
    pub fn new(local_path: impl Into<PathBuf>, copy_depth: usize) -> Self {
        Self {
            local_path: local_path.into(),
            copy_depth,
        }
    }

    /// The path as given by the caller
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Number of parent levels staged along with the path
    pub fn copy_depth(&self) -> usize {
        self.copy_depth
    }
}

/// Mark `local_path` for staging
pub fn path(local_path: impl Into<PathBuf>) -> PathArg {
    PathArg::new(local_path, 0)
}

/// Mark `local_path` for staging together with `copy_depth` parent levels
pub fn path_with_depth(local_path: impl Into<PathBuf>, copy_depth: usize) -> PathArg {
    PathArg::new(local_path, copy_depth)
}

/// How one staging request was resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedPathMapping {
    /// The adjusted source (original path walked up `copy_depth` levels)
    pub source_path: PathBuf,
    /// Base name of the adjusted source under the staging root
    pub destination_name: String,
    /// Path handed to the tool
    pub resolved_remote_path: String,
    /// Whether files were copied (false on the workspace fast path)
    pub copied: bool,
}

/// Outcome of a staging request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The path is reachable by the tool at the mapped location
    Staged(StagedPathMapping),
    /// The path does not exist locally; the original value is used verbatim
    PassThrough(String),
}

impl StageOutcome {
    /// The token to hand to the tool
    pub fn into_value(self) -> String {
        match self {
            StageOutcome::Staged(mapping) => mapping.resolved_remote_path,
            StageOutcome::PassThrough(original) => original,
        }
    }
}

/// Copies inputs into an environment's staging root
pub struct Stager<'a> {
    env: &'a ExecutionEnvironment,
    excludes: &'a [glob::Pattern],
}

impl<'a> Stager<'a> {
    /// Stage into `env`, skipping names matching `excludes`
    pub fn new(env: &'a ExecutionEnvironment, excludes: &'a [glob::Pattern]) -> Self {
        Self { env, excludes }
    }

    /// Make `arg` visible to the tool and compute the path it should receive
    pub fn stage(&self, arg: &PathArg) -> Result<StageOutcome> {
        let staging_err = |source: io::Error| Error::Staging {
            path: arg.local_path.clone(),
            source,
        };

        let absolute = absolutize(&arg.local_path).map_err(staging_err)?;
        let source = ancestor(&absolute, arg.copy_depth);

        if self.env.in_workspace(&source) {
            let relative = absolute
                .strip_prefix(&self.env.workspace_host_path)
                .unwrap_or(Path::new(""));
            let resolved = remote_join(&self.env.workspace_remote_path, relative);
            debug!(
                "{} is inside the workspace, using {}",
                absolute.display(),
                resolved
            );
            return Ok(StageOutcome::Staged(StagedPathMapping {
                destination_name: base_name(&source),
                source_path: source,
                resolved_remote_path: resolved,
                copied: false,
            }));
        }

        if !source.exists() {
            warn!(
                "Local path {} does not exist, passing value through unchanged",
                source.display()
            );
            return Ok(StageOutcome::PassThrough(
                arg.local_path.to_string_lossy().into_owned(),
            ));
        }

        let name = base_name(&source);
        if name.is_empty() {
            return Err(staging_err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot stage {} (no base name)", source.display()),
            )));
        }

        let destination = self.env.staging_host_path.join(&name);
        if source.is_dir() {
            info!("Staging directory {} -> {}", source.display(), destination.display());
            self.copy_dir_merge(&source, &destination)
                .map_err(staging_err)?;
        } else {
            info!("Staging file {} -> {}", source.display(), destination.display());
            fs::create_dir_all(&destination).map_err(staging_err)?;
            fs::copy(&source, destination.join(&name)).map_err(staging_err)?;
        }

        let relative = absolute.strip_prefix(&source).unwrap_or(Path::new(""));
        let resolved = remote_join(
            &self.env.staging_remote_path,
            &Path::new(&name).join(relative),
        );

        Ok(StageOutcome::Staged(StagedPathMapping {
            source_path: source,
            destination_name: name,
            resolved_remote_path: resolved,
            copied: true,
        }))
    }

    fn is_excluded(&self, name: &str) -> bool {
        self.excludes.iter().any(|p| p.matches(name))
    }

    /// Recursive copy that merges into an existing destination
    fn copy_dir_merge(&self, source: &Path, destination: &Path) -> io::Result<()> {
        let staging_root = &self.env.staging_host_path;
        let walker = WalkDir::new(source)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                // Never copy the staging root into itself
                !entry.path().starts_with(staging_root)
                    && !self.is_excluded(&entry.file_name().to_string_lossy())
            });

        for entry in walker {
            let entry = entry?;
            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(|e| io::Error::other(e.to_string()))?;
            let target = destination.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)?;
            } else {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(entry.path(), &target)?;
            }
        }

        Ok(())
    }
}

/// Absolute, lexically normalized form of `path` (symlinks are not resolved)
pub fn absolutize(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

/// Walk `levels` directories up from `path`, stopping at the root
fn ancestor(path: &Path, levels: usize) -> PathBuf {
    let mut current = path;
    for _ in 0..levels {
        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }
    current.to_path_buf()
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Join `relative` onto a `/`-separated remote base, collapsing `.` segments
/// and redundant separators
pub fn remote_join(base: &str, relative: &Path) -> String {
    let absolute = base.starts_with('/');
    let mut segments: Vec<String> = base
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .map(str::to_string)
        .collect();

    for component in relative.components() {
        match component {
            Component::Normal(part) => segments.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                segments.pop();
            }
            _ => {}
        }
    }

    let joined = segments.join("/");
    if absolute {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}
