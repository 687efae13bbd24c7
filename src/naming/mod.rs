//! Package name resolution from source file paths.
//!
//! A path is turned into a package name by keeping only its meaningful
//! segments: `src/components/button/index.tsx` becomes `components-button`.
//! An explicit override table can pin the name of individual files.

mod case;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::runtime::{ensure_absolute, relative_path, to_slash};

pub use case::{kebab_case, words};

/// Joins the kept segments into the final name.
pub type SegmentsTransform = Arc<dyn Fn(&[String]) -> String + Send + Sync>;

/// Rewrites the file name (without extension) before it becomes a segment.
pub type FileNameTransform = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Segments dropped from every path unless configured otherwise.
pub const DEFAULT_DROPPABLE_SEGMENTS: [&str; 3] = ["src", "pages", "index"];

/// Name used when every segment of a path is dropped.
pub const DEFAULT_ROOT_NAME: &str = "root";

/// Result of resolving a file path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameResolution {
    pub name: String,
    /// True when the name came from the override table.
    #[serde(rename = "override")]
    pub is_override: bool,
}

/// Resolves a file path to a package name.
#[derive(Clone)]
pub struct PathToNameResolver {
    overrides: HashMap<PathBuf, String>,
    base_dir: PathBuf,
    cwd: PathBuf,
    droppable_segments: Vec<String>,
    root_name: String,
    transform: SegmentsTransform,
    transform_file_name: FileNameTransform,
}

impl PathToNameResolver {
    /// Create a resolver rooted at `cwd` with the default rules:
    /// drop `src`, `pages` and `index`, join with `-`, fall back to `root`.
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        let cwd = cwd.into();
        Self {
            overrides: HashMap::new(),
            base_dir: cwd.clone(),
            cwd,
            droppable_segments: DEFAULT_DROPPABLE_SEGMENTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            root_name: DEFAULT_ROOT_NAME.to_string(),
            transform: Arc::new(|segments: &[String]| segments.join("-")),
            transform_file_name: Arc::new(|name: &str| name.to_string()),
        }
    }

    /// Pin names for specific files. Relative keys are resolved against `cwd`.
    pub fn overrides<I, P, S>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (P, S)>,
        P: AsRef<Path>,
        S: Into<String>,
    {
        self.overrides = overrides
            .into_iter()
            .map(|(path, name)| (ensure_absolute(path.as_ref(), &self.cwd), name.into()))
            .collect();
        self
    }

    /// Directory the segments are computed from. Relative values are resolved against `cwd`.
    pub fn base_dir(mut self, base_dir: impl AsRef<Path>) -> Self {
        self.base_dir = ensure_absolute(base_dir.as_ref(), &self.cwd);
        self
    }

    pub fn droppable_segments<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.droppable_segments = segments.into_iter().map(Into::into).collect();
        self
    }

    pub fn root_name(mut self, root_name: impl Into<String>) -> Self {
        self.root_name = root_name.into();
        self
    }

    pub fn transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&[String]) -> String + Send + Sync + 'static,
    {
        self.transform = Arc::new(transform);
        self
    }

    pub fn transform_file_name<F>(mut self, transform: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.transform_file_name = Arc::new(transform);
        self
    }

    /// Resolve a path, honoring the override table.
    ///
    /// An override is still passed through the segment transform as a
    /// single-element list.
    pub fn resolve(&self, file_path: impl AsRef<Path>) -> NameResolution {
        let absolute = ensure_absolute(file_path.as_ref(), &self.cwd);
        if let Some(name) = self.overrides.get(&absolute).filter(|n| !n.is_empty()) {
            return NameResolution {
                name: (self.transform)(std::slice::from_ref(name)),
                is_override: true,
            };
        }

        self.resolve_ignore_overrides(file_path)
    }

    /// Resolve a path from its segments alone.
    pub fn resolve_ignore_overrides(&self, file_path: impl AsRef<Path>) -> NameResolution {
        let absolute = ensure_absolute(file_path.as_ref(), &self.cwd);
        let relative = relative_path(&self.base_dir, &absolute);
        let segments = self.split_to_segments(&relative);

        if segments.is_empty() {
            return NameResolution {
                name: self.root_name.clone(),
                is_override: false,
            };
        }

        NameResolution {
            name: (self.transform)(&segments),
            is_override: false,
        }
    }

    fn split_to_segments(&self, relative: &Path) -> Vec<String> {
        let file_name = relative
            .file_stem()
            .map(|stem| (self.transform_file_name)(&stem.to_string_lossy()))
            .unwrap_or_default();
        let dir = relative.parent().map(to_slash).unwrap_or_default();

        dir.split('/')
            .chain(file_name.split('/'))
            .filter(|s| !s.is_empty() && *s != ".")
            .filter(|s| !self.droppable_segments.iter().any(|d| d == s))
            .map(str::to_string)
            .collect()
    }
}

impl fmt::Debug for PathToNameResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathToNameResolver")
            .field("overrides", &self.overrides)
            .field("base_dir", &self.base_dir)
            .field("cwd", &self.cwd)
            .field("droppable_segments", &self.droppable_segments)
            .field("root_name", &self.root_name)
            .finish_non_exhaustive()
    }
}
