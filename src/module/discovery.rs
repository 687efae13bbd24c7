use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{debug, warn};

use crate::error::BuildError;
use crate::naming::PathToNameResolver;
use crate::runtime::{Runtime, ensure_absolute, to_slash};

/// Expand the input glob patterns into absolute source file paths.
///
/// Relative patterns are resolved against `cwd`. The result is sorted and
/// free of duplicates even when patterns overlap.
#[tracing::instrument(skip(runtime))]
pub fn discover_inputs<R: Runtime + ?Sized>(
    runtime: &R,
    patterns: &[String],
    cwd: &Path,
) -> Result<Vec<PathBuf>> {
    let mut files = BTreeSet::new();

    for pattern in patterns {
        let absolute = to_slash(&ensure_absolute(Path::new(pattern), cwd));
        let matched = runtime.glob(&absolute)?;
        if matched.is_empty() {
            warn!("Input pattern `{}` matched no files", pattern);
        }
        debug!("{} -> {} file(s)", pattern, matched.len());
        files.extend(matched);
    }

    Ok(files.into_iter().collect())
}

/// Pair every file with its package name, failing on the first collision.
pub fn name_inputs(
    resolver: &PathToNameResolver,
    files: Vec<PathBuf>,
) -> Result<Vec<(String, PathBuf)>> {
    let mut seen = HashSet::new();
    let mut named = Vec::with_capacity(files.len());

    for file in files {
        let resolution = resolver.resolve(&file);
        if !seen.insert(resolution.name.clone()) {
            return Err(BuildError::DuplicateName(resolution.name).into());
        }
        named.push((resolution.name, file));
    }
    Ok(named)
}
