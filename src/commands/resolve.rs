use anyhow::Result;
use log::debug;
use serde::Serialize;
use std::path::PathBuf;

use crate::{
    config::{Config, ConfigOverrides},
    naming::NameResolution,
    plugin::name_resolver,
    runtime::{Runtime, to_slash},
};

#[derive(Debug, Serialize)]
struct ResolvedPath {
    path: String,
    #[serde(flatten)]
    resolution: NameResolution,
}

/// Print the package name each path resolves to
#[tracing::instrument(skip(runtime, overrides))]
pub fn resolve<R: Runtime>(
    runtime: R,
    overrides: ConfigOverrides,
    paths: &[PathBuf],
    ignore_overrides: bool,
) -> Result<()> {
    let config = Config::load(&runtime, overrides)?;
    println!("{}", render_resolutions(&config, paths, ignore_overrides)?);
    Ok(())
}

fn render_resolutions(
    config: &Config,
    paths: &[PathBuf],
    ignore_overrides: bool,
) -> Result<String> {
    let resolver = name_resolver(config);
    let resolved: Vec<ResolvedPath> = paths
        .iter()
        .map(|path| {
            let resolution = if ignore_overrides {
                resolver.resolve_ignore_overrides(path)
            } else {
                resolver.resolve(path)
            };
            debug!("{:?} -> {}", path, resolution.name);
            ResolvedPath {
                path: to_slash(path),
                resolution,
            }
        })
        .collect();

    Ok(serde_json::to_string_pretty(&resolved)?)
}
