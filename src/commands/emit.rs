use anyhow::Result;
use log::info;
use std::path::Path;

use crate::{
    bundle::Bundle,
    config::{Config, ConfigOverrides},
    module::ModuleSummary,
    npm::VersionSource,
    plugin::NodeModulesPlugin,
    runtime::{Runtime, ensure_absolute},
};

use super::services::build_plugin;

/// Split a finished bundle into node modules and write them out
#[tracing::instrument(skip(runtime, overrides))]
pub async fn emit<R: Runtime>(
    runtime: R,
    overrides: ConfigOverrides,
    bundle_path: &Path,
) -> Result<()> {
    let bundle_path = ensure_absolute(bundle_path, &runtime.current_dir()?);
    let config = Config::load(&runtime, overrides)?;
    let bundle = Bundle::load(&runtime, &bundle_path)?;

    let mut plugin = build_plugin(runtime, config)?;
    for summary in run(&mut plugin, bundle).await? {
        println!("{}@{}", summary.name, summary.version);
    }
    Ok(())
}

/// Drive the plugin through a whole build.
async fn run<R: Runtime, V: VersionSource>(
    plugin: &mut NodeModulesPlugin<R, V>,
    bundle: Bundle,
) -> Result<Vec<ModuleSummary>> {
    let input = plugin.input().await?;
    info!("Building {} source module(s)", input.len());

    plugin.generate_bundle(bundle).await?;
    plugin.write_bundle()?;
    Ok(plugin.modules().summaries())
}
