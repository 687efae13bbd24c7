use anyhow::{Result, bail};
use std::collections::BTreeMap;

use crate::{
    config::{Config, ConfigOverrides},
    module::{discover_inputs, name_inputs},
    plugin::name_resolver,
    runtime::{Runtime, to_slash},
};

/// Print the bundler input map without querying the registry
#[tracing::instrument(skip(runtime, overrides))]
pub fn input<R: Runtime>(runtime: R, overrides: ConfigOverrides) -> Result<()> {
    let config = Config::load(&runtime, overrides)?;
    let map = input_map(&runtime, &config)?;
    println!("{}", serde_json::to_string_pretty(&map)?);
    Ok(())
}

fn input_map<R: Runtime>(runtime: &R, config: &Config) -> Result<BTreeMap<String, String>> {
    if config.input.is_empty() {
        bail!("No input patterns configured; set `input` in the config file");
    }

    let files = discover_inputs(runtime, &config.input, &config.cwd)?;
    let named = name_inputs(&name_resolver(config), files)?;
    Ok(named
        .into_iter()
        .map(|(name, path)| (name, to_slash(&path)))
        .collect())
}
