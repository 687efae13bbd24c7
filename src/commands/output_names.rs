use anyhow::Result;

use crate::{
    config::{Config, ConfigOverrides},
    plugin::output_file_names,
    runtime::Runtime,
};

/// Print the file naming patterns the bundler should use
#[tracing::instrument(skip(runtime, overrides))]
pub fn output_names<R: Runtime>(runtime: R, overrides: ConfigOverrides) -> Result<()> {
    let config = Config::load(&runtime, overrides)?;
    println!("{}", serde_json::to_string_pretty(&output_file_names(&config))?);
    Ok(())
}
