//! Plugin configuration.
//!
//! Options are read from `node-modules.config.json` in the working directory
//! (camelCase keys) and resolved into a [`Config`] with absolute paths, the
//! package.json dependency pins and the registry to query.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::npm::DEFAULT_REGISTRY;
use crate::runtime::{Runtime, ensure_absolute};

/// Config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "node-modules.config.json";

/// Registry variables, highest precedence first.
const REGISTRY_ENV_VARS: [&str; 2] = ["FETCH_REPOSITORY", "NPM_CONFIG_REGISTRY"];

const TOKEN_ENV_VAR: &str = "NPM_TOKEN";

/// The parts of a package.json that pin dependency versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, String>,
}

impl PackageManifest {
    pub fn load<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime.read_to_string(path)?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))
    }
}

/// Options as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    pub npm_prefix: String,
    pub chunk_module_name: String,
    pub assets_module_name: String,
    pub all_shared_module_name: String,
    /// File path to package name. Relative paths are resolved against `cwd`.
    pub override_names: BTreeMap<String, String>,
    /// Glob patterns selecting the source entry files.
    pub input: Vec<String>,
    pub out_dir: PathBuf,
    pub write_dts: bool,
    pub cwd: Option<PathBuf>,
    /// Inline dependency pins; `<cwd>/package.json` is read when absent.
    pub package_json: Option<PackageManifest>,
    pub registry: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            npm_prefix: String::new(),
            chunk_module_name: "chunks".to_string(),
            assets_module_name: "assets".to_string(),
            all_shared_module_name: "all-shared".to_string(),
            override_names: BTreeMap::new(),
            input: Vec::new(),
            out_dir: PathBuf::from("dist"),
            write_dts: true,
            cwd: None,
            package_json: None,
            registry: None,
        }
    }
}

impl Options {
    pub fn load<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime.read_to_string(path)?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))
    }
}

/// Command line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub cwd: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub registry: Option<String>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub cwd: PathBuf,
    pub out_dir: PathBuf,
    pub npm_prefix: String,
    pub chunk_module_name: String,
    pub assets_module_name: String,
    pub all_shared_module_name: String,
    pub override_names: BTreeMap<PathBuf, String>,
    pub input: Vec<String>,
    pub write_dts: bool,
    pub manifest: PackageManifest,
    pub registry: String,
    pub token: Option<String>,
}

impl Config {
    /// Locate and read the config file, then resolve it.
    ///
    /// A missing default config file yields the default options; a config
    /// file named on the command line must exist.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime + ?Sized>(runtime: &R, overrides: ConfigOverrides) -> Result<Self> {
        let current_dir = runtime.current_dir()?;
        let cwd = match &overrides.cwd {
            Some(cwd) => ensure_absolute(cwd, &current_dir),
            None => current_dir,
        };

        let options = match &overrides.config {
            Some(path) => Options::load(runtime, &ensure_absolute(path, &cwd))?,
            None => {
                let path = cwd.join(CONFIG_FILE_NAME);
                if runtime.exists(&path) {
                    Options::load(runtime, &path)?
                } else {
                    debug!("No {} in {:?}, using defaults", CONFIG_FILE_NAME, cwd);
                    Options::default()
                }
            }
        };

        Self::from_options(runtime, options, &cwd, overrides.registry)
    }

    /// Resolve `options` relative to `base_dir`.
    pub fn from_options<R: Runtime + ?Sized>(
        runtime: &R,
        options: Options,
        base_dir: &Path,
        registry: Option<String>,
    ) -> Result<Self> {
        let cwd = match &options.cwd {
            Some(cwd) => ensure_absolute(cwd, base_dir),
            None => base_dir.to_path_buf(),
        };

        let override_names = options
            .override_names
            .into_iter()
            .map(|(path, name)| (ensure_absolute(Path::new(&path), &cwd), name))
            .collect();

        let manifest = match options.package_json {
            Some(manifest) => manifest,
            None => {
                let path = cwd.join("package.json");
                PackageManifest::load(runtime, &path).with_context(|| {
                    format!("No `packageJson` configured and {:?} could not be read", path)
                })?
            }
        };

        let registry = registry
            .or(options.registry)
            .or_else(|| {
                REGISTRY_ENV_VARS
                    .iter()
                    .find_map(|key| runtime.env_var(key).ok().filter(|v| !v.is_empty()))
            })
            .unwrap_or_else(|| DEFAULT_REGISTRY.to_string());

        Ok(Self {
            out_dir: ensure_absolute(&options.out_dir, &cwd),
            cwd,
            npm_prefix: options.npm_prefix,
            chunk_module_name: options.chunk_module_name,
            assets_module_name: options.assets_module_name,
            all_shared_module_name: options.all_shared_module_name,
            override_names,
            input: options.input,
            write_dts: options.write_dts,
            manifest,
            registry,
            token: runtime.env_var(TOKEN_ENV_VAR).ok(),
        })
    }

    pub fn prefixed(&self, name: &str) -> String {
        format!("{}{}", self.npm_prefix, name)
    }

    pub fn prefixed_chunk_module_name(&self) -> String {
        self.prefixed(&self.chunk_module_name)
    }

    pub fn prefixed_assets_module_name(&self) -> String {
        self.prefixed(&self.assets_module_name)
    }

    pub fn prefixed_all_shared_module_name(&self) -> String {
        self.prefixed(&self.all_shared_module_name)
    }
}
