use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use log::{debug, info};
use serde::Serialize;

use super::{
    DependencyResolver, NodeModule, OutputTransform, WriteContext, discover_inputs, name_inputs,
};
use crate::bundle::Output;
use crate::config::PackageManifest;
use crate::error::BuildError;
use crate::naming::PathToNameResolver;
use crate::npm::{ReleaseType, VersionSource, next_version};
use crate::rewrite::ExternalMatcher;
use crate::runtime::{Runtime, write_file};

/// File listing every emitted node module, written at the root of the output directory.
pub const SUMMARY_FILE_NAME: &str = "node-modules.json";

/// One entry of the build summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleSummary {
    pub name: String,
    pub version: String,
}

/// All node modules of one build, keyed by name.
///
/// Names are unique: [`NodeModuleMap::set`] refuses to replace an entry.
#[derive(Debug, Default)]
pub struct NodeModuleMap {
    modules: BTreeMap<String, NodeModule>,
}

impl NodeModuleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the source modules for every file matched by `patterns`.
    ///
    /// Names are checked for collisions before the registry is queried, then
    /// each module gets the next major version after its last published one.
    #[tracing::instrument(skip(runtime, versions, resolver))]
    pub async fn create<R, V>(
        runtime: &R,
        versions: &V,
        resolver: &PathToNameResolver,
        patterns: &[String],
        cwd: &Path,
        out_dir: &Path,
    ) -> Result<Self>
    where
        R: Runtime + ?Sized,
        V: VersionSource + ?Sized,
    {
        let named = name_inputs(resolver, discover_inputs(runtime, patterns, cwd)?)?;

        let found = try_join_all(
            named
                .iter()
                .map(|(name, _)| next_version(versions, name, ReleaseType::Major)),
        )
        .await?;

        let mut map = Self::new();
        for ((name, file), version) in named.into_iter().zip(found) {
            let module_dir = out_dir.join(&name);
            map.set(NodeModule::source(name, file, module_dir, version))?;
        }
        Ok(map)
    }

    /// Insert a module under its own name.
    ///
    /// Fails with [`BuildError::DuplicateName`] if the name is taken; the
    /// existing module is kept.
    pub fn set(&mut self, module: NodeModule) -> Result<()> {
        match self.modules.entry(module.name().to_string()) {
            Entry::Occupied(entry) => Err(BuildError::DuplicateName(entry.key().clone()).into()),
            Entry::Vacant(entry) => {
                debug!("Registered node module {}@{}", module.name(), module.version());
                entry.insert(module);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&NodeModule> {
        self.modules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &NodeModule)> {
        self.modules.iter()
    }

    pub fn filter_source_modules(&self) -> impl Iterator<Item = (&String, &NodeModule)> {
        self.modules.iter().filter(|(_, module)| module.is_source())
    }

    pub fn dependencies_from_source_modules(&self) -> BTreeMap<String, String> {
        self.filter_source_modules()
            .map(|(name, module)| (name.clone(), module.version().to_string()))
            .collect()
    }

    /// The bundler input map: source module name to source file.
    pub fn input_map(&self) -> BTreeMap<String, PathBuf> {
        self.modules
            .iter()
            .filter_map(|(name, module)| {
                module
                    .source_file_path()
                    .map(|path| (name.clone(), path.to_path_buf()))
            })
            .collect()
    }

    /// Hand a bundler output to the module it belongs to.
    ///
    /// Assets go to the assets module, shared chunks to the chunk module and
    /// entry chunks to the source module named after the entry.
    pub fn attach_output(
        &mut self,
        output: Output,
        chunk_module: &str,
        assets_module: &str,
    ) -> Result<()> {
        let (target, is_entry) = match &output {
            Output::Asset(_) => (assets_module.to_string(), false),
            Output::Chunk(chunk) if !chunk.is_entry => (chunk_module.to_string(), false),
            Output::Chunk(chunk) => (chunk.name.clone(), true),
        };

        match self.modules.get_mut(&target) {
            Some(module) if !is_entry || module.is_source() => {
                debug!("{} -> {}", output.file_name(), target);
                module.push_output(output);
                Ok(())
            }
            _ if is_entry => Err(BuildError::UnknownEntry(target).into()),
            _ => Err(BuildError::UnregisteredModule(target).into()),
        }
    }

    pub async fn transform_outputs<T: OutputTransform + ?Sized>(
        &mut self,
        transform: &T,
    ) -> Result<()> {
        try_join_all(
            self.modules
                .values_mut()
                .map(|module| module.transform_outputs(transform)),
        )
        .await?;
        Ok(())
    }

    /// Fill every module's dependency table from its imports.
    pub async fn resolve_dependencies(&mut self, manifest: &PackageManifest) -> Result<()> {
        let resolver = PinnedDependencyResolver::new(manifest, self);
        try_join_all(
            self.modules
                .values_mut()
                .map(|module| module.resolve_dependencies(&resolver)),
        )
        .await?;
        Ok(())
    }

    /// Make every module except the assets module depend on it.
    pub fn add_dependency_except_assets(&mut self, assets_module: &str) -> Result<()> {
        let version = self
            .get(assets_module)
            .map(|module| module.version().to_string())
            .ok_or_else(|| BuildError::UnregisteredModule(assets_module.to_string()))?;

        for module in self.modules.values_mut().filter(|m| !m.is_assets()) {
            module.set_dependency(assets_module, version.as_str());
        }
        Ok(())
    }

    pub fn write_node_module_files<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        ctx: &WriteContext,
    ) -> Result<()> {
        for module in self.modules.values() {
            module.write_files(runtime, ctx, self)?;
        }
        Ok(())
    }

    pub fn summaries(&self) -> Vec<ModuleSummary> {
        self.modules
            .values()
            .map(|module| ModuleSummary {
                name: module.name().to_string(),
                version: module.version().to_string(),
            })
            .collect()
    }

    /// Write `node-modules.json` into `out_dir`.
    #[tracing::instrument(skip(self, runtime))]
    pub fn write_summary<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        out_dir: &Path,
    ) -> Result<PathBuf> {
        let path = out_dir.join(SUMMARY_FILE_NAME);
        let content = serde_json::to_string_pretty(&self.summaries())
            .context("Failed to serialize build summary")?;
        write_file(runtime, &path, content.as_bytes())?;
        info!("Wrote {} node module(s) to {:?}", self.len(), path);
        Ok(path)
    }
}

/// Resolves imports against package.json pins and the modules of this build.
///
/// Candidate names are tried in order: `dependencies`, `peerDependencies`,
/// then module names. The version of the matched name comes from the first of
/// those three tables that has it.
#[derive(Debug, Clone)]
pub struct PinnedDependencyResolver {
    matcher: ExternalMatcher,
    dependencies: BTreeMap<String, String>,
    peer_dependencies: BTreeMap<String, String>,
    modules: HashMap<String, String>,
}

impl PinnedDependencyResolver {
    pub fn new(manifest: &PackageManifest, map: &NodeModuleMap) -> Self {
        let modules: HashMap<String, String> = map
            .iter()
            .map(|(name, module)| (name.clone(), module.version().to_string()))
            .collect();

        let matcher = ExternalMatcher::new(
            manifest
                .dependencies
                .keys()
                .chain(manifest.peer_dependencies.keys())
                .chain(map.modules.keys())
                .cloned(),
        );

        Self {
            matcher,
            dependencies: manifest.dependencies.clone(),
            peer_dependencies: manifest.peer_dependencies.clone(),
            modules,
        }
    }

    fn version_of(&self, name: &str) -> Option<&String> {
        self.dependencies
            .get(name)
            .or_else(|| self.peer_dependencies.get(name))
            .or_else(|| self.modules.get(name))
    }
}

#[async_trait]
impl DependencyResolver for PinnedDependencyResolver {
    async fn resolve(&self, id: &str) -> Result<Option<(String, String)>> {
        let Some(name) = self.matcher.matches(id) else {
            return Ok(None);
        };

        let version = self
            .version_of(name)
            .ok_or_else(|| BuildError::MissingVersionForDependency(name.to_string()))?;
        Ok(Some((name.to_string(), version.clone())))
    }
}
