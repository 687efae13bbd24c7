//! Node modules: the independently publishable packages a build emits.
//!
//! Each [`NodeModule`] gathers the bundler outputs that belong to one package,
//! the dependencies they need, and knows how to write its directory:
//! `package.json`, `README.md` and, for source modules, `index.d.ts`.
//!
//! There are four kinds. Source modules come from one configured input file
//! each. The chunk module collects code the bundler split out because several
//! sources share it. The assets module holds non-code outputs such as type
//! declarations. The barrel module re-exports every source module and never
//! goes through the bundler; its files are written directly.

mod discovery;
pub mod files;
mod map;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::future::try_join_all;
use log::{debug, info};

use crate::bundle::{Output, OutputChunk};
use crate::error::BuildError;
use crate::runtime::{Runtime, relative_path, to_slash, write_file};

pub use discovery::{discover_inputs, name_inputs};
pub use map::{ModuleSummary, NodeModuleMap, PinnedDependencyResolver, SUMMARY_FILE_NAME};

/// Maps a source module name to its directory inside the barrel module.
pub type DirnameFormatter = Arc<dyn Fn(&str) -> String + Send + Sync>;

pub enum ModuleKind {
    Source { source_file_path: PathBuf },
    Chunk,
    Assets,
    Barrel { format_dirname: DirnameFormatter },
}

impl fmt::Debug for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleKind::Source { source_file_path } => f
                .debug_struct("Source")
                .field("source_file_path", source_file_path)
                .finish(),
            ModuleKind::Chunk => write!(f, "Chunk"),
            ModuleKind::Assets => write!(f, "Assets"),
            ModuleKind::Barrel { .. } => f.debug_struct("Barrel").finish_non_exhaustive(),
        }
    }
}

/// Rewrites a compiled chunk in place.
#[async_trait]
pub trait OutputTransform: Send + Sync {
    async fn transform(&self, output: &mut OutputChunk) -> Result<()>;
}

/// Maps an imported module identifier to the `(package, version)` it needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DependencyResolver: Send + Sync {
    async fn resolve(&self, id: &str) -> Result<Option<(String, String)>>;
}

/// Build-wide settings needed while writing node module files.
#[derive(Debug, Clone)]
pub struct WriteContext {
    pub cwd: PathBuf,
    pub prefixed_assets_module_name: String,
    pub write_dts: bool,
}

#[derive(Debug)]
pub struct NodeModule {
    name: String,
    out_dir: PathBuf,
    version: String,
    dependencies: BTreeMap<String, String>,
    outputs: Vec<Output>,
    kind: ModuleKind,
}

impl NodeModule {
    fn new(name: String, out_dir: PathBuf, version: String, kind: ModuleKind) -> Self {
        Self {
            name,
            out_dir,
            version,
            dependencies: BTreeMap::new(),
            outputs: Vec::new(),
            kind,
        }
    }

    pub fn source(
        name: impl Into<String>,
        source_file_path: impl Into<PathBuf>,
        out_dir: impl Into<PathBuf>,
        version: impl Into<String>,
    ) -> Self {
        let source_file_path = source_file_path.into();
        Self::new(
            name.into(),
            out_dir.into(),
            version.into(),
            ModuleKind::Source { source_file_path },
        )
    }

    pub fn chunk(
        name: impl Into<String>,
        out_dir: impl Into<PathBuf>,
        version: impl Into<String>,
    ) -> Self {
        Self::new(name.into(), out_dir.into(), version.into(), ModuleKind::Chunk)
    }

    pub fn assets(
        name: impl Into<String>,
        out_dir: impl Into<PathBuf>,
        version: impl Into<String>,
    ) -> Self {
        Self::new(name.into(), out_dir.into(), version.into(), ModuleKind::Assets)
    }

    pub fn barrel<F>(
        name: impl Into<String>,
        out_dir: impl Into<PathBuf>,
        version: impl Into<String>,
        format_dirname: F,
    ) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        let format_dirname: DirnameFormatter = Arc::new(format_dirname);
        Self::new(
            name.into(),
            out_dir.into(),
            version.into(),
            ModuleKind::Barrel { format_dirname },
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn kind(&self) -> &ModuleKind {
        &self.kind
    }

    pub fn dependencies(&self) -> &BTreeMap<String, String> {
        &self.dependencies
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn is_source(&self) -> bool {
        matches!(self.kind, ModuleKind::Source { .. })
    }

    pub fn is_assets(&self) -> bool {
        matches!(self.kind, ModuleKind::Assets)
    }

    pub fn source_file_path(&self) -> Option<&Path> {
        match &self.kind {
            ModuleKind::Source { source_file_path } => Some(source_file_path),
            _ => None,
        }
    }

    pub fn push_output(&mut self, output: Output) {
        self.outputs.push(output);
    }

    pub fn set_dependency(&mut self, name: impl Into<String>, version: impl Into<String>) {
        self.dependencies.insert(name.into(), version.into());
    }

    pub fn chunk_outputs(&self) -> impl Iterator<Item = &OutputChunk> {
        self.outputs.iter().filter_map(Output::as_chunk)
    }

    /// The module's only output, if it is a chunk.
    pub fn single_chunk(&self) -> Option<&OutputChunk> {
        match self.outputs.as_slice() {
            [Output::Chunk(chunk)] => Some(chunk),
            _ => None,
        }
    }

    fn expect_single_chunk(&self) -> Result<&OutputChunk> {
        self.single_chunk().ok_or_else(|| {
            BuildError::UnexpectedOutputShape {
                name: self.name.clone(),
                count: self.outputs.len(),
            }
            .into()
        })
    }

    /// Apply `transform` to every chunk output concurrently. Assets are skipped.
    pub async fn transform_outputs<T: OutputTransform + ?Sized>(
        &mut self,
        transform: &T,
    ) -> Result<()> {
        try_join_all(
            self.outputs
                .iter_mut()
                .filter_map(Output::as_chunk_mut)
                .map(|chunk| transform.transform(chunk)),
        )
        .await?;
        Ok(())
    }

    /// Resolve every import of every chunk and record the results.
    ///
    /// Lookups run concurrently; results are merged in output order and then
    /// import order, so a later import of the same package wins.
    pub async fn resolve_dependencies<D: DependencyResolver + ?Sized>(
        &mut self,
        resolver: &D,
    ) -> Result<()> {
        let ids: Vec<&str> = self
            .outputs
            .iter()
            .filter_map(Output::as_chunk)
            .flat_map(|chunk| chunk.imports.iter().map(String::as_str))
            .collect();

        let resolved = try_join_all(ids.iter().map(|id| resolver.resolve(id))).await?;

        for (name, version) in resolved.into_iter().flatten() {
            self.dependencies.insert(name, version);
        }
        Ok(())
    }

    /// Write this module's files into its output directory.
    #[tracing::instrument(skip(self, runtime, ctx, map), fields(name = %self.name))]
    pub fn write_files<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        ctx: &WriteContext,
        map: &NodeModuleMap,
    ) -> Result<()> {
        match &self.kind {
            ModuleKind::Barrel { format_dirname } => {
                self.write_barrel_files(runtime, map, format_dirname)
            }
            ModuleKind::Source { .. } | ModuleKind::Chunk | ModuleKind::Assets => {
                self.write_package_files(runtime, ctx)
            }
        }
    }

    fn write_package_files<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        ctx: &WriteContext,
    ) -> Result<()> {
        runtime.create_dir_all(&self.out_dir)?;

        let package_json = files::PackageJson::new(&self.name, &self.version, &self.dependencies)
            .render()
            .context("Failed to serialize package.json")?;
        runtime.write(&self.out_dir.join("package.json"), package_json.as_bytes())?;

        let usage_chunk = match &self.kind {
            ModuleKind::Source { .. } => self.single_chunk(),
            _ => None,
        };
        let readme = files::readme(&self.name, usage_chunk.map(|c| c.exports.as_slice()));
        runtime.write(&self.out_dir.join("README.md"), readme.as_bytes())?;

        if let (true, Some(chunk), ModuleKind::Source { source_file_path }) =
            (ctx.write_dts, usage_chunk, &self.kind)
        {
            // Declarations keep the source tree layout below `src`
            let relative = relative_path(&ctx.cwd.join("src"), source_file_path).with_extension("");
            let dts = files::dts_stub(
                &ctx.prefixed_assets_module_name,
                &to_slash(&relative),
                chunk.exports.iter().any(|x| x == "default"),
            );
            runtime.write(&self.out_dir.join("index.d.ts"), dts.as_bytes())?;
        }

        info!("Wrote node module {}@{}", self.name, self.version);
        Ok(())
    }

    fn write_barrel_files<R: Runtime + ?Sized>(
        &self,
        runtime: &R,
        map: &NodeModuleMap,
        format_dirname: &DirnameFormatter,
    ) -> Result<()> {
        for (name, module) in map.filter_source_modules() {
            let chunk = module.expect_single_chunk()?;
            let has_default = chunk.exports.iter().any(|x| x == "default");
            let dir = self.out_dir.join(format_dirname(name.as_str()));
            let content = files::reexport(name, has_default);

            write_file(runtime, &dir.join("index.js"), content.as_bytes())?;
            write_file(runtime, &dir.join("index.d.ts"), content.as_bytes())?;
            debug!("{}: re-exported {} from {:?}", self.name, name, dir);
        }

        let dependencies = map.dependencies_from_source_modules();
        let package_json = files::PackageJson::new(&self.name, &self.version, &dependencies)
            .without_side_effects()
            .render()
            .context("Failed to serialize package.json")?;
        write_file(runtime, &self.out_dir.join("package.json"), package_json.as_bytes())?;

        info!("Wrote barrel module {}@{}", self.name, self.version);
        Ok(())
    }
}
