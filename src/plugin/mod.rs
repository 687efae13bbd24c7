//! Build orchestration.
//!
//! [`NodeModulesPlugin`] drives one build through the bundler's lifecycle:
//!
//! 1. [`input`](NodeModulesPlugin::input) discovers the source files, names
//!    and versions them, and hands the bundler its input map.
//! 2. [`output_file_names`](NodeModulesPlugin::output_file_names) tells the
//!    bundler where entries, shared chunks and assets go.
//! 3. [`generate_bundle`](NodeModulesPlugin::generate_bundle) takes the
//!    compiled outputs, splits them into node modules, redirects sibling
//!    imports, resolves dependencies and writes every package's files.
//! 4. [`write_bundle`](NodeModulesPlugin::write_bundle) writes the compiled
//!    outputs themselves.

mod redirect;

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Result, bail};
use futures_util::future::try_join3;
use log::info;

use crate::bundle::{Bundle, OutputFileNames};
use crate::config::Config;
use crate::module::{NodeModule, NodeModuleMap, WriteContext};
use crate::naming::{PathToNameResolver, kebab_case};
use crate::npm::{ReleaseType, VersionSource, next_version};
use crate::runtime::Runtime;

pub use redirect::ImportRedirect;

pub struct NodeModulesPlugin<R: Runtime, V: VersionSource> {
    runtime: R,
    versions: V,
    config: Config,
    resolver: PathToNameResolver,
    modules: NodeModuleMap,
}

impl<R: Runtime, V: VersionSource> NodeModulesPlugin<R, V> {
    pub fn new(runtime: R, versions: V, config: Config) -> Self {
        let resolver = name_resolver(&config);
        Self {
            runtime,
            versions,
            config,
            resolver,
            modules: NodeModuleMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn resolver(&self) -> &PathToNameResolver {
        &self.resolver
    }

    pub fn modules(&self) -> &NodeModuleMap {
        &self.modules
    }

    /// Create the source modules and return the bundler input map.
    #[tracing::instrument(skip(self))]
    pub async fn input(&mut self) -> Result<BTreeMap<String, PathBuf>> {
        if self.config.input.is_empty() {
            bail!("No input patterns configured; set `input` in the config file");
        }

        self.modules = NodeModuleMap::create(
            &self.runtime,
            &self.versions,
            &self.resolver,
            &self.config.input,
            &self.config.cwd,
            &self.config.out_dir,
        )
        .await?;

        info!("Found {} source module(s)", self.modules.len());
        Ok(self.modules.input_map())
    }

    pub fn output_file_names(&self) -> OutputFileNames {
        output_file_names(&self.config)
    }

    /// Split the compiled outputs into node modules and write their package files.
    #[tracing::instrument(skip(self, bundle))]
    pub async fn generate_bundle(&mut self, bundle: Bundle) -> Result<()> {
        let chunk_name = self.config.prefixed_chunk_module_name();
        let assets_name = self.config.prefixed_assets_module_name();
        let all_shared_name = self.config.prefixed_all_shared_module_name();

        let (chunk_version, assets_version, all_shared_version) = try_join3(
            next_version(&self.versions, &chunk_name, ReleaseType::Major),
            next_version(&self.versions, &assets_name, ReleaseType::Major),
            next_version(&self.versions, &all_shared_name, ReleaseType::Major),
        )
        .await?;

        let out_dir = &self.config.out_dir;
        self.modules
            .set(NodeModule::chunk(&chunk_name, out_dir.join(&chunk_name), chunk_version))?;
        self.modules
            .set(NodeModule::assets(&assets_name, out_dir.join(&assets_name), assets_version))?;

        let npm_prefix = self.config.npm_prefix.clone();
        self.modules.set(NodeModule::barrel(
            &all_shared_name,
            out_dir.join(&all_shared_name),
            all_shared_version,
            move |name| name.replacen(npm_prefix.as_str(), "", 1),
        ))?;

        for output in bundle.into_outputs() {
            self.modules.attach_output(output, &chunk_name, &assets_name)?;
        }

        let redirect = ImportRedirect::new(self.config.npm_prefix.as_str(), &self.modules);
        self.modules.transform_outputs(&redirect).await?;

        self.modules.resolve_dependencies(&self.config.manifest).await?;
        self.modules.add_dependency_except_assets(&assets_name)?;

        let ctx = WriteContext {
            cwd: self.config.cwd.clone(),
            prefixed_assets_module_name: assets_name,
            write_dts: self.config.write_dts,
        };
        self.modules.write_node_module_files(&self.runtime, &ctx)?;
        self.modules.write_summary(&self.runtime, &self.config.out_dir)?;
        Ok(())
    }

    /// Write every compiled output below the output directory.
    #[tracing::instrument(skip(self))]
    pub fn write_bundle(&self) -> Result<()> {
        for (_, module) in self.modules.iter() {
            for output in module.outputs() {
                output.write(&self.runtime, &self.config.out_dir)?;
            }
        }
        Ok(())
    }
}

/// Names are the kebab-cased path segments behind the npm prefix.
pub fn name_resolver(config: &Config) -> PathToNameResolver {
    let npm_prefix = config.npm_prefix.clone();
    PathToNameResolver::new(&config.cwd)
        .overrides(config.override_names.clone())
        .transform(move |segments| format!("{}{}", npm_prefix, kebab_case(&segments.join(" "))))
}

/// Where the bundler should place entries, shared chunks and assets.
pub fn output_file_names(config: &Config) -> OutputFileNames {
    OutputFileNames {
        entry_file_names: "[name]/index.js".to_string(),
        chunk_file_names: format!("{}/[name].js", config.prefixed_chunk_module_name()),
        asset_file_names: format!("{}/[name].js", config.prefixed_assets_module_name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{Output, OutputAsset, OutputChunk};
    use crate::config::PackageManifest;
    use crate::error::BuildError;
    use crate::npm::MockVersionSource;
    use crate::runtime::RealRuntime;
    use std::path::Path;
    use tempfile::tempdir;

    fn config(cwd: &Path) -> Config {
        Config {
            cwd: cwd.to_path_buf(),
            out_dir: cwd.join("dist"),
            npm_prefix: "@app/".to_string(),
            chunk_module_name: "chunks".to_string(),
            assets_module_name: "assets".to_string(),
            all_shared_module_name: "all-shared".to_string(),
            override_names: BTreeMap::new(),
            input: vec!["src/**/*.ts".to_string()],
            write_dts: true,
            manifest: PackageManifest {
                dependencies: [("react".to_string(), "^18.2.0".to_string())].into(),
                peer_dependencies: BTreeMap::new(),
            },
            registry: "http://localhost".to_string(),
            token: None,
        }
    }

    fn unpublished() -> MockVersionSource {
        let mut versions = MockVersionSource::new();
        versions.expect_last_version().returning(|_| Ok(None));
        versions
    }

    fn write_sources(cwd: &Path) {
        std::fs::create_dir_all(cwd.join("src/form-field")).unwrap();
        std::fs::write(cwd.join("src/form-field/index.ts"), "").unwrap();
        std::fs::write(cwd.join("src/useToggle.ts"), "").unwrap();
    }

    fn compiled_bundle() -> Bundle {
        [
            Output::Chunk(OutputChunk {
                file_name: "@app/form-field/index.js".to_string(),
                name: "@app/form-field".to_string(),
                is_entry: true,
                code: "import { s } from '../chunks/shared.js';\nimport { jsx } from 'react/jsx-runtime';\nexport default s;\n".to_string(),
                imports: vec!["@app/chunks/shared.js".to_string(), "react/jsx-runtime".to_string()],
                exports: vec!["default".to_string()],
            }),
            Output::Chunk(OutputChunk {
                file_name: "@app/use-toggle/index.js".to_string(),
                name: "@app/use-toggle".to_string(),
                is_entry: true,
                code: "import { s } from '../chunks/shared.js';\nexport const useToggle = s;\n".to_string(),
                imports: vec!["@app/chunks/shared.js".to_string()],
                exports: vec!["useToggle".to_string()],
            }),
            Output::Chunk(OutputChunk {
                file_name: "@app/chunks/shared.js".to_string(),
                name: "shared".to_string(),
                is_entry: false,
                code: "export const s = 1;\n".to_string(),
                imports: vec![],
                exports: vec!["s".to_string()],
            }),
            Output::Asset(OutputAsset {
                file_name: "@app/assets/types/useToggle.d.ts".to_string(),
                name: None,
                source: "export declare const useToggle: number;\n".to_string(),
            }),
        ]
        .into_iter()
        .collect()
    }

    fn read_json(path: &Path) -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_output_file_names() {
        let plugin = NodeModulesPlugin::new(RealRuntime, unpublished(), config(Path::new("/w")));
        let names = plugin.output_file_names();
        assert_eq!(names.entry_file_names, "[name]/index.js");
        assert_eq!(names.chunk_file_names, "@app/chunks/[name].js");
        assert_eq!(names.asset_file_names, "@app/assets/[name].js");
    }

    #[test]
    fn test_resolver_kebab_cases_with_prefix() {
        let mut cfg = config(Path::new("/w"));
        cfg.override_names =
            [(PathBuf::from("/w/src/legacy.ts"), "LegacyWidget".to_string())].into();
        let plugin = NodeModulesPlugin::new(RealRuntime, unpublished(), cfg);

        assert_eq!(plugin.resolver().resolve("src/useToggle.ts").name, "@app/use-toggle");
        assert_eq!(plugin.resolver().resolve("src/FormField/index.tsx").name, "@app/form-field");

        let overridden = plugin.resolver().resolve("src/legacy.ts");
        assert_eq!(overridden.name, "@app/legacy-widget");
        assert!(overridden.is_override);
    }

    #[tokio::test]
    async fn test_input_requires_patterns() {
        let mut cfg = config(Path::new("/w"));
        cfg.input.clear();
        let mut plugin = NodeModulesPlugin::new(RealRuntime, unpublished(), cfg);

        assert!(plugin.input().await.is_err());
    }

    #[tokio::test]
    async fn test_input_map() {
        let dir = tempdir().unwrap();
        write_sources(dir.path());
        let mut plugin = NodeModulesPlugin::new(RealRuntime, unpublished(), config(dir.path()));

        let input = plugin.input().await.unwrap();

        assert_eq!(input.len(), 2);
        assert_eq!(input["@app/form-field"], dir.path().join("src/form-field/index.ts"));
        assert_eq!(input["@app/use-toggle"], dir.path().join("src/useToggle.ts"));
        assert_eq!(plugin.modules().get("@app/use-toggle").unwrap().version(), "1.0.0");
    }

    #[tokio::test]
    async fn test_generate_and_write_bundle() {
        let dir = tempdir().unwrap();
        let cwd = dir.path();
        write_sources(cwd);

        let mut versions = MockVersionSource::new();
        versions
            .expect_last_version()
            .returning(|name| Ok((name == "@app/chunks").then(|| "2.3.0".to_string())));

        let mut plugin = NodeModulesPlugin::new(RealRuntime, versions, config(cwd));
        plugin.input().await.unwrap();
        plugin.generate_bundle(compiled_bundle()).await.unwrap();
        plugin.write_bundle().unwrap();

        let dist = cwd.join("dist");

        let form_field = read_json(&dist.join("@app/form-field/package.json"));
        assert_eq!(
            form_field["dependencies"],
            serde_json::json!({
                "@app/assets": "1.0.0",
                "@app/chunks": "3.0.0",
                "react": "^18.2.0"
            })
        );
        assert_eq!(
            std::fs::read_to_string(dist.join("@app/form-field/index.js")).unwrap(),
            "import { s } from '@app/chunks/shared.js';\nimport { jsx } from 'react/jsx-runtime';\nexport default s;\n"
        );
        assert_eq!(
            std::fs::read_to_string(dist.join("@app/use-toggle/index.d.ts")).unwrap(),
            "export * from \"@app/assets/types/useToggle\";\n"
        );
        assert!(dist.join("@app/assets/types/useToggle.d.ts").exists());
        assert!(dist.join("@app/chunks/shared.js").exists());

        let assets = read_json(&dist.join("@app/assets/package.json"));
        assert_eq!(assets["dependencies"], serde_json::json!({}));

        let barrel = read_json(&dist.join("@app/all-shared/package.json"));
        assert_eq!(
            barrel["dependencies"],
            serde_json::json!({"@app/form-field": "1.0.0", "@app/use-toggle": "1.0.0"})
        );
        assert_eq!(
            std::fs::read_to_string(dist.join("@app/all-shared/form-field/index.js")).unwrap(),
            "export * from \"@app/form-field\";\nexport { default } from \"@app/form-field\";\n"
        );

        let summary = read_json(&dist.join("node-modules.json"));
        let names: Vec<&str> = summary
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "@app/all-shared",
                "@app/assets",
                "@app/chunks",
                "@app/form-field",
                "@app/use-toggle"
            ]
        );
    }

    #[tokio::test]
    async fn test_generate_bundle_rejects_unknown_entry() {
        let dir = tempdir().unwrap();
        write_sources(dir.path());
        let mut plugin = NodeModulesPlugin::new(RealRuntime, unpublished(), config(dir.path()));
        plugin.input().await.unwrap();

        let bundle: Bundle = [Output::Chunk(OutputChunk {
            file_name: "@app/stray/index.js".to_string(),
            name: "@app/stray".to_string(),
            is_entry: true,
            ..Default::default()
        })]
        .into_iter()
        .collect();

        let err = plugin.generate_bundle(bundle).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<BuildError>(),
            Some(&BuildError::UnknownEntry("@app/stray".to_string()))
        );
    }

    #[tokio::test]
    async fn test_generate_bundle_rejects_colliding_synthetic_name() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/chunks.ts"), "").unwrap();
        let mut plugin = NodeModulesPlugin::new(RealRuntime, unpublished(), config(dir.path()));
        plugin.input().await.unwrap();

        let err = plugin.generate_bundle(Bundle::default()).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<BuildError>(),
            Some(&BuildError::DuplicateName("@app/chunks".to_string()))
        );
    }
}
