//! Host bundler output model.
//!
//! These types mirror what a bundler hands to its plugins once compilation
//! is done: compiled chunks with their import/export lists, and plain assets
//! such as type declarations. A [`Bundle`] can be loaded from JSON, keyed by
//! output file name.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::runtime::{Runtime, write_file};

/// A compiled JavaScript chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OutputChunk {
    /// Path of the emitted file, relative to the output directory.
    pub file_name: String,
    /// Logical name; for entries this is the key of the build input map.
    pub name: String,
    #[serde(default)]
    pub is_entry: bool,
    pub code: String,
    /// Module identifiers this chunk imports.
    #[serde(default)]
    pub imports: Vec<String>,
    /// Exported binding names (`default` for a default export).
    #[serde(default)]
    pub exports: Vec<String>,
}

/// A non-code output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OutputAsset {
    pub file_name: String,
    #[serde(default)]
    pub name: Option<String>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Output {
    Chunk(OutputChunk),
    Asset(OutputAsset),
}

impl Output {
    pub fn file_name(&self) -> &str {
        match self {
            Output::Chunk(chunk) => &chunk.file_name,
            Output::Asset(asset) => &asset.file_name,
        }
    }

    pub fn as_chunk(&self) -> Option<&OutputChunk> {
        match self {
            Output::Chunk(chunk) => Some(chunk),
            Output::Asset(_) => None,
        }
    }

    pub fn as_chunk_mut(&mut self) -> Option<&mut OutputChunk> {
        match self {
            Output::Chunk(chunk) => Some(chunk),
            Output::Asset(_) => None,
        }
    }

    /// Write the output below `out_dir` at its file name.
    #[tracing::instrument(skip(self, runtime))]
    pub fn write<R: Runtime + ?Sized>(&self, runtime: &R, out_dir: &Path) -> Result<()> {
        let contents = match self {
            Output::Chunk(chunk) => &chunk.code,
            Output::Asset(asset) => &asset.source,
        };
        write_file(runtime, &out_dir.join(self.file_name()), contents.as_bytes())
    }
}

/// The final outputs of one bundler run, keyed by file name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Bundle(pub BTreeMap<String, Output>);

impl Bundle {
    pub fn load<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<Self> {
        let content = runtime.read_to_string(path)?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse bundle description {:?}", path))
    }

    pub fn into_outputs(self) -> impl Iterator<Item = Output> {
        self.0.into_values()
    }
}

impl FromIterator<Output> for Bundle {
    fn from_iter<I: IntoIterator<Item = Output>>(iter: I) -> Self {
        Bundle(
            iter.into_iter()
                .map(|output| (output.file_name().to_string(), output))
                .collect(),
        )
    }
}

/// On-disk naming patterns the host bundler should use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputFileNames {
    pub entry_file_names: String,
    pub chunk_file_names: String,
    pub asset_file_names: String,
}
