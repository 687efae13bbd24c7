use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use log::debug;

use crate::bundle::OutputChunk;
use crate::error::BuildError;
use crate::module::{NodeModuleMap, OutputTransform};
use crate::rewrite::{try_replace_import_code, try_replace_import_from_code};

/// Points relative imports of sibling output directories at their packages.
///
/// Every sibling directory reached through `../<segment>/` must be a node
/// module of this build; anything else aborts the rewrite.
#[derive(Debug, Clone)]
pub struct ImportRedirect {
    npm_prefix: String,
    modules: HashSet<String>,
}

impl ImportRedirect {
    pub fn new(npm_prefix: impl Into<String>, map: &NodeModuleMap) -> Self {
        Self {
            npm_prefix: npm_prefix.into(),
            modules: map.names().map(str::to_string).collect(),
        }
    }

    fn check_registered(&self, segment: &str) -> Result<bool> {
        let name = format!("{}{}", self.npm_prefix, segment);
        if self.modules.contains(&name) {
            Ok(true)
        } else {
            Err(BuildError::UnregisteredModule(segment.to_string()).into())
        }
    }

    pub fn rewrite(&self, code: &str) -> Result<String> {
        let code = try_replace_import_code(code, |s| self.check_registered(s), &self.npm_prefix)?;
        try_replace_import_from_code(&code, |s| self.check_registered(s), &self.npm_prefix)
    }
}

#[async_trait]
impl OutputTransform for ImportRedirect {
    async fn transform(&self, output: &mut OutputChunk) -> Result<()> {
        let code = self.rewrite(&output.code)?;
        if code != output.code {
            debug!("Redirected sibling imports in {}", output.file_name);
        }
        output.code = code;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::NodeModule;

    fn map() -> NodeModuleMap {
        let mut map = NodeModuleMap::new();
        map.set(NodeModule::source("@app/button", "/w/src/button.ts", "/dist/@app/button", "1.0.0"))
            .unwrap();
        map.set(NodeModule::chunk("@app/chunks", "/dist/@app/chunks", "1.0.0"))
            .unwrap();
        map
    }

    #[tokio::test]
    async fn test_transform_rewrites_both_import_forms() {
        let redirect = ImportRedirect::new("@app/", &map());
        let mut chunk = OutputChunk {
            file_name: "@app/button/index.js".to_string(),
            code: "import '../chunks/shared.js';\nimport { a } from \"../chunks/a.js\";\nexport * from '../button/index.js';\n".to_string(),
            ..Default::default()
        };

        redirect.transform(&mut chunk).await.unwrap();

        assert_eq!(
            chunk.code,
            "import '@app/chunks/shared.js';\nimport { a } from \"@app/chunks/a.js\";\nexport * from '@app/button/index.js';\n"
        );
    }

    #[tokio::test]
    async fn test_transform_leaves_local_imports() {
        let redirect = ImportRedirect::new("@app/", &map());
        let code = "import { b } from './b.js';\nimport 'react';\n";
        let mut chunk = OutputChunk {
            code: code.to_string(),
            ..Default::default()
        };

        redirect.transform(&mut chunk).await.unwrap();
        assert_eq!(chunk.code, code);
    }

    #[tokio::test]
    async fn test_transform_unregistered_sibling_aborts() {
        let redirect = ImportRedirect::new("@app/", &map());
        let mut chunk = OutputChunk {
            code: "import x from '../ghost/index.js';".to_string(),
            ..Default::default()
        };

        let err = redirect.transform(&mut chunk).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<BuildError>(),
            Some(&BuildError::UnregisteredModule("ghost".to_string()))
        );
        assert_eq!(chunk.code, "import x from '../ghost/index.js';");
    }
}
