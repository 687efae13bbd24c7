//! Rendering of the files each node module directory carries.

use std::collections::BTreeMap;

use serde::Serialize;

/// The `package.json` written into every node module.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson<'a> {
    pub name: &'a str,
    pub version: &'a str,
    #[serde(rename = "type")]
    pub module_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_effects: Option<bool>,
    pub dependencies: &'a BTreeMap<String, String>,
}

impl<'a> PackageJson<'a> {
    pub fn new(
        name: &'a str,
        version: &'a str,
        dependencies: &'a BTreeMap<String, String>,
    ) -> Self {
        Self {
            name,
            version,
            module_type: "module",
            side_effects: Some(false),
            dependencies,
        }
    }

    /// Manifest without the `sideEffects` flag.
    pub fn without_side_effects(mut self) -> Self {
        self.side_effects = None;
        self
    }

    pub fn render(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// README with install instructions and, given the exports, a usage snippet.
pub fn readme(name: &str, exports: Option<&[String]>) -> String {
    let mut content = format!(
        "# {name}

## Installation

npm

```bash
npm i {name}
```

pnpm

```bash
pnpm i {name}
```

yarn

```bash
yarn add {name}
```
"
    );

    if let Some(exports) = exports {
        let bindings = exports
            .iter()
            .map(|x| {
                if x == "default" {
                    "  default as defaultExport".to_string()
                } else {
                    format!("  {}", x)
                }
            })
            .collect::<Vec<_>>()
            .join(",\n");

        content.push_str(&format!(
            "
## Usage

```ts
import {{
{bindings}
}} from '{name}';
```
"
        ));
    }

    content
}

/// `index.d.ts` pointing at the declarations emitted into the assets module.
pub fn dts_stub(assets_module_name: &str, relative_path: &str, has_default: bool) -> String {
    let target = format!("{}/types/{}", assets_module_name, relative_path);
    let mut content = format!("export * from \"{}\";\n", target);
    if has_default {
        content.push_str(&format!("export {{default}} from \"{}\";\n", target));
    }
    content
}

/// Two-line module re-exporting another package, used by the barrel.
pub fn reexport(name: &str, has_default: bool) -> String {
    let mut content = format!("export * from \"{}\";\n", name);
    if has_default {
        content.push_str(&format!("export {{ default }} from \"{}\";\n", name));
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_json_render() {
        let mut deps = BTreeMap::new();
        deps.insert("react".to_string(), "^18.0.0".to_string());
        deps.insert("@app/chunks".to_string(), "2.0.0".to_string());

        let json = PackageJson::new("@app/button", "3.0.0", &deps).render().unwrap();
        assert_eq!(
            json,
            r#"{
  "name": "@app/button",
  "version": "3.0.0",
  "type": "module",
  "sideEffects": false,
  "dependencies": {
    "@app/chunks": "2.0.0",
    "react": "^18.0.0"
  }
}"#
        );
    }

    #[test]
    fn test_package_json_without_side_effects() {
        let deps = BTreeMap::new();
        let json = PackageJson::new("all", "1.0.0", &deps)
            .without_side_effects()
            .render()
            .unwrap();
        assert!(!json.contains("sideEffects"));
        assert!(json.contains(r#""type": "module""#));
    }

    #[test]
    fn test_readme_install_only() {
        let content = readme("@app/chunks", None);
        assert!(content.starts_with("# @app/chunks\n"));
        assert!(content.contains("npm i @app/chunks"));
        assert!(content.contains("pnpm i @app/chunks"));
        assert!(content.contains("yarn add @app/chunks"));
        assert!(!content.contains("## Usage"));
    }

    #[test]
    fn test_readme_usage_renames_default() {
        let exports = vec!["Button".to_string(), "default".to_string()];
        let content = readme("@app/button", Some(&exports));
        assert!(content.ends_with(
            "## Usage\n\n```ts\nimport {\n  Button,\n  default as defaultExport\n} from '@app/button';\n```\n"
        ));
    }

    #[test]
    fn test_dts_stub() {
        assert_eq!(
            dts_stub("@app/assets", "components/button", false),
            "export * from \"@app/assets/types/components/button\";\n"
        );
        assert_eq!(
            dts_stub("assets", "a", true),
            "export * from \"assets/types/a\";\nexport {default} from \"assets/types/a\";\n"
        );
    }

    #[test]
    fn test_reexport() {
        assert_eq!(reexport("@app/a", false), "export * from \"@app/a\";\n");
        assert_eq!(
            reexport("@app/a", true),
            "export * from \"@app/a\";\nexport { default } from \"@app/a\";\n"
        );
    }
}
