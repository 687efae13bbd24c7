//! Service factory for the build pipeline.
//!
//! The registry client is built from configuration values but is not part of
//! the configuration itself.

use anyhow::Result;
use log::debug;

use crate::{
    config::Config,
    npm::{NpmRegistry, build_http_client},
    plugin::NodeModulesPlugin,
    runtime::Runtime,
};

/// Build the npm registry client from configuration
pub fn build_version_source(config: &Config) -> Result<NpmRegistry> {
    let http_client = build_http_client(config.token.as_deref())?;
    debug!("Querying versions from {}", config.registry);
    Ok(NpmRegistry::new(http_client, &config.registry))
}

/// Build a plugin backed by the configured registry
pub fn build_plugin<R: Runtime>(
    runtime: R,
    config: Config,
) -> Result<NodeModulesPlugin<R, NpmRegistry>> {
    let versions = build_version_source(&config)?;
    Ok(NodeModulesPlugin::new(runtime, versions, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npm::VersionSource;
    use crate::runtime::MockRuntime;
    use crate::test_utils::config_from_options;
    use mockito::{Matcher, Server};

    fn config(registry: &str, token: Option<&str>) -> Config {
        let mut config = config_from_options(Default::default());
        config.registry = registry.to_string();
        config.token = token.map(str::to_string);
        config
    }

    #[test]
    fn test_build_version_source_uses_configured_registry() {
        let npm = build_version_source(&config("https://npm.example.com/", None)).unwrap();
        assert_eq!(npm.registry_url(), "https://npm.example.com");
    }

    #[tokio::test]
    async fn test_build_version_source_sends_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/@app%2Fchunks")
            .match_header("Authorization", Matcher::Exact("Bearer npm_token".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"dist-tags": {"latest": "1.0.0"}}"#)
            .create_async()
            .await;

        let npm = build_version_source(&config(&server.url(), Some("npm_token"))).unwrap();
        let version = npm.last_version("@app/chunks").await.unwrap();

        mock.assert_async().await;
        assert_eq!(version.as_deref(), Some("1.0.0"));
    }

    #[test]
    fn test_build_plugin() {
        let plugin =
            build_plugin(MockRuntime::new(), config("https://npm.example.com", None)).unwrap();
        assert_eq!(plugin.config().registry, "https://npm.example.com");
    }
}
