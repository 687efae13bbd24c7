//! npm registry access for version numbering.
//!
//! Every emitted package gets the next major version after the one last
//! published to the registry. The registry is only ever read.

mod version;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use reqwest::{
    Client,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::Deserialize;

use crate::error::BuildError;
use crate::http::{HttpClient, NonRetryableError};

pub use version::{ReleaseType, UNPUBLISHED_VERSION, bump, next_version};

/// Registry used when nothing else is configured.
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";

/// Source of last-published package versions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VersionSource: Send + Sync {
    /// Last published version of `name`, or `None` if it was never published.
    ///
    /// Only a "not found" answer means never published. Any other failure is
    /// an error.
    async fn last_version(&self, name: &str) -> Result<Option<String>>;
}

/// Package document as served by the registry; only the dist-tags matter here.
#[derive(Debug, Deserialize)]
struct Packument {
    #[serde(rename = "dist-tags", default)]
    dist_tags: HashMap<String, String>,
}

/// [`VersionSource`] backed by an npm-compatible registry.
#[derive(Clone)]
pub struct NpmRegistry {
    http: HttpClient,
    registry_url: String,
}

impl NpmRegistry {
    pub fn new(http: HttpClient, registry_url: impl Into<String>) -> Self {
        Self {
            http,
            registry_url: registry_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn registry_url(&self) -> &str {
        &self.registry_url
    }

    /// URL of the package document; the scope separator is escaped.
    pub fn package_url(&self, name: &str) -> String {
        format!("{}/{}", self.registry_url, name.replace('/', "%2F"))
    }
}

#[async_trait]
impl VersionSource for NpmRegistry {
    #[tracing::instrument(skip(self))]
    async fn last_version(&self, name: &str) -> Result<Option<String>> {
        let url = self.package_url(name);
        match self.http.get_json::<Packument>(&url).await {
            Ok(mut packument) => match packument.dist_tags.remove("latest") {
                Some(latest) => Ok(Some(latest)),
                None => Err(BuildError::VersionLookupFailure {
                    name: name.to_string(),
                    reason: "the registry lists no `latest` dist-tag".to_string(),
                }
                .into()),
            },
            Err(e)
                if matches!(
                    e.downcast_ref::<NonRetryableError>(),
                    Some(NonRetryableError::NotFound(_))
                ) =>
            {
                debug!("{} has never been published", name);
                Ok(None)
            }
            Err(e) => Err(BuildError::VersionLookupFailure {
                name: name.to_string(),
                reason: format!("{:#}", e),
            }
            .into()),
        }
    }
}

/// Build an HTTP client with an optional registry token.
pub fn build_http_client(token: Option<&str>) -> Result<HttpClient> {
    let mut headers = HeaderMap::new();

    if let Some(token) = token {
        let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);
        debug!("HTTP client configured with registry authentication");
    }

    let client = Client::builder()
        .user_agent("extra-node-modules")
        .default_headers(headers)
        .build()?;

    Ok(HttpClient::new(client))
}
