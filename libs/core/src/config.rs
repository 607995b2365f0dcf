//! Deployment configuration and session state.
//!
//! A deployment file describes the application and its optional side effects:
//!
//! ```yaml
//! name: storefront
//! hooks:
//!   pre-swap: ./scripts/warm-caches.sh
//!   post-swap: ./scripts/purge-cdn.sh
//! newrelic:
//!   api_key: abc123
//!   app_id: "4242"
//! webhook:
//!   endpoint: https://hooks.example.com/deploys
//!   payload_extras: channel=releases
//! ```
//!
//! JSON files are accepted as well. Token and target are not part of the file;
//! they are supplied by the caller when the [`Session`] is created.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Deployment file contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Application display name.
    #[serde(default)]
    pub name: String,

    /// Lifecycle hooks keyed by name.
    #[serde(default)]
    pub hooks: HookSpec,

    /// Monitoring (deployment marker) settings.
    #[serde(default, rename = "newrelic", alias = "monitoring")]
    pub monitoring: MonitoringConfig,

    /// Webhook notification settings.
    #[serde(default)]
    pub webhook: WebhookConfig,
}

impl DeployConfig {
    /// Parse a deployment file from YAML (or JSON) text.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        parse(contents).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load a deployment file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;

        parse(&contents).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}

fn parse(contents: &str) -> std::result::Result<DeployConfig, serde_yaml::Error> {
    // An empty document deserializes to unit, not a map.
    if contents.trim().is_empty() {
        return Ok(DeployConfig::default());
    }

    serde_yaml::from_str(contents)
}

/// Hook name to shell command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HookSpec(BTreeMap<String, String>);

impl HookSpec {
    /// Command registered under `name`, if any.
    pub fn command(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HookSpec {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Monitoring service credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
}

impl MonitoringConfig {
    /// `(api_key, app_id)` when both are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.api_key, &self.app_id) {
            (Some(key), Some(id)) => Some((key.as_str(), id.as_str())),
            _ => None,
        }
    }
}

/// Webhook notification target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Form-encoded fragment prepended to the `tag` field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_extras: Option<String>,
}

impl WebhookConfig {
    /// `(endpoint, payload_extras)` when both are configured.
    pub fn target(&self) -> Option<(&str, &str)> {
        match (&self.endpoint, &self.payload_extras) {
            (Some(endpoint), Some(extras)) => Some((endpoint.as_str(), extras.as_str())),
            _ => None,
        }
    }
}

/// Everything a deployment run needs, fixed at startup.
#[derive(Debug, Clone)]
pub struct Session {
    token: String,
    target: Url,
    config: DeployConfig,
}

impl Session {
    /// Create a session for the control API at `target`.
    ///
    /// The target must be an absolute URL; a trailing slash is added so that
    /// endpoint paths resolve beneath it.
    pub fn new(token: impl Into<String>, target: &str, config: DeployConfig) -> Result<Self> {
        let token = token.into();
        if token.is_empty() {
            return Err(Error::Config("API token must not be empty".to_string()));
        }

        let normalized = if target.ends_with('/') {
            target.to_string()
        } else {
            format!("{}/", target)
        };
        let target = Url::parse(&normalized).map_err(|e| Error::invalid_url(target, e))?;
        if target.cannot_be_a_base() {
            return Err(Error::invalid_url(target.as_str(), "not a base URL"));
        }

        Ok(Self {
            token,
            target,
            config,
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// API base URL, always ending in `/`.
    pub fn target(&self) -> &Url {
        &self.target
    }

    pub fn app_name(&self) -> &str {
        &self.config.name
    }

    pub fn hooks(&self) -> &HookSpec {
        &self.config.hooks
    }

    pub fn monitoring(&self) -> &MonitoringConfig {
        &self.config.monitoring
    }

    pub fn webhook(&self) -> &WebhookConfig {
        &self.config.webhook
    }
}
