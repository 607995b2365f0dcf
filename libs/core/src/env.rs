//! Application environment variables.

use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::client::Payload;
use crate::error::{Error, Result};
use crate::hooks::CommandRunner;
use crate::orchestrator::BlueGreen;
use crate::transport::{Method, Transport};

#[derive(Debug, Deserialize)]
struct EnvEntry {
    #[serde(default)]
    value: Value,
}

impl<T: Transport, R: CommandRunner> BlueGreen<T, R> {
    /// Set `key` on `app` without restarting its units.
    pub fn env_set(&self, app: &str, key: &str, value: &str) -> Result<bool> {
        let _guard = self.span.enter();

        let mut url = self.app_url(app, "/env")?;
        url.query_pairs_mut().append_pair("noRestart", "true");

        let response = self.client.send(
            Method::Post,
            url,
            Payload::Json(json!({ key: value })),
            HeaderMap::new(),
        )?;

        if response.is_ok() {
            info!(app, key, "set environment variable");
            Ok(true)
        } else {
            error!(app, key, status = response.status, "failed to set environment variable");
            Ok(false)
        }
    }

    /// Value of `key` on `app`, or `None` when it is unset.
    pub fn env_get(&self, app: &str, key: &str) -> Result<Option<String>> {
        let _guard = self.span.enter();

        let url = self.app_url(app, "/env")?;
        let response = self.client.send(
            Method::Get,
            url.clone(),
            Payload::Json(json!([key])),
            HeaderMap::new(),
        )?;
        if !response.is_success() {
            return Err(Error::UnexpectedStatus {
                status: response.status,
                url: url.to_string(),
            });
        }

        if response.body.trim() == "null" {
            return Ok(None);
        }

        let entries: Vec<EnvEntry> = serde_json::from_str(&response.body)?;
        Ok(entries.into_iter().next().and_then(|entry| match entry.value {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }))
    }
}
