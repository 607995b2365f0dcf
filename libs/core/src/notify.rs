//! Deployment notifications.
//!
//! Both notifiers are optional. When their configuration is incomplete they
//! return `false` without touching the network, which callers distinguish
//! from a failed delivery by checking the session configuration.

use reqwest::header::HeaderValue;
use tracing::{error, info};

use crate::client::{form_headers, Payload};
use crate::error::{Error, Result};
use crate::hooks::CommandRunner;
use crate::orchestrator::BlueGreen;
use crate::transport::{Method, Transport};

impl<T: Transport, R: CommandRunner> BlueGreen<T, R> {
    /// Record a deployment marker for `tag` with the monitoring service.
    pub fn notify_monitoring(&self, tag: &str) -> Result<bool> {
        let _guard = self.span.enter();

        let Some((api_key, app_id)) = self.session.monitoring().credentials() else {
            return Ok(false);
        };

        info!(app_id, tag, "notifying monitoring service");
        let body = format!(
            "deployment[application_id]={}&deployment[revision]={}",
            app_id, tag
        );
        let mut headers = form_headers();
        let api_key = HeaderValue::from_str(api_key).map_err(|_| Error::InvalidHeader {
            name: "x-api-key".to_string(),
        })?;
        headers.insert("x-api-key", api_key);

        let response = self.client.request(
            Method::Post,
            &self.monitoring_endpoint,
            Payload::Raw(body),
            headers,
        )?;

        if response.is_ok() {
            Ok(true)
        } else {
            error!(app_id, status = response.status, "monitoring notification failed");
            Ok(false)
        }
    }

    /// Post `<payload_extras>&tag=<tag>` to the configured webhook.
    pub fn run_webhook(&self, tag: &str) -> Result<bool> {
        let _guard = self.span.enter();

        let Some((endpoint, extras)) = self.session.webhook().target() else {
            return Ok(false);
        };

        info!(endpoint, tag, "posting to webhook");
        let response = self.client.request(
            Method::Post,
            endpoint,
            Payload::Raw(format!("{}&tag={}", extras, tag)),
            form_headers(),
        )?;

        if response.is_ok() {
            Ok(true)
        } else {
            error!(endpoint, status = response.status, "webhook failed");
            Ok(false)
        }
    }
}
