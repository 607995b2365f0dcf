//! DNS alias management.

use reqwest::header::HeaderMap;
use serde_json::json;
use tracing::{debug, error, info};

use crate::client::Payload;
use crate::error::{Error, Result};
use crate::hooks::CommandRunner;
use crate::orchestrator::BlueGreen;
use crate::transport::{Method, Transport};

impl<T: Transport, R: CommandRunner> BlueGreen<T, R> {
    /// Current cnames of `app`.
    ///
    /// Returns `None` when the application has no cnames; an empty list is
    /// never returned. A non-2xx response is also reported as `None`.
    pub fn get_cnames(&self, app: &str) -> Result<Option<Vec<String>>> {
        let _guard = self.span.enter();

        let descriptor = match self.fetch_app(app) {
            Ok(descriptor) => descriptor,
            Err(Error::UnexpectedStatus { status, .. }) => {
                error!(app, status, "could not read application cnames");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        match descriptor.cname {
            Some(cnames) if !cnames.is_empty() => Ok(Some(cnames)),
            _ => {
                debug!(app, "application has no cnames");
                Ok(None)
            }
        }
    }

    /// Detach `cnames` from `app`.
    pub fn remove_cnames(&self, app: &str, cnames: &[String]) -> Result<bool> {
        self.change_cnames(Method::Delete, app, cnames)
    }

    /// Attach `cnames` to `app`.
    pub fn set_cnames(&self, app: &str, cnames: &[String]) -> Result<bool> {
        self.change_cnames(Method::Post, app, cnames)
    }

    fn change_cnames(&self, method: Method, app: &str, cnames: &[String]) -> Result<bool> {
        let _guard = self.span.enter();

        let url = self.app_url(app, "/cname")?;
        let response = self.client.send(
            method,
            url,
            Payload::Json(json!({ "cname": cnames })),
            HeaderMap::new(),
        )?;

        let action = match method {
            Method::Delete => "remove",
            _ => "set",
        };
        if response.is_ok() {
            info!(app, ?cnames, "{} cnames", action);
            Ok(true)
        } else {
            error!(app, ?cnames, status = response.status, "failed to {} cnames", action);
            Ok(false)
        }
    }
}
