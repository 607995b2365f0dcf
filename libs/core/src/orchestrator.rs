//! The blue-green orchestrator.
//!
//! [`BlueGreen`] exposes the primitives of a cutover (cname swaps, unit
//! scaling, environment markers, notifications and hooks). It never decides
//! the order of a rollout; the caller sequences the primitives and decides
//! whether a `false` result halts the run.
//!
//! Result conventions:
//!
//! - `Err(_)` is fatal: the transport failed or a response could not be decoded.
//! - `Ok(false)` means the control API (or a hook) reported a failure. The
//!   failure has already been logged at the point it happened.

use reqwest::Url;
use serde::Deserialize;
use tracing::{info_span, Span};

use crate::client::ApiClient;
use crate::config::Session;
use crate::error::{Error, Result};
use crate::hooks::{CommandRunner, ShellRunner};
use crate::transport::{HttpTransport, Transport};

/// Deployment marker endpoint for the monitoring service.
pub const MONITORING_ENDPOINT: &str = "http://api.newrelic.com/deployments.xml";

/// Orchestrates one blue-green deployment run.
#[derive(Debug)]
pub struct BlueGreen<T = HttpTransport, R = ShellRunner> {
    pub(crate) session: Session,
    pub(crate) client: ApiClient<T>,
    pub(crate) runner: R,
    pub(crate) monitoring_endpoint: String,
    pub(crate) span: Span,
}

impl BlueGreen {
    /// Create an orchestrator that talks HTTP and runs hooks through `sh`.
    pub fn connect(session: Session) -> Result<Self> {
        Ok(Self::with_parts(
            session,
            HttpTransport::new()?,
            ShellRunner::default(),
        ))
    }
}

impl<T: Transport, R: CommandRunner> BlueGreen<T, R> {
    /// Create an orchestrator from explicit collaborators.
    pub fn with_parts(session: Session, transport: T, runner: R) -> Self {
        let span = info_span!(
            "bluegreen",
            app = %session.app_name(),
            target = %session.target(),
        );
        let client = ApiClient::new(transport, session.target().clone(), session.token());

        Self {
            session,
            client,
            runner,
            monitoring_endpoint: MONITORING_ENDPOINT.to_string(),
            span,
        }
    }

    /// Send deployment markers somewhere other than [`MONITORING_ENDPOINT`].
    pub fn with_monitoring_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.monitoring_endpoint = endpoint.into();
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// `apps/{app}{suffix}` beneath the target. `app` is always a single
    /// path segment, so `/`, `?` and `#` in a name are percent-encoded.
    pub(crate) fn app_url(&self, app: &str, suffix: &str) -> Result<Url> {
        let mut url = self.client.url("apps")?;
        url.path_segments_mut()
            .map_err(|_| Error::invalid_url(self.session.target().as_str(), "cannot be a base"))?
            .push(app)
            .extend(suffix.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    /// Fetch the application descriptor.
    pub(crate) fn fetch_app(&self, app: &str) -> Result<AppDescriptor> {
        self.client.get_json(self.app_url(app, "")?)
    }
}

/// `GET /apps/{app}` response, reduced to the fields the orchestrator reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct AppDescriptor {
    #[serde(default)]
    pub cname: Option<Vec<String>>,

    #[serde(default)]
    pub units: Option<Vec<UnitDescriptor>>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UnitDescriptor {
    #[serde(rename = "ProcessName")]
    pub process_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeployConfig;
    use crate::testing::{FakeTransport, RecordingRunner};

    #[test]
    fn test_app_url() {
        let session =
            Session::new("t", "http://api.example.com/v2", DeployConfig::default()).unwrap();
        let bg = BlueGreen::with_parts(
            session,
            FakeTransport::new(),
            RecordingRunner::succeeding(),
        );

        assert_eq!(
            bg.app_url("shop-green", "/cname").unwrap().as_str(),
            "http://api.example.com/v2/apps/shop-green/cname"
        );
    }

    #[test]
    fn test_app_url_keeps_name_in_one_segment() {
        let session =
            Session::new("t", "http://api.example.com/", DeployConfig::default()).unwrap();
        let bg = BlueGreen::with_parts(
            session,
            FakeTransport::new(),
            RecordingRunner::succeeding(),
        );

        let url = bg.app_url("shop/../admin?x=1#top", "/units").unwrap();
        assert_eq!(
            url.as_str(),
            "http://api.example.com/apps/shop%2F..%2Fadmin%3Fx=1%23top/units"
        );
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_descriptor_tolerates_missing_and_null_fields() {
        let desc: AppDescriptor = serde_json::from_str(r#"{"cname": null}"#).unwrap();
        assert!(desc.cname.is_none());
        assert!(desc.units.is_none());

        let desc: AppDescriptor =
            serde_json::from_str(r#"{"units": [{"ProcessName": "web", "Ip": "10.0.0.1"}]}"#)
                .unwrap();
        assert_eq!(desc.units.unwrap()[0].process_name, "web");
    }
}
