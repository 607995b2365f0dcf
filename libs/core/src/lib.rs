//! Blue-green deployment primitives for a PaaS control API.
//!
//! The crate exposes a single orchestrator, [`BlueGreen`], with the building
//! blocks of a cutover between an old and a new application:
//!
//! - cname reads and swaps ([`BlueGreen::get_cnames`], [`BlueGreen::set_cnames`],
//!   [`BlueGreen::remove_cnames`])
//! - unit scaling with post-write verification ([`BlueGreen::add_units`],
//!   [`BlueGreen::remove_units`])
//! - application environment markers ([`BlueGreen::env_set`], [`BlueGreen::env_get`])
//! - monitoring and webhook notifications, and shell lifecycle hooks
//!
//! Every call is synchronous and reads fresh state from the API; nothing is
//! cached between calls. Sequencing the primitives into a rollout is left to
//! the caller.

pub mod client;
mod cname;
pub mod config;
mod env;
pub mod error;
pub mod hooks;
mod notify;
pub mod orchestrator;
pub mod transport;
pub mod units;

#[cfg(test)]
mod testing;

pub use client::{ApiClient, Payload};
pub use config::{DeployConfig, HookSpec, MonitoringConfig, Session, WebhookConfig};
pub use error::{Error, Result};
pub use hooks::{CommandRunner, HookEnv, ShellRunner};
pub use orchestrator::{BlueGreen, MONITORING_ENDPOINT};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, Transport};
pub use units::{scale_down_plan, scale_up_plan, ProcessUnitCount, ScaleOutcome, ScaleStep};
