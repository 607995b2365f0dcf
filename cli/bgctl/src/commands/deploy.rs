//! Deploy command (blue-green cutover).

use anyhow::{bail, Context, Result};
use bluegreen_core::{BlueGreen, CommandRunner, HookEnv, Transport};
use clap::Args;
use tracing::{debug, info, warn};

use crate::output::{print_info, print_success, print_warning};

use super::{CommandContext, DEFAULT_TAG_KEY};

/// Hook run after the new application is scaled, before traffic moves.
pub const PRE_SWAP_HOOK: &str = "pre-swap";

/// Hook run once the new application owns the cnames.
pub const POST_SWAP_HOOK: &str = "post-swap";

/// Deploy command - move traffic from `--from` to `--to`.
#[derive(Debug, Args)]
pub struct DeployCommand {
    /// Application currently serving traffic.
    #[arg(long)]
    from: String,

    /// Application that should serve traffic afterwards.
    #[arg(long)]
    to: String,

    /// Release tag, passed to hooks and notifications.
    #[arg(long)]
    tag: String,

    /// Units per process to leave running on the old application.
    #[arg(long, default_value_t = 0)]
    keep: u32,

    /// Environment variable that records the tag on the new application.
    #[arg(long, default_value = DEFAULT_TAG_KEY)]
    tag_key: String,
}

impl DeployCommand {
    pub fn run(self, ctx: &CommandContext) -> Result<()> {
        let bg = ctx.orchestrator()?;
        self.execute(&bg)
    }

    /// Environment passed to both hooks.
    fn hook_env(&self, app_name: &str) -> HookEnv {
        HookEnv::from([
            ("BLUEGREEN_APP".to_string(), app_name.to_string()),
            ("BLUEGREEN_FROM".to_string(), self.from.clone()),
            ("BLUEGREEN_TO".to_string(), self.to.clone()),
            ("BLUEGREEN_TAG".to_string(), self.tag.clone()),
        ])
    }

    pub fn execute<T: Transport, R: CommandRunner>(&self, bg: &BlueGreen<T, R>) -> Result<()> {
        if self.from == self.to {
            bail!("--from and --to must name different applications");
        }

        let env = self.hook_env(bg.session().app_name());

        let Some(cnames) = bg.get_cnames(&self.from)? else {
            bail!(
                "Application '{}' has no cnames to move, or they could not be read (see the log for the API status)",
                self.from
            );
        };
        info!(from = %self.from, to = %self.to, tag = %self.tag, "starting cutover");

        let wanted = bg
            .total_units(&self.from)
            .with_context(|| format!("Failed to read units of '{}'", self.from))?;
        print_info(&format!(
            "Scaling '{}' to match '{}' ({} process types)",
            self.to,
            self.from,
            wanted.len()
        ));
        if !bg.add_units(&self.to, &wanted)? {
            bail!(
                "Failed to scale up '{}'. Traffic was not moved; extra units may need removal.",
                self.to
            );
        }

        if !bg.run_hook(PRE_SWAP_HOOK, &env) {
            bail!("The '{}' hook failed. Traffic was not moved.", PRE_SWAP_HOOK);
        }

        if !bg.remove_cnames(&self.from, &cnames)? {
            bail!("Failed to detach cnames from '{}'", self.from);
        }
        if !bg.set_cnames(&self.to, &cnames)? {
            if bg.set_cnames(&self.from, &cnames)? {
                bail!(
                    "Failed to attach cnames to '{}'; they were restored on '{}'",
                    self.to,
                    self.from
                );
            }
            bail!(
                "Failed to attach cnames to '{}' and could not restore them on '{}'. Reattach {:?} manually.",
                self.to,
                self.from,
                cnames
            );
        }
        print_success(&format!(
            "{} now served by '{}'",
            cnames.join(", "),
            self.to
        ));

        if !bg.run_hook(POST_SWAP_HOOK, &env) {
            print_warning(&format!("The '{}' hook failed", POST_SWAP_HOOK));
        }
        self.notify(bg);

        match bg.env_set(&self.to, &self.tag_key, &self.tag) {
            Ok(true) => {}
            Ok(false) => print_warning(&format!(
                "Could not record {}={} on '{}'",
                self.tag_key, self.tag, self.to
            )),
            Err(e) => {
                warn!(app = %self.to, error = %e, "recording the tag failed");
                print_warning(&format!(
                    "Could not record {}={} on '{}': {}",
                    self.tag_key, self.tag, self.to, e
                ));
            }
        }

        if !bg.remove_units(&self.from, self.keep)? {
            bail!(
                "Cutover complete, but some units of '{}' could not be removed. Remove them manually.",
                self.from
            );
        }

        print_success(&format!("Deployed {} to '{}'", self.tag, self.to));
        Ok(())
    }

    /// Both notifiers are best effort once traffic has moved.
    fn notify<T: Transport, R: CommandRunner>(&self, bg: &BlueGreen<T, R>) {
        let session = bg.session();

        if session.monitoring().credentials().is_none() {
            debug!("monitoring notification not configured");
        } else {
            report_notifier("Monitoring notification", bg.notify_monitoring(&self.tag));
        }

        if session.webhook().target().is_none() {
            debug!("webhook not configured");
        } else {
            report_notifier("Webhook notification", bg.run_webhook(&self.tag));
        }
    }
}

fn report_notifier(what: &str, result: bluegreen_core::Result<bool>) {
    match result {
        Ok(true) => {}
        Ok(false) => print_warning(&format!("{} failed", what)),
        Err(e) => {
            warn!(error = %e, "{} failed", what);
            print_warning(&format!("{} failed: {}", what, e));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};
    use std::io;

    use bluegreen_core::{
        DeployConfig, Error, HookSpec, HttpRequest, HttpResponse, MonitoringConfig, Session,
        WebhookConfig,
    };
    use serde_json::json;

    use super::*;

    /// Control API double keyed by `METHOD /path`; unlisted routes answer 200.
    #[derive(Default)]
    struct ScriptedApi {
        routes: HashMap<String, Vec<HttpResponse>>,
        unreachable: HashSet<String>,
        calls: RefCell<Vec<String>>,
    }

    impl ScriptedApi {
        fn on(mut self, route: &str, status: u16, body: serde_json::Value) -> Self {
            let body = if body.is_null() { String::new() } else { body.to_string() };
            self.routes
                .entry(route.to_string())
                .or_default()
                .push(HttpResponse::new(status, body));
            self
        }

        /// Fail `route` at the connection level.
        fn unreachable(mut self, route: &str) -> Self {
            self.unreachable.insert(route.to_string());
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn called(&self, route: &str) -> bool {
            self.calls.borrow().iter().any(|c| c == route)
        }
    }

    impl Transport for ScriptedApi {
        fn send(&self, request: HttpRequest) -> bluegreen_core::Result<HttpResponse> {
            let route = format!("{} {}", request.method, request.url.path());
            let seen = self.calls.borrow().iter().filter(|c| **c == route).count();
            self.calls.borrow_mut().push(route.clone());

            if self.unreachable.contains(&route) {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset",
                )));
            }

            Ok(match self.routes.get(&route) {
                Some(responses) => responses[seen.min(responses.len() - 1)].clone(),
                None => HttpResponse::new(200, ""),
            })
        }
    }

    /// Runs nothing; the command `false` reports failure.
    struct ScriptedRunner;

    impl CommandRunner for ScriptedRunner {
        fn run(&self, command: &str, _env: &HookEnv) -> io::Result<bool> {
            Ok(command != "false")
        }
    }

    fn app(cnames: &[&str], units: &[&str]) -> serde_json::Value {
        let units: Vec<_> = units.iter().map(|p| json!({ "ProcessName": p })).collect();
        json!({ "cname": cnames, "units": units })
    }

    fn command() -> DeployCommand {
        DeployCommand {
            from: "shop-blue".to_string(),
            to: "shop-green".to_string(),
            tag: "v2".to_string(),
            keep: 0,
            tag_key: DEFAULT_TAG_KEY.to_string(),
        }
    }

    fn config() -> DeployConfig {
        DeployConfig {
            name: "shop".to_string(),
            hooks: HookSpec::from_iter([("pre-swap", "true")]),
            ..DeployConfig::default()
        }
    }

    fn orchestrator(api: &ScriptedApi, config: DeployConfig) -> BlueGreen<&ScriptedApi, ScriptedRunner> {
        let session = Session::new("t", "http://api.example.com/", config).unwrap();
        BlueGreen::with_parts(session, api, ScriptedRunner)
    }

    /// An API where every step up to the unit removal succeeds.
    fn healthy_api() -> ScriptedApi {
        ScriptedApi::default()
            .on("GET /apps/shop-blue", 200, app(&["shop.example.com"], &["web", "web"]))
            .on("GET /apps/shop-green", 200, app(&[], &[]))
            .on("GET /apps/shop-green", 200, app(&[], &["web", "web"]))
    }

    fn with_notifiers(webhook_endpoint: &str) -> DeployConfig {
        DeployConfig {
            monitoring: MonitoringConfig {
                api_key: Some("nr-key".to_string()),
                app_id: Some("42".to_string()),
            },
            webhook: WebhookConfig {
                endpoint: Some(webhook_endpoint.to_string()),
                payload_extras: Some("a=b".to_string()),
            },
            ..config()
        }
    }

    #[test]
    fn test_full_cutover_sequence() {
        let api = healthy_api();

        command().execute(&orchestrator(&api, config())).unwrap();

        assert_eq!(
            api.calls(),
            vec![
                "GET /apps/shop-blue",
                "GET /apps/shop-blue",
                "GET /apps/shop-green",
                "PUT /apps/shop-green/units",
                "GET /apps/shop-green",
                "DELETE /apps/shop-blue/cname",
                "POST /apps/shop-green/cname",
                "POST /apps/shop-green/env",
                "GET /apps/shop-blue",
                "DELETE /apps/shop-blue/units",
            ]
        );
    }

    #[test]
    fn test_no_cnames_aborts_before_scaling() {
        let api = ScriptedApi::default().on("GET /apps/shop-blue", 200, app(&[], &["web"]));

        assert!(command().execute(&orchestrator(&api, config())).is_err());
        assert_eq!(api.calls(), vec!["GET /apps/shop-blue"]);
    }

    #[test]
    fn test_unreadable_cnames_mentions_status() {
        let api = ScriptedApi::default().on("GET /apps/shop-blue", 401, json!(null));

        let err = command().execute(&orchestrator(&api, config())).unwrap_err();

        assert!(err.to_string().contains("could not be read"));
        assert_eq!(api.calls(), vec!["GET /apps/shop-blue"]);
    }

    #[test]
    fn test_failed_scale_up_keeps_traffic() {
        let api = ScriptedApi::default()
            .on("GET /apps/shop-blue", 200, app(&["shop.example.com"], &["web"]))
            .on("GET /apps/shop-green", 200, app(&[], &[]))
            .on("PUT /apps/shop-green/units", 500, json!(null));

        assert!(command().execute(&orchestrator(&api, config())).is_err());
        assert!(!api.calls().iter().any(|c| c.contains("/cname")));
    }

    #[test]
    fn test_failed_pre_swap_hook_keeps_traffic() {
        let api = healthy_api();
        let config = DeployConfig {
            hooks: HookSpec::from_iter([("pre-swap", "false")]),
            ..config()
        };

        assert!(command().execute(&orchestrator(&api, config)).is_err());
        assert!(api.called("PUT /apps/shop-green/units"));
        assert!(!api.calls().iter().any(|c| c.contains("/cname")));
    }

    #[test]
    fn test_failed_attach_restores_cnames() {
        let api = ScriptedApi::default()
            .on("GET /apps/shop-blue", 200, app(&["shop.example.com"], &[]))
            .on("GET /apps/shop-green", 200, app(&[], &[]))
            .on("POST /apps/shop-green/cname", 500, json!(null));

        let err = command().execute(&orchestrator(&api, config())).unwrap_err();

        assert!(err.to_string().contains("restored"));
        assert_eq!(api.calls().last().map(String::as_str), Some("POST /apps/shop-blue/cname"));
    }

    #[test]
    fn test_failed_post_swap_hook_still_cleans_up() {
        let api = healthy_api();
        let config = DeployConfig {
            hooks: HookSpec::from_iter([("pre-swap", "true"), ("post-swap", "false")]),
            ..config()
        };

        command().execute(&orchestrator(&api, config)).unwrap();

        assert!(api.called("POST /apps/shop-green/env"));
        assert!(api.called("DELETE /apps/shop-blue/units"));
    }

    #[test]
    fn test_malformed_webhook_still_cleans_up() {
        let api = healthy_api();

        command()
            .execute(&orchestrator(&api, with_notifiers("hooks.example.com/deploy")))
            .unwrap();

        assert!(api.called("POST /deployments.xml"));
        assert!(api.called("POST /apps/shop-green/env"));
        assert!(api.called("DELETE /apps/shop-blue/units"));
    }

    #[test]
    fn test_failed_notifiers_still_clean_up() {
        let api = healthy_api()
            .unreachable("POST /deployments.xml")
            .on("POST /deploy", 500, json!(null));

        command()
            .execute(&orchestrator(&api, with_notifiers("https://hooks.example.com/deploy")))
            .unwrap();

        assert!(api.called("POST /deploy"));
        assert_eq!(
            api.calls().last().map(String::as_str),
            Some("DELETE /apps/shop-blue/units")
        );
    }

    #[test]
    fn test_failed_tag_record_still_cleans_up() {
        let api = healthy_api().on("POST /apps/shop-green/env", 500, json!(null));
        command().execute(&orchestrator(&api, config())).unwrap();
        assert!(api.called("DELETE /apps/shop-blue/units"));

        let api = healthy_api().unreachable("POST /apps/shop-green/env");
        command().execute(&orchestrator(&api, config())).unwrap();
        assert!(api.called("DELETE /apps/shop-blue/units"));
    }

    #[test]
    fn test_failed_unit_removal_is_error_after_swap() {
        let api = healthy_api().on("DELETE /apps/shop-blue/units", 500, json!(null));

        let err = command().execute(&orchestrator(&api, config())).unwrap_err();

        assert!(err.to_string().contains("Cutover complete"));
        assert!(api.called("POST /apps/shop-green/cname"));
        assert!(api.called("POST /apps/shop-green/env"));
        assert_eq!(
            api.calls().last().map(String::as_str),
            Some("DELETE /apps/shop-blue/units")
        );
    }

    #[test]
    fn test_same_app_rejected() {
        let api = ScriptedApi::default();
        let mut cmd = command();
        cmd.to = cmd.from.clone();

        assert!(cmd.execute(&orchestrator(&api, config())).is_err());
        assert!(api.calls().is_empty());
    }
}
