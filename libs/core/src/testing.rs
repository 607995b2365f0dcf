//! Scripted collaborators for unit tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io;

use serde_json::json;

use crate::error::{Error, Result};
use crate::hooks::{CommandRunner, HookEnv};
use crate::transport::{HttpRequest, HttpResponse, Method, Transport};

/// Transport that records every request and replays scripted responses.
///
/// Responses are queued per `(method, path)`; the last queued response for a
/// route is repeated once the queue drains. Unscripted routes answer `200`
/// with an empty body.
#[derive(Debug, Default)]
pub struct FakeTransport {
    routes: RefCell<HashMap<(Method, String), VecDeque<HttpResponse>>>,
    requests: RefCell<Vec<HttpRequest>>,
    offline: RefCell<bool>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `method path`.
    pub fn respond(&self, method: Method, path: &str, status: u16, body: &str) {
        self.routes
            .borrow_mut()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(HttpResponse::new(status, body));
    }

    /// Queue an application descriptor for `GET /apps/{app}`.
    pub fn respond_app(&self, app: &str, cnames: &[&str], units: &[(&str, u32)]) {
        let units: Vec<_> = units
            .iter()
            .flat_map(|(process, count)| {
                (0..*count).map(move |_| json!({ "ProcessName": process }))
            })
            .collect();
        let body = json!({ "cname": cnames, "units": units });
        self.respond(Method::Get, &format!("/apps/{app}"), 200, &body.to_string());
    }

    /// Make every subsequent request fail at the connection level.
    pub fn go_offline(&self) {
        *self.offline.borrow_mut() = true;
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }

    /// Recorded requests for one route, in order.
    pub fn requests_to(&self, method: Method, path: &str) -> Vec<HttpRequest> {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.method == method && r.url.path() == path)
            .cloned()
            .collect()
    }

    /// `(method, path?query)` of every recorded request.
    pub fn calls(&self) -> Vec<(Method, String)> {
        self.requests
            .borrow()
            .iter()
            .map(|r| {
                let target = match r.url.query() {
                    Some(query) => format!("{}?{}", r.url.path(), query),
                    None => r.url.path().to_string(),
                };
                (r.method, target)
            })
            .collect()
    }
}

impl Transport for FakeTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let key = (request.method, request.url.path().to_string());
        self.requests.borrow_mut().push(request);

        if *self.offline.borrow() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }

        let mut routes = self.routes.borrow_mut();
        let response = match routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        Ok(response.unwrap_or_else(|| HttpResponse::new(200, "")))
    }
}

/// Command runner that records invocations instead of spawning processes.
#[derive(Debug)]
pub struct RecordingRunner {
    outcome: io::Result<bool>,
    runs: RefCell<Vec<(String, HookEnv)>>,
}

impl RecordingRunner {
    /// Runner whose commands all exit successfully.
    pub fn succeeding() -> Self {
        Self::with_outcome(Ok(true))
    }

    /// Runner that fails to launch anything.
    pub fn failing_to_launch() -> Self {
        Self::with_outcome(Err(io::Error::new(
            io::ErrorKind::NotFound,
            "no such file or directory",
        )))
    }

    pub fn with_outcome(outcome: io::Result<bool>) -> Self {
        Self {
            outcome,
            runs: RefCell::new(Vec::new()),
        }
    }

    pub fn runs(&self) -> Vec<(String, HookEnv)> {
        self.runs.borrow().clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &str, env: &HookEnv) -> io::Result<bool> {
        self.runs
            .borrow_mut()
            .push((command.to_string(), env.clone()));

        match &self.outcome {
            Ok(success) => Ok(*success),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        }
    }
}

/// Value of header `name` on a recorded request.
pub fn header<'a>(request: &'a HttpRequest, name: &str) -> Option<&'a str> {
    request.headers.get(name).and_then(|v| v.to_str().ok())
}

/// Build a hook environment from pairs.
pub fn env(pairs: &[(&str, &str)]) -> HookEnv {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect::<BTreeMap<_, _>>()
}
