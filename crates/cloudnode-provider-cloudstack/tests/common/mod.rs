//! Test doubles for the CloudStack driver
//!
//! `ScriptedTransport` answers requests from a script keyed by `command`
//! (optionally narrowed by one more parameter) and records every request it
//! sees, so tests can check both results and the exact calls made.

#![allow(dead_code)]

use async_trait::async_trait;
use cloudnode_core::{CloudStackConfig, Error, HttpResponse, HttpTransport, Params, Result};
use cloudnode_provider_cloudstack::{
    CloudStackDriver, Connection, PollPolicy, RequestProtocol, Signer,
};
use serde_json::{Map, Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_API_KEY: &str = "test-api-key";
pub const TEST_SECRET_KEY: &str = "test-secret-key";

struct Route {
    command: String,
    matcher: Option<(String, String)>,
    /// Responses served in order; the last one repeats
    responses: VecDeque<HttpResponse>,
}

impl Route {
    fn matches(&self, params: &[(String, String)]) -> bool {
        if param(params, "command") != Some(self.command.as_str()) {
            return false;
        }
        match &self.matcher {
            Some((key, value)) => param(params, key) == Some(value.as_str()),
            None => true,
        }
    }

    fn next(&mut self) -> HttpResponse {
        if self.responses.len() > 1 {
            self.responses.pop_front().unwrap()
        } else {
            self.responses.front().cloned().unwrap()
        }
    }
}

/// Look up a parameter by key
pub fn param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Transport serving canned responses per command
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<Params>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn add_route(&self, command: &str, matcher: Option<(&str, &str)>, responses: Vec<HttpResponse>) {
        assert!(!responses.is_empty(), "route for {} needs a response", command);
        self.routes.lock().unwrap().push(Route {
            command: command.to_string(),
            matcher: matcher.map(|(k, v)| (k.to_string(), v.to_string())),
            responses: responses.into(),
        });
    }

    /// Answer every `command` request with `body`
    pub fn on(&self, command: &str, body: Value) -> &Self {
        self.add_route(command, None, vec![HttpResponse::ok(body.to_string())]);
        self
    }

    /// Answer `command` requests carrying `key=value` with `body`
    pub fn on_with(&self, command: &str, key: &str, value: &str, body: Value) -> &Self {
        self.add_route(
            command,
            Some((key, value)),
            vec![HttpResponse::ok(body.to_string())],
        );
        self
    }

    /// Answer successive `command` requests carrying `key=value` with `bodies`
    pub fn on_sequence(&self, command: &str, key: &str, value: &str, bodies: Vec<Value>) -> &Self {
        self.add_route(
            command,
            Some((key, value)),
            bodies
                .into_iter()
                .map(|b| HttpResponse::ok(b.to_string()))
                .collect(),
        );
        self
    }

    /// Answer every `command` request with a raw status and body
    pub fn on_raw(&self, command: &str, status: u16, body: &str) -> &Self {
        self.add_route(command, None, vec![HttpResponse::new(status, body)]);
        self
    }

    /// Script an asynchronous command: submission returns `job_id`, and
    /// polling that job returns `polls` in order
    pub fn on_job(&self, command: &str, job_id: &str, polls: Vec<Value>) -> &Self {
        self.on(command, sync_response(command, json!({ "jobid": job_id })));
        self.on_sequence(
            "queryAsyncJobResult",
            "jobid",
            job_id,
            polls
                .into_iter()
                .map(|p| sync_response("queryAsyncJobResult", p))
                .collect(),
        );
        self
    }

    /// Every request seen so far, in order
    pub fn requests(&self) -> Vec<Params> {
        self.requests.lock().unwrap().clone()
    }

    /// The `command` of every request seen so far, in order
    pub fn commands(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|p| param(p, "command").map(str::to_string))
            .collect()
    }

    /// Number of requests for `command`
    pub fn count(&self, command: &str) -> usize {
        self.commands().iter().filter(|c| *c == command).count()
    }

    /// Requests for `command`, in order
    pub fn requests_for(&self, command: &str) -> Vec<Params> {
        self.requests()
            .into_iter()
            .filter(|p| param(p, "command") == Some(command))
            .collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, params: &[(String, String)]) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(params.to_vec());

        let mut routes = self.routes.lock().unwrap();
        // Later routes win so tests can override a default
        match routes.iter_mut().rev().find(|r| r.matches(params)) {
            Some(route) => Ok(route.next()),
            None => Err(Error::http(format!(
                "no scripted response for {:?}",
                param(params, "command")
            ))),
        }
    }

    fn endpoint(&self) -> &str {
        "http://cloudstack.test/client/api"
    }
}

/// Wrap `payload` the way CloudStack does: `{"<command>response": payload}`
pub fn sync_response(command: &str, payload: Value) -> Value {
    let mut map = Map::new();
    map.insert(format!("{}response", command.to_lowercase()), payload);
    Value::Object(map)
}

/// Poll response for a job still running
pub fn pending() -> Value {
    json!({ "jobstatus": 0 })
}

/// Poll response for a successful job
pub fn succeeded(result: Value) -> Value {
    json!({ "jobstatus": 1, "jobresult": result })
}

/// Poll response for a failed job
pub fn failed(errortext: &str) -> Value {
    json!({
        "jobstatus": 2,
        "jobresultcode": 530,
        "jobresult": { "errorcode": 530, "errortext": errortext }
    })
}

/// Polling fast enough for tests
pub fn fast_poll() -> PollPolicy {
    PollPolicy::new(Duration::from_millis(5), None)
}

pub fn test_config() -> CloudStackConfig {
    CloudStackConfig::new(TEST_API_KEY, TEST_SECRET_KEY, "cloudstack.test")
}

pub fn protocol(transport: Arc<ScriptedTransport>) -> RequestProtocol {
    protocol_with(transport, fast_poll())
}

pub fn protocol_with(transport: Arc<ScriptedTransport>, poll: PollPolicy) -> RequestProtocol {
    let connection = Connection::new(Signer::new(TEST_API_KEY, TEST_SECRET_KEY), transport);
    RequestProtocol::new(connection, poll)
}

pub fn driver(transport: Arc<ScriptedTransport>) -> CloudStackDriver {
    CloudStackDriver::with_transport(&test_config(), transport)
        .unwrap()
        .with_poll_policy(fast_poll())
}
