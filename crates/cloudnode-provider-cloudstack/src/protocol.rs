//! Synchronous and asynchronous request protocols
//!
//! ## Synchronous
//!
//! `command=<name>` is added to the parameters and the decoded body must
//! contain `<lowercased name>response`. The object under that key is the
//! result.
//!
//! ## Asynchronous
//!
//! The command is submitted synchronously and answers with a `jobid`. The
//! job is then polled with `queryAsyncJobResult`:
//!
//! ```text
//!             jobstatus == 0
//!            ┌──────────────┐
//!            ▼              │ sleep(interval)
//!   submit ─► PENDING ──────┘
//!               │
//!               ├── jobstatus == 1 ──► SUCCEEDED (jobresult)
//!               └── jobstatus == 2 ──► FAILED    (full poll response)
//! ```
//!
//! Polling is unbounded unless the [`PollPolicy`] sets a timeout. Every wait
//! can be cancelled with a [`CancellationToken`], and independent jobs can be
//! polled concurrently with [`RequestProtocol::spawn_async_request`].

use crate::connection::{Connection, DRIVER_NAME};
use crate::schema::{self, JobStatusCode, JobSubmission};
use cloudnode_core::{Error, Params, PollConfig, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Command used to poll asynchronous jobs
pub const QUERY_JOB_COMMAND: &str = "queryAsyncJobResult";

/// How asynchronous jobs are polled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between polls
    pub interval: Duration,
    /// Upper bound on the total wait; `None` waits forever
    pub timeout: Option<Duration>,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Option<Duration>) -> Self {
        Self { interval, timeout }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&PollConfig::default())
    }
}

impl From<&PollConfig> for PollPolicy {
    fn from(config: &PollConfig) -> Self {
        Self {
            interval: config.interval(),
            timeout: config.timeout(),
        }
    }
}

/// State of a job as reported by `jobstatus`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed,
}

impl JobStatus {
    /// Map a `jobstatus` code; `None` for codes CloudStack does not define
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(JobStatus::Pending),
            1 => Some(JobStatus::Succeeded),
            2 => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

/// Terminal result of an asynchronous job
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// The job succeeded; `result` is its `jobresult`
    Succeeded { job_id: String, result: Value },
    /// The job failed; `payload` is the full poll response
    Failed { job_id: String, payload: Value },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }

    pub fn job_id(&self) -> &str {
        match self {
            JobOutcome::Succeeded { job_id, .. } | JobOutcome::Failed { job_id, .. } => job_id,
        }
    }

    /// `(success, result-or-failure-payload)`
    pub fn into_parts(self) -> (bool, Value) {
        match self {
            JobOutcome::Succeeded { result, .. } => (true, result),
            JobOutcome::Failed { payload, .. } => (false, payload),
        }
    }

    /// The job result, or [`Error::JobFailed`] for a failed job
    pub fn into_result(self, command: &str) -> Result<Value> {
        match self {
            JobOutcome::Succeeded { result, .. } => Ok(result),
            JobOutcome::Failed { job_id, payload } => {
                Err(Error::job_failed(command, job_id, payload))
            }
        }
    }
}

/// Request protocol over a signed [`Connection`]
///
/// Cheap to clone; clones share the connection.
#[derive(Debug, Clone)]
pub struct RequestProtocol {
    connection: Arc<Connection>,
    poll: PollPolicy,
}

impl RequestProtocol {
    pub fn new(connection: Connection, poll: PollPolicy) -> Self {
        Self {
            connection: Arc::new(connection),
            poll,
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Issue `command` and return the object under `<command>response`
    pub async fn sync_request(&self, command: &str, mut params: Params) -> Result<Value> {
        params.push(("command".to_string(), command.to_string()));
        debug!("Sending {} to {}", command, self.connection.endpoint());

        let reply = self.connection.request(params).await?;
        let key = format!("{}response", command.to_lowercase());

        match reply.value {
            Value::Object(mut map) if map.contains_key(&key) => {
                Ok(map.remove(&key).unwrap_or(Value::Null))
            }
            _ => Err(Error::malformed(
                "Unknown response format",
                reply.body,
                DRIVER_NAME,
            )),
        }
    }

    /// [`RequestProtocol::sync_request`] decoded into a response schema
    pub async fn sync_call<T: DeserializeOwned>(&self, command: &str, params: Params) -> Result<T> {
        let value = self.sync_request(command, params).await?;
        schema::decode(command, value)
    }

    /// Submit `command` as a job and poll it to completion
    pub async fn async_request(&self, command: &str, params: Params) -> Result<JobOutcome> {
        self.async_request_with_cancel(command, params, &CancellationToken::new())
            .await
    }

    /// [`RequestProtocol::async_request`] that gives up when `cancel` fires
    ///
    /// Cancellation is observed both while submitting and between polls.
    pub async fn async_request_with_cancel(
        &self,
        command: &str,
        params: Params,
        cancel: &CancellationToken,
    ) -> Result<JobOutcome> {
        let submitted = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(Error::cancelled(format!("{} cancelled before submission", command)));
            }
            result = self.sync_request(command, params) => result?,
        };

        let submission: JobSubmission = schema::decode(command, submitted)?;
        debug!("Submitted {} as job {}", command, submission.jobid);

        self.wait_for_job(command, &submission.jobid, cancel).await
    }

    /// Run [`RequestProtocol::async_request_with_cancel`] on its own task
    pub fn spawn_async_request(
        &self,
        command: impl Into<String>,
        params: Params,
        cancel: CancellationToken,
    ) -> JoinHandle<Result<JobOutcome>> {
        let protocol = self.clone();
        let command = command.into();
        tokio::spawn(async move {
            protocol
                .async_request_with_cancel(&command, params, &cancel)
                .await
        })
    }

    /// Poll an already submitted job until it reaches a terminal state
    pub async fn wait_for_job(
        &self,
        command: &str,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<JobOutcome> {
        let started = Instant::now();

        let bounded = async {
            match self.poll.timeout {
                Some(limit) => {
                    match tokio::time::timeout(limit, self.poll_until_done(command, job_id)).await {
                        Ok(outcome) => outcome,
                        Err(_) => Err(Error::Timeout {
                            job_id: job_id.to_string(),
                            elapsed_secs: started.elapsed().as_secs(),
                        }),
                    }
                }
                None => self.poll_until_done(command, job_id).await,
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                Err(Error::cancelled(format!("job {} for {}", job_id, command)))
            }
            outcome = bounded => outcome,
        }
    }

    async fn poll_until_done(&self, command: &str, job_id: &str) -> Result<JobOutcome> {
        let mut polls: u64 = 0;

        loop {
            polls += 1;
            let mut response = self
                .sync_request(
                    QUERY_JOB_COMMAND,
                    vec![("jobid".to_string(), job_id.to_string())],
                )
                .await?;

            let status: JobStatusCode = schema::decode(QUERY_JOB_COMMAND, response.clone())?;
            let code = status.jobstatus.unwrap_or(0);

            match JobStatus::from_code(code) {
                Some(JobStatus::Pending) => {
                    debug!("Job {} ({}) pending after {} poll(s)", job_id, command, polls);
                    tokio::time::sleep(self.poll.interval).await;
                }
                Some(JobStatus::Succeeded) => {
                    let result = match response.get_mut("jobresult") {
                        Some(result) => result.take(),
                        None => {
                            return Err(Error::malformed(
                                format!("Job {} succeeded without jobresult", job_id),
                                response.to_string(),
                                DRIVER_NAME,
                            ));
                        }
                    };
                    debug!("Job {} ({}) succeeded after {} poll(s)", job_id, command, polls);
                    return Ok(JobOutcome::Succeeded {
                        job_id: job_id.to_string(),
                        result,
                    });
                }
                Some(JobStatus::Failed) => {
                    warn!("Job {} ({}) failed: {}", job_id, command, response);
                    return Ok(JobOutcome::Failed {
                        job_id: job_id.to_string(),
                        payload: response,
                    });
                }
                None => {
                    return Err(Error::malformed(
                        format!("Unknown job status {} for job {}", code, job_id),
                        response.to_string(),
                        DRIVER_NAME,
                    ));
                }
            }
        }
    }
}
