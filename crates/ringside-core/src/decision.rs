//! Decision client trait and deadline-bounded dispatch.
//!
//! The [`DecisionClient`] trait is the boundary to the external decision
//! service: it gets an [`EventContext`] and returns an untrusted
//! [`AgentActionResponse`]. Clients are not trusted to honour the timeout
//! they are given; [`dispatch`] wraps every call in a hard deadline. When
//! the deadline passes the call's future is dropped, which cancels it, and
//! anything it would have returned is lost.
//!
//! A service error is retried while the deadline still has time left and
//! the attempt budget allows. A timeout is never retried.

use core::future::Future;
use core::time::Duration;

use ringside_types::{AgentActionResponse, AgentId, EventContext, RequestId, RequestStatus};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use crate::pending::PendingQueue;

/// Errors a decision client can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecisionError {
    /// The agent did not respond within the deadline.
    #[error("agent {agent_id} timed out (deadline: {deadline_ms}ms)")]
    Timeout {
        /// The agent that timed out.
        agent_id: AgentId,
        /// The deadline in milliseconds.
        deadline_ms: u64,
    },

    /// The decision service failed or refused the call.
    #[error("decision service error: {message}")]
    Service {
        /// Description of the error.
        message: String,
    },

    /// The service answered with something that is not a response.
    #[error("malformed decision response: {message}")]
    Malformed {
        /// What could not be understood.
        message: String,
    },
}

impl DecisionError {
    /// Shorthand for a [`DecisionError::Service`].
    pub fn service(message: impl Into<String>) -> Self {
        Self::Service {
            message: message.into(),
        }
    }
}

/// How one decision call resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionOutcome {
    /// The service answered in time.
    Success(AgentActionResponse),
    /// The deadline passed first.
    Timeout,
    /// The service failed and no attempts or time remained.
    ServiceError(String),
}

/// A source of agent decisions.
///
/// Implementations may take as long as they like; the scheduler enforces
/// the deadline. `timeout` is the time left, passed so that clients with
/// their own transport timeouts can set them sensibly.
pub trait DecisionClient: Send + Sync {
    /// Ask the agent described by `context` to pick an action.
    fn decide(
        &self,
        context: &EventContext,
        timeout: Duration,
    ) -> impl Future<Output = Result<AgentActionResponse, DecisionError>> + Send;
}

/// A client with nothing behind it: every call fails immediately, so every
/// choice comes from the fallback policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubDecisionClient;

impl StubDecisionClient {
    /// Create a stub client.
    pub const fn new() -> Self {
        Self
    }
}

impl DecisionClient for StubDecisionClient {
    async fn decide(
        &self,
        _context: &EventContext,
        _timeout: Duration,
    ) -> Result<AgentActionResponse, DecisionError> {
        Err(DecisionError::service("no decision service configured"))
    }
}

/// Longest deadline [`dispatch`] will honour (a year); longer timeouts are
/// capped.
const MAX_DEADLINE: Duration = Duration::from_secs(31_536_000);

/// Deadline and attempt budget for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Hard deadline covering every attempt.
    pub timeout: Duration,
    /// Attempts allowed within the deadline.
    pub max_attempts: u32,
}

/// The result of [`dispatch`]: the final outcome plus what went wrong on
/// the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    /// How the call finally resolved.
    pub outcome: DecisionOutcome,
    /// Attempts started.
    pub attempts: u32,
    /// One message per failed attempt.
    pub failures: Vec<String>,
}

/// Ask `client` for a decision under a hard deadline, retrying service
/// errors while time and attempts remain.
///
/// The pending entry for `request_id` is kept up to date with the attempt
/// count and status; removing it is the caller's job.
pub async fn dispatch<D: DecisionClient>(
    client: &D,
    context: &EventContext,
    policy: RetryPolicy,
    pending: &PendingQueue,
    request_id: RequestId,
) -> Dispatched {
    let agent_id = context.requesting_agent_id;
    let timeout = policy.timeout.min(MAX_DEADLINE);
    let deadline_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    let start = Instant::now();
    let deadline = start.checked_add(timeout).unwrap_or(start);

    let mut attempts: u32 = 0;
    let mut failures = Vec::new();

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            let err = DecisionError::Timeout {
                agent_id,
                deadline_ms,
            };
            failures.push(err.to_string());
            return Dispatched {
                outcome: DecisionOutcome::Timeout,
                attempts,
                failures,
            };
        }

        attempts = attempts.saturating_add(1);
        pending.update(request_id, attempts, RequestStatus::InFlight);
        debug!(agent_id = %agent_id, attempt = attempts, "dispatching decision call");

        match timeout_at(deadline, client.decide(context, remaining)).await {
            Ok(Ok(response)) => {
                return Dispatched {
                    outcome: DecisionOutcome::Success(response),
                    attempts,
                    failures,
                };
            }
            Ok(Err(err)) => {
                warn!(
                    agent_id = %agent_id,
                    attempt = attempts,
                    error = %err,
                    "decision call failed"
                );
                let timed_out = matches!(err, DecisionError::Timeout { .. });
                failures.push(err.to_string());
                if timed_out {
                    return Dispatched {
                        outcome: DecisionOutcome::Timeout,
                        attempts,
                        failures,
                    };
                }
                if attempts >= policy.max_attempts {
                    return Dispatched {
                        outcome: DecisionOutcome::ServiceError(err.to_string()),
                        attempts,
                        failures,
                    };
                }
                pending.update(request_id, attempts, RequestStatus::AwaitingRetry);
            }
            Err(_elapsed) => {
                let err = DecisionError::Timeout {
                    agent_id,
                    deadline_ms,
                };
                warn!(agent_id = %agent_id, attempt = attempts, "decision deadline exceeded");
                failures.push(err.to_string());
                return Dispatched {
                    outcome: DecisionOutcome::Timeout,
                    attempts,
                    failures,
                };
            }
        }
    }
}
