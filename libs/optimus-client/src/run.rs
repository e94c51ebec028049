/// Run Orchestrator - One-Shot Ephemeral Execution
///
/// **Responsibility:**
/// Send playground code to the sandbox once and show the result in the slot's
/// console.
///
/// **Slot Rules:**
/// - One slot per open editor; a new run never queues behind an old one
/// - Every run takes the next sequence number; a response is applied only if
///   its number is still the slot's current one
/// - Exactly one round trip per run, never retried (sandbox runs cost money
///   and may have side effects)
/// - Blank code or an unknown language is rejected before any network call
/// - Results are never cached or tagged

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use optimus_common::types::{RunRequest, RunResult};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::JudgeApi;
use crate::console::ConsoleBuffer;
use crate::error::{ApiError, ClientResult, ValidationError};
use crate::metrics;
use crate::registry::LanguageRegistry;

const UNREACHABLE_SANDBOX: &str = "Could not reach the code runner. Please try again.";
const SESSION_EXPIRED: &str = "Your session has expired. Please sign in again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running { seq: u64 },
    Succeeded { seq: u64 },
    Failed { seq: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The result was the newest for the slot and is now displayed.
    Completed { seq: u64, result: RunResult },
    /// A newer run started before this one answered; its result was dropped.
    Superseded { seq: u64 },
}

impl RunOutcome {
    pub fn result(&self) -> Option<&RunResult> {
        match self {
            RunOutcome::Completed { result, .. } => Some(result),
            RunOutcome::Superseded { .. } => None,
        }
    }
}

struct SlotState {
    seq: u64,
    state: RunState,
    console: ConsoleBuffer,
}

/// Execution slot for one editor
pub struct RunSlot<A: JudgeApi> {
    api: Arc<A>,
    registry: Arc<LanguageRegistry>,
    inner: Mutex<SlotState>,
}

impl<A: JudgeApi> RunSlot<A> {
    pub fn new(api: Arc<A>, registry: Arc<LanguageRegistry>) -> Self {
        Self {
            api,
            registry,
            inner: Mutex::new(SlotState {
                seq: 0,
                state: RunState::Idle,
                console: ConsoleBuffer::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run code once against the sandbox
    ///
    /// Returns `Err` only for local validation failures. Transport and API
    /// failures come back as a failed `RunResult` so they show in the console
    /// like any other failed run.
    pub async fn run(&self, request: RunRequest) -> ClientResult<RunOutcome> {
        if request.source_code.trim().is_empty() {
            return Err(ValidationError::EmptySource.into());
        }
        let language = self
            .registry
            .resolve(&request.language_code)
            .map_err(|_| ValidationError::UnknownLanguage(request.language_code.clone()))?;

        let wire = RunRequest {
            language_code: language.code.clone(),
            ..request
        };

        let seq = {
            let mut slot = self.lock();
            slot.seq += 1;
            let seq = slot.seq;
            slot.state = RunState::Running { seq };
            slot.console.begin(seq, &wire.stdin);
            seq
        };

        let request_id = Uuid::new_v4();
        info!(
            seq,
            %request_id,
            language = %wire.language_code,
            source_size = wire.source_code.len(),
            "Run started"
        );
        metrics::RUNS_ISSUED.inc();

        let start = Instant::now();
        let result = match self.api.run(&wire, request_id).await {
            Ok(result) => result,
            Err(e) => {
                warn!(seq, %request_id, error = %e, "Run request failed");
                RunResult::local_failure(failure_message(&e))
            }
        };
        let elapsed = start.elapsed();
        metrics::RUN_LATENCY.observe(elapsed.as_secs_f64());

        let mut slot = self.lock();
        if slot.seq != seq {
            debug!(seq, current = slot.seq, "Discarding superseded run result");
            metrics::RUNS_SUPERSEDED.inc();
            return Ok(RunOutcome::Superseded { seq });
        }

        slot.state = if result.success {
            RunState::Succeeded { seq }
        } else {
            RunState::Failed { seq }
        };
        slot.console.apply(seq, &result);

        info!(
            seq,
            %request_id,
            success = result.success,
            status = %result.status,
            execution_ms = result.execution_time_ms,
            round_trip_ms = elapsed.as_millis() as u64,
            "Run completed"
        );

        Ok(RunOutcome::Completed { seq, result })
    }

    pub fn state(&self) -> RunState {
        self.lock().state
    }

    /// Snapshot of what the console currently shows
    pub fn console(&self) -> ConsoleBuffer {
        self.lock().console.clone()
    }

    /// Clear the console; an in-flight run's result is then discarded too
    pub fn reset(&self) {
        let mut slot = self.lock();
        slot.seq += 1;
        slot.state = RunState::Idle;
        slot.console.clear();
    }

    pub fn current_seq(&self) -> u64 {
        self.lock().seq
    }
}

fn failure_message(error: &ApiError) -> String {
    match error {
        ApiError::Unauthorized => SESSION_EXPIRED.to_string(),
        ApiError::Api { message, .. } if !message.is_empty() => message.clone(),
        _ => UNREACHABLE_SANDBOX.to_string(),
    }
}
