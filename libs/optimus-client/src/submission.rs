/// Submission Lifecycle Manager
///
/// **Responsibility:**
/// Create submissions, follow the backend judge until a final verdict, and
/// serve submission views through the query cache.
///
/// **Critical Properties:**
/// - The judge owns every status transition; this module only observes them
/// - Polling stops for good once a terminal status is seen
/// - Each poll response replaces the previous state; nothing is merged
/// - Transient poll failures retry on the next tick; 401 ends the loop
/// - Unknown statuses are logged and treated as still in progress
/// - A poll that outlives `max_duration` surfaces as `StillProcessing`
/// - Stopping or dropping a [`PollHandle`] cancels with no further requests

use std::sync::Arc;
use std::time::Duration;

use optimus_common::config::ClientConfig;
use optimus_common::types::{
    Page, ProblemId, StatusSnapshot, Submission, SubmissionId, SubmissionStats, SubmissionStatus,
    SubmissionSummary, SubmitReceipt, SubmitRequest,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::api::JudgeApi;
use crate::cache::{QueryCache, QueryKey, Subscription};
use crate::error::{ApiError, ClientResult, ValidationError};
use crate::metrics;
use crate::registry::LanguageRegistry;
use crate::tags::{Mutation, Tag, TagKind, MY_LIST, STATS};

/// Floor for the poll interval; a zero period would stall the ticker.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_duration: Duration,
}

impl PollConfig {
    pub fn new(interval: Duration, max_duration: Duration) -> Self {
        Self {
            interval: interval.max(MIN_POLL_INTERVAL),
            max_duration,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.poll_interval(), config.max_poll_duration())
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

/// What the poller currently knows about a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    /// Started, no response yet.
    Waiting,
    InProgress(StatusSnapshot),
    /// Terminal verdict reached. Judging outcomes are not errors.
    Finished(StatusSnapshot),
    /// Gave up after the maximum poll duration; the judge may still finish.
    StillProcessing(Option<StatusSnapshot>),
    Unauthorized,
    /// Non-retryable API failure.
    Failed(String),
    Cancelled,
}

impl PollState {
    /// Whether the poller has stopped.
    pub fn is_final(&self) -> bool {
        !matches!(self, PollState::Waiting | PollState::InProgress(_))
    }

    pub fn snapshot(&self) -> Option<&StatusSnapshot> {
        match self {
            PollState::InProgress(s) | PollState::Finished(s) => Some(s),
            PollState::StillProcessing(s) => s.as_ref(),
            _ => None,
        }
    }
}

/// Handle to a running poll task.
///
/// Dropping the handle cancels polling, the same as closing the view that
/// owns it.
pub struct PollHandle {
    submission_id: SubmissionId,
    token: CancellationToken,
    state: watch::Receiver<PollState>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn submission_id(&self) -> SubmissionId {
        self.submission_id
    }

    pub fn state(&self) -> PollState {
        self.state.borrow().clone()
    }

    /// Stop polling. No request is issued after this returns.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Wait for the next state change. `None` once the poller has exited.
    pub async fn changed(&mut self) -> Option<PollState> {
        self.state.changed().await.ok()?;
        Some(self.state.borrow_and_update().clone())
    }

    /// Wait until the poller stops and return its final state.
    pub async fn wait(&mut self) -> PollState {
        if let Ok(state) = self.state.wait_for(PollState::is_final).await {
            return state.clone();
        }
        self.state.borrow().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Result of [`SubmissionManager::submit_and_wait`].
#[derive(Debug, Clone, PartialEq)]
pub struct Judged {
    pub receipt: SubmitReceipt,
    pub state: PollState,
    /// Full record, fetched once the verdict is terminal.
    pub detail: Option<Submission>,
}

pub struct SubmissionManager<A: JudgeApi> {
    api: Arc<A>,
    cache: QueryCache,
    registry: Arc<LanguageRegistry>,
    poll: PollConfig,
    page_limit: u32,
}

impl<A: JudgeApi> SubmissionManager<A> {
    pub fn new(
        api: Arc<A>,
        cache: QueryCache,
        registry: Arc<LanguageRegistry>,
        poll: PollConfig,
    ) -> Self {
        Self {
            api,
            cache,
            registry,
            poll,
            page_limit: ClientConfig::default().page_limit,
        }
    }

    pub fn with_page_limit(mut self, page_limit: u32) -> Self {
        self.page_limit = page_limit.max(1);
        self
    }

    /// Create a submission. Blank code and unknown languages are rejected
    /// before any request; on success every list and aggregate view that a
    /// new submission affects is invalidated.
    pub async fn submit(
        &self,
        problem_id: ProblemId,
        language: &str,
        code: &str,
    ) -> ClientResult<SubmitReceipt> {
        if code.trim().is_empty() {
            return Err(ValidationError::EmptySource.into());
        }
        let language = self
            .registry
            .resolve(language)
            .map_err(|_| ValidationError::UnknownLanguage(language.to_string()))?;

        let request = SubmitRequest {
            problem_id,
            language: language.code.clone(),
            code: code.to_string(),
        };

        let receipt = self.api.submit(&request).await.map_err(|e| {
            error!(problem_id, language = %request.language, error = %e, "Submission failed");
            e
        })?;

        metrics::SUBMISSIONS_CREATED.inc();
        info!(
            submission_id = receipt.submission_id,
            problem_id,
            language = %request.language,
            status = %receipt.status,
            "Submission created"
        );

        self.cache.apply(&Mutation::SubmissionCreated { problem_id });
        Ok(receipt)
    }

    /// Lightweight status read
    pub async fn poll_status(&self, id: SubmissionId) -> ClientResult<StatusSnapshot> {
        Ok(self.api.submission_status(id).await?)
    }

    /// Full submission record. Terminal records stay cached under
    /// `Submission:<id>`; in-progress ones are re-read on the next call.
    pub async fn get_detail(&self, id: SubmissionId) -> ClientResult<Submission> {
        let api = Arc::clone(&self.api);
        let key = QueryKey::new(format!("submissions/{}", id));
        let view = self
            .cache
            .fetch(
                key.clone(),
                vec![Tag::id(TagKind::Submission, id)],
                move || {
                    let api = Arc::clone(&api);
                    async move { api.submission(id).await }
                },
            )
            .await?;

        let detail = view.get().clone();
        drop(view);
        if !detail.status.is_terminal() {
            self.cache.mark_stale(&key);
        }
        Ok(detail)
    }

    /// Start polling `id` on the configured interval
    pub fn watch(&self, id: SubmissionId) -> PollHandle {
        let token = CancellationToken::new();
        let (tx, rx) = watch::channel(PollState::Waiting);
        let task = tokio::spawn(poll_until_final(
            Arc::clone(&self.api),
            self.cache.clone(),
            id,
            self.poll,
            token.clone(),
            tx,
        ));

        PollHandle {
            submission_id: id,
            token,
            state: rx,
            task,
        }
    }

    /// Submit, poll to a final state, and fetch the full record if judged
    pub async fn submit_and_wait(
        &self,
        problem_id: ProblemId,
        language: &str,
        code: &str,
    ) -> ClientResult<Judged> {
        let receipt = self.submit(problem_id, language, code).await?;
        let mut handle = self.watch(receipt.submission_id);
        let state = handle.wait().await;

        let detail = match state {
            PollState::Finished(_) => Some(self.get_detail(receipt.submission_id).await?),
            _ => None,
        };

        Ok(Judged {
            receipt,
            state,
            detail,
        })
    }

    /// Cached "my submissions" page, refreshed whenever `Submission:MY_LIST`
    /// is invalidated while subscribed
    pub async fn my_submissions(
        &self,
        page: u32,
    ) -> ClientResult<Subscription<Page<SubmissionSummary>>> {
        let api = Arc::clone(&self.api);
        let limit = self.page_limit;
        self.cache
            .fetch(
                format!("submissions/my?page={}&limit={}", page, limit),
                vec![
                    Tag::named(TagKind::Submission, MY_LIST),
                    Tag::list(TagKind::Submission),
                ],
                move || {
                    let api = Arc::clone(&api);
                    async move { api.my_submissions(page, limit).await }
                },
            )
            .await
    }

    /// Cached submission statistics
    pub async fn stats(&self) -> ClientResult<Subscription<SubmissionStats>> {
        let api = Arc::clone(&self.api);
        self.cache
            .fetch(
                "submissions/stats",
                vec![Tag::named(TagKind::Submission, STATS)],
                move || {
                    let api = Arc::clone(&api);
                    async move { api.submission_stats().await }
                },
            )
            .await
    }
}

#[instrument(skip(api, cache, id, config, token, state), fields(submission_id = id))]
async fn poll_until_final<A: JudgeApi>(
    api: Arc<A>,
    cache: QueryCache,
    id: SubmissionId,
    config: PollConfig,
    token: CancellationToken,
    state: watch::Sender<PollState>,
) {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(config.interval.max(MIN_POLL_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last: Option<StatusSnapshot> = None;
    let mut attempts: u32 = 0;

    debug!(interval_ms = config.interval.as_millis() as u64, "Polling started");

    let final_state = loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break PollState::Cancelled,
            _ = ticker.tick() => {}
        }

        // The first status read always happens, whatever the limit.
        if attempts > 0 && started.elapsed() >= config.max_duration {
            warn!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Judging still in progress, polling stopped"
            );
            break PollState::StillProcessing(last);
        }

        let response = tokio::select! {
            biased;
            _ = token.cancelled() => break PollState::Cancelled,
            response = api.submission_status(id) => response,
        };
        attempts += 1;

        match response {
            Ok(snapshot) if snapshot.status.is_terminal() => {
                metrics::record_poll("terminal");
                info!(
                    status = %snapshot.status,
                    passed = snapshot.test_cases_passed,
                    total = snapshot.total_test_cases,
                    "Judging finished"
                );
                break PollState::Finished(snapshot);
            }
            Ok(snapshot) => {
                if let SubmissionStatus::Unknown(raw) = &snapshot.status {
                    metrics::record_poll("unknown");
                    warn!(status = %raw, "Unrecognized submission status, still polling");
                } else {
                    metrics::record_poll("progress");
                    debug!(status = %snapshot.status, "Still judging");
                }
                last = Some(snapshot.clone());
                state.send_replace(PollState::InProgress(snapshot));
            }
            Err(ApiError::Unauthorized) => {
                metrics::record_poll("fatal");
                warn!("Session rejected while polling, stopping");
                break PollState::Unauthorized;
            }
            Err(e) if e.is_transient() => {
                metrics::record_poll("transient");
                warn!(error = %e, "Status poll failed, retrying on next tick");
            }
            Err(e) => {
                metrics::record_poll("fatal");
                error!(error = %e, "Status poll failed permanently");
                break PollState::Failed(e.to_string());
            }
        }
    };

    if matches!(final_state, PollState::Finished(_)) {
        cache.apply(&Mutation::JudgingFinished { submission_id: id });
    }
    debug!(state = ?final_state, "Polling stopped");
    state.send_replace(final_state);
}
