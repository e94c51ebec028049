/// End-to-end scenarios for the execution and submission lifecycle
///
/// These tests drive the public client against the scripted backend:
/// 1. Submit, poll through RUNNING to ACCEPTED, then read the full record
/// 2. Two racing runs on one slot: the newer result always wins
/// 3. Judging completion refreshes subscribed list and stats views
/// 4. Validation failures never reach the network
/// 5. The language snapshot is fetched once per session

use std::sync::Arc;
use std::time::Duration;

use optimus_common::config::ClientConfig;
use optimus_common::types::{
    RunRequest, Submission, SubmissionId, SubmissionStats, SubmissionStatus, SubmitReceipt,
    TestCaseResult,
};

use crate::client::OptimusClient;
use crate::error::ClientError;
use crate::registry::tests::sample_languages;
use crate::run::RunOutcome;
use crate::submission::PollState;
use crate::tags::{Mutation, Tag, TagKind, MY_LIST};
use crate::testing::{page_of, run_ok, snapshot, Call, FakeApi};

/// Accepted submission whose logs arrive in judge order, not id order.
pub(crate) fn accepted_detail(id: SubmissionId, tests: u32) -> Submission {
    let execution_logs = (0..tests)
        .map(|n| TestCaseResult {
            test_case_id: (tests - n) as u64,
            status: SubmissionStatus::Accepted,
            stdout: "0\n".to_string(),
            stderr: String::new(),
            expected_output: Some("0".to_string()),
            actual_output: Some("0".to_string()),
            execution_time_ms: 2,
            memory_used_kb: 1024,
            is_sample: n == 0,
        })
        .collect();

    Submission {
        submission_id: id,
        user_id: 3,
        problem_id: 7,
        language: "cpp".to_string(),
        source_code: "int main(){return 0;}".to_string(),
        status: SubmissionStatus::Accepted,
        execution_time_ms: 4,
        memory_used_kb: 1024,
        points_earned: tests * 10,
        test_cases_passed: tests,
        total_test_cases: tests,
        error_message: None,
        execution_logs: Some(execution_logs),
        submitted_at: None,
    }
}

fn client() -> OptimusClient<FakeApi> {
    let config = ClientConfig {
        poll_interval_ms: 1_000,
        max_poll_duration_secs: 120,
        ..ClientConfig::default()
    };
    OptimusClient::with_api(FakeApi::with_languages(sample_languages()), config).unwrap()
}

fn network_calls(api: &FakeApi) -> usize {
    api.count(|c| *c != Call::ListLanguages)
}

#[tokio::test(start_paused = true)]
async fn test_submit_poll_to_accepted_then_detail() {
    let client = client();
    let api = Arc::clone(client.api());
    api.push_submit(Ok(SubmitReceipt {
        submission_id: 101,
        status: SubmissionStatus::Pending,
        message: "Submission queued".into(),
    }));
    api.push_status(Ok(snapshot(101, SubmissionStatus::Running, 0, 5)));
    api.push_status(Ok(snapshot(101, SubmissionStatus::Accepted, 5, 5)));
    api.set_detail(accepted_detail(101, 5));

    let manager = client.submissions().await.unwrap();
    let receipt = manager.submit(7, "cpp", "int main(){return 0;}").await.unwrap();
    assert_eq!(receipt.submission_id, 101);
    assert_eq!(receipt.status, SubmissionStatus::Pending);

    let mut handle = manager.watch(101);
    let first = handle.changed().await.unwrap();
    assert_eq!(first.snapshot().unwrap().status, SubmissionStatus::Running);

    let last = handle.wait().await;
    let snapshot = last.snapshot().unwrap();
    assert!(matches!(last, PollState::Finished(_)));
    assert_eq!(snapshot.status, SubmissionStatus::Accepted);
    assert_eq!(snapshot.test_cases_passed, 5);
    assert_eq!(snapshot.total_test_cases, 5);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(api.status_calls(101), 2);

    let detail = manager.get_detail(101).await.unwrap();
    assert_eq!(detail.status, SubmissionStatus::Accepted);
    let logs = detail.execution_logs.unwrap();
    assert_eq!(logs.len(), 5);
    assert_eq!(logs[0].test_case_id, 5);
}

#[tokio::test(start_paused = true)]
async fn test_racing_runs_show_newest_output() {
    let client = client();
    let api = Arc::clone(client.api());
    api.push_run(Duration::from_millis(800), Ok(run_ok("hi\n")));
    api.push_run(Duration::from_millis(50), Ok(run_ok("bye\n")));

    let slot = client.run_slot().await.unwrap();
    let (hi, bye) = tokio::join!(
        slot.run(RunRequest::new("python", "print('hi')")),
        slot.run(RunRequest::new("python", "print('bye')")),
    );

    assert!(matches!(hi.unwrap(), RunOutcome::Superseded { .. }));
    assert_eq!(bye.unwrap().result().unwrap().stdout, "bye\n");
    assert_eq!(slot.console().stdout, "bye\n");
}

#[tokio::test(start_paused = true)]
async fn test_submit_and_wait_refreshes_views() {
    let client = client();
    let api = Arc::clone(client.api());
    api.push_my_page(page_of(&[40]));
    api.push_my_page(page_of(&[41, 40]));
    api.push_stats(SubmissionStats {
        total_submissions: 1,
        accepted: 1,
        acceptance_rate: 1.0,
        by_status: Default::default(),
    });
    api.push_submit(Ok(SubmitReceipt {
        submission_id: 41,
        status: SubmissionStatus::Pending,
        message: String::new(),
    }));
    api.push_status(Ok(snapshot(41, SubmissionStatus::WrongAnswer, 2, 5)));
    let mut detail = accepted_detail(41, 5);
    detail.status = SubmissionStatus::WrongAnswer;
    api.set_detail(detail);

    let manager = client.submissions().await.unwrap();
    let mut mine = manager.my_submissions(1).await.unwrap();
    let _stats = manager.stats().await.unwrap();

    let judged = manager
        .submit_and_wait(7, "c++", "int main(){return 1;}")
        .await
        .unwrap();
    assert!(matches!(judged.state, PollState::Finished(_)));
    assert_eq!(judged.detail.unwrap().status, SubmissionStatus::WrongAnswer);

    let mut refreshed = mine.changed().await.unwrap();
    while mine.is_stale() {
        refreshed = mine.changed().await.unwrap();
    }
    assert_eq!(refreshed.items.len(), 2);
}

#[tokio::test]
async fn test_blank_input_never_reaches_network() {
    let client = client();
    let api = Arc::clone(client.api());

    let slot = client.run_slot().await.unwrap();
    assert!(slot.run(RunRequest::new("python", "")).await.unwrap_err().is_validation());

    let manager = client.submissions().await.unwrap();
    assert!(manager.submit(7, "python", "").await.unwrap_err().is_validation());

    assert_eq!(network_calls(&api), 0);
}

#[tokio::test]
async fn test_language_snapshot_fetched_once() {
    let client = client();
    let api = Arc::clone(client.api());

    let registry = client.languages().await.unwrap();
    client.run_slot().await.unwrap();
    client.submissions().await.unwrap();

    assert_eq!(api.count(|c| *c == Call::ListLanguages), 1);
    let cpp = registry.resolve("C++").unwrap();
    assert_eq!(cpp, registry.resolve("cpp").unwrap());
}

#[tokio::test]
async fn test_unsubscribed_list_goes_stale_without_refetch() {
    let client = client();
    let api = Arc::clone(client.api());
    let manager = client.submissions().await.unwrap();

    let key = manager.my_submissions(1).await.unwrap().key().clone();
    let report = client.cache().invalidate(&[Tag::named(TagKind::Submission, MY_LIST)]);

    assert_eq!(report.stale, vec![key]);
    assert!(report.refetching.is_empty());
    tokio::task::yield_now().await;
    assert_eq!(api.count(|c| matches!(c, Call::MySubmissions { .. })), 1);
}

#[tokio::test]
async fn test_external_mutation_refreshes_subscribed_list() {
    let client = client();
    let api = Arc::clone(client.api());
    api.push_my_page(page_of(&[1, 2]));
    api.push_my_page(page_of(&[1]));
    let manager = client.submissions().await.unwrap();

    let mut mine = manager.my_submissions(1).await.unwrap();
    let report = client.apply(&Mutation::ProblemDeleted { problem_id: 7 });
    assert_eq!(report.refetching.len(), 1);

    assert_eq!(mine.changed().await.unwrap().items.len(), 1);
    assert_eq!(api.count(|c| matches!(c, Call::MySubmissions { .. })), 2);
}

#[test]
fn test_invalid_config_rejected_at_construction() {
    let config = ClientConfig {
        poll_interval_ms: 0,
        ..ClientConfig::default()
    };
    let err = OptimusClient::with_api(FakeApi::new(), config).err().unwrap();
    assert!(matches!(err, ClientError::Config(message) if message.contains("poll_interval_ms")));
}
