// CLI commands for running and judging code on Optimus
use anyhow::{bail, Context, Result};
use optimus_client::submission::PollState;
use optimus_client::OptimusClient;
use optimus_common::types::{RunRequest, StatusSnapshot, Submission, SubmissionId, TestCaseResult};
use std::fs;
use std::io::{self, Read};
use std::path::Path;

/// Read a source file, or stdin when the path is "-"
fn read_source(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut source = String::new();
        io::stdin()
            .read_to_string(&mut source)
            .context("Failed to read source from stdin")?;
        return Ok(source);
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Language code to send. An explicit `--lang` is passed through and must
/// resolve; without one the configured default is used, falling back to the
/// first active language.
async fn pick_language(client: &OptimusClient, lang: Option<&str>) -> Result<String> {
    if let Some(lang) = lang {
        return Ok(lang.to_string());
    }
    let registry = client
        .languages()
        .await
        .context("Failed to load languages")?;
    match registry.resolve_or_default(&client.config().default_language) {
        Some(language) => Ok(language.code.clone()),
        None => bail!("The judge has no active languages"),
    }
}

/// List languages from the judge's snapshot
pub async fn list_languages(client: &OptimusClient, all: bool) -> Result<()> {
    let registry = client
        .languages()
        .await
        .context("Failed to load languages")?;

    let languages: Vec<_> = registry
        .list_languages()
        .iter()
        .filter(|l| all || l.is_active)
        .collect();

    if languages.is_empty() {
        println!("No languages available.");
        return Ok(());
    }

    println!("📋 Languages:\n");
    println!("{:<12} {:<24} {:<10} {:<8}", "CODE", "NAME", "VERSION", "ACTIVE");
    println!("{}", "─".repeat(58));
    for language in &languages {
        println!(
            "{:<12} {:<24} {:<10} {:<8}",
            language.code,
            language.display_name,
            language.version,
            if language.is_active { "yes" } else { "no" }
        );
    }
    println!("\n✅ Total: {} language(s)", languages.len());
    Ok(())
}

/// Run code once and print its output
pub async fn run_code(
    client: &OptimusClient,
    lang: Option<&str>,
    file: &Path,
    input: Option<&str>,
) -> Result<()> {
    let source = read_source(file)?;
    let language = pick_language(client, lang).await?;
    let slot = client.run_slot().await.context("Failed to load languages")?;

    let request = RunRequest::new(language, source).with_stdin(input.unwrap_or_default());
    let outcome = slot.run(request).await?;

    let Some(result) = outcome.result() else {
        bail!("Run was superseded before it finished");
    };

    print!("{}", result.stdout);
    if let Some(stderr) = result.stderr.as_deref().filter(|s| !s.is_empty()) {
        eprint!("{}", stderr);
        if !stderr.ends_with('\n') {
            eprintln!();
        }
    }
    eprintln!("\n⏱  {} ({} ms)", result.status, result.execution_time_ms);

    if !result.success {
        bail!("Run failed with status {}", result.status);
    }
    Ok(())
}

/// Submit a solution, then follow judging unless `no_wait`
pub async fn submit(
    client: &OptimusClient,
    problem_id: u64,
    lang: Option<&str>,
    file: &Path,
    no_wait: bool,
) -> Result<()> {
    let source = read_source(file)?;
    let language = pick_language(client, lang).await?;
    let manager = client
        .submissions()
        .await
        .context("Failed to load languages")?;

    let receipt = manager.submit(problem_id, &language, &source).await?;
    println!(
        "🚀 Submission {} queued ({})",
        receipt.submission_id, receipt.status
    );

    if no_wait {
        println!(
            "\n💡 Follow it with: optimus-cli status {} --follow",
            receipt.submission_id
        );
        return Ok(());
    }

    follow(client, receipt.submission_id).await
}

/// Print one status snapshot, or follow it to a final state
pub async fn status(client: &OptimusClient, id: SubmissionId, follow_up: bool) -> Result<()> {
    if follow_up {
        return follow(client, id).await;
    }

    let manager = client
        .submissions()
        .await
        .context("Failed to load languages")?;
    let snapshot = manager
        .poll_status(id)
        .await
        .with_context(|| format!("Failed to read status of submission {}", id))?;
    println!("{}", verdict_line(&snapshot));
    Ok(())
}

async fn follow(client: &OptimusClient, id: SubmissionId) -> Result<()> {
    let manager = client
        .submissions()
        .await
        .context("Failed to load languages")?;
    let mut handle = manager.watch(id);

    let mut last_line = String::new();
    let final_state = loop {
        let state = handle.state();
        if let Some(snapshot) = state.snapshot() {
            let line = verdict_line(snapshot);
            if line != last_line {
                println!("{}", line);
                last_line = line;
            }
        }
        if state.is_final() {
            break state;
        }
        if handle.changed().await.is_none() {
            break handle.state();
        }
    };

    match final_state {
        PollState::Finished(snapshot) => {
            let detail = manager.get_detail(id).await?;
            print_detail(&detail);
            if !snapshot.status.is_accepted() {
                bail!("{}", snapshot.status.user_message());
            }
            Ok(())
        }
        PollState::StillProcessing(_) => {
            println!(
                "\n⏳ Still judging. Check again with: optimus-cli status {}",
                id
            );
            Ok(())
        }
        PollState::Unauthorized => bail!("Session expired. Set OPTIMUS_TOKEN and try again"),
        PollState::Failed(message) => bail!("Polling submission {} failed: {}", id, message),
        PollState::Cancelled => bail!("Polling submission {} was cancelled", id),
        PollState::Waiting | PollState::InProgress(_) => {
            bail!("Poller for submission {} exited early", id)
        }
    }
}

/// Show a full submission record
pub async fn show(client: &OptimusClient, id: SubmissionId, json: bool) -> Result<()> {
    let manager = client
        .submissions()
        .await
        .context("Failed to load languages")?;
    let detail = manager
        .get_detail(id)
        .await
        .with_context(|| format!("Failed to load submission {}", id))?;

    if json {
        let rendered =
            serde_json::to_string_pretty(&detail).context("Failed to serialize submission")?;
        println!("{}", rendered);
    } else {
        print_detail(&detail);
    }
    Ok(())
}

/// List one page of the user's submissions
pub async fn mine(client: &OptimusClient, page: u32) -> Result<()> {
    let manager = client
        .submissions()
        .await
        .context("Failed to load languages")?;
    let view = manager
        .my_submissions(page)
        .await
        .context("Failed to load submissions")?;
    let listing = view.get();

    if listing.items.is_empty() {
        println!("No submissions yet.");
        return Ok(());
    }

    println!(
        "{:<8} {:<8} {:<24} {:<12} {:<16} {:>6}",
        "ID", "PROBLEM", "TITLE", "LANGUAGE", "STATUS", "POINTS"
    );
    println!("{}", "─".repeat(79));
    for item in &listing.items {
        println!(
            "{:<8} {:<8} {:<24} {:<12} {:<16} {:>6}",
            item.submission_id,
            item.problem_id,
            item.problem_title.as_deref().unwrap_or("-"),
            item.language,
            item.status,
            item.points_earned
        );
    }

    let pagination = &listing.pagination;
    println!(
        "\nPage {}/{} ({} total)",
        pagination.page, pagination.total_pages, pagination.total
    );
    Ok(())
}

/// Show aggregate submission counts
pub async fn stats(client: &OptimusClient) -> Result<()> {
    let manager = client
        .submissions()
        .await
        .context("Failed to load languages")?;
    let view = manager.stats().await.context("Failed to load statistics")?;
    let stats = view.get();

    println!("📊 Submissions: {}", stats.total_submissions);
    println!(
        "   Accepted:    {} ({:.1}%)",
        stats.accepted,
        stats.acceptance_rate * 100.0
    );
    for (status, count) in &stats.by_status {
        println!("   {:<22} {}", status, count);
    }
    Ok(())
}

fn verdict_line(snapshot: &StatusSnapshot) -> String {
    let mut line = format!(
        "[{}] {} - {}",
        snapshot.submission_id,
        snapshot.status,
        snapshot.status.user_message()
    );
    if snapshot.total_test_cases > 0 {
        line.push_str(&format!(
            " ({}/{} tests, {} pts)",
            snapshot.test_cases_passed, snapshot.total_test_cases, snapshot.points_earned
        ));
    }
    line
}

/// Test results in test case order; the judge reports them in completion order
fn ordered_logs(detail: &Submission) -> Vec<&TestCaseResult> {
    let mut logs: Vec<_> = detail.execution_logs.iter().flatten().collect();
    logs.sort_by_key(|log| log.test_case_id);
    logs
}

fn print_detail(detail: &Submission) {
    println!(
        "\n📄 Submission {} · problem {} · {}",
        detail.submission_id, detail.problem_id, detail.language
    );
    println!(
        "   {} - {}/{} tests, {} pts, {} ms, {} KB",
        detail.status,
        detail.test_cases_passed,
        detail.total_test_cases,
        detail.points_earned,
        detail.execution_time_ms,
        detail.memory_used_kb
    );
    if let Some(submitted_at) = detail.submitted_at {
        println!("   Submitted {}", submitted_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(message) = detail.error_message.as_deref() {
        println!("\n{}", message);
    }

    let logs = ordered_logs(detail);
    if logs.is_empty() {
        return;
    }
    println!();
    for log in logs {
        let marker = if log.status.is_accepted() { "✅" } else { "❌" };
        let sample = if log.is_sample { " (sample)" } else { "" };
        println!(
            "  {} test {}{}: {} in {} ms",
            marker, log.test_case_id, sample, log.status, log.execution_time_ms
        );
        if log.is_sample && !log.status.is_accepted() {
            if let Some(expected) = log.expected_output.as_deref() {
                println!("      expected: {}", expected.trim_end());
            }
            if let Some(actual) = log.actual_output.as_deref() {
                println!("      actual:   {}", actual.trim_end());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optimus_common::types::SubmissionStatus;

    fn snapshot(status: SubmissionStatus, passed: u32, total: u32) -> StatusSnapshot {
        StatusSnapshot {
            submission_id: 12,
            status,
            test_cases_passed: passed,
            total_test_cases: total,
            points_earned: passed * 10,
            execution_time_ms: 0,
            memory_used_kb: 0,
            error_message: None,
        }
    }

    #[test]
    fn test_verdict_line_with_progress() {
        let line = verdict_line(&snapshot(SubmissionStatus::Running, 2, 5));
        assert_eq!(
            line,
            "[12] RUNNING - Running against test cases (2/5 tests, 20 pts)"
        );
    }

    #[test]
    fn test_verdict_line_before_tests_known() {
        let line = verdict_line(&snapshot(SubmissionStatus::Pending, 0, 0));
        assert_eq!(line, "[12] PENDING - Waiting in the judge queue");
    }

    #[test]
    fn test_logs_sorted_by_test_case() {
        let log = |id: u64| TestCaseResult {
            test_case_id: id,
            status: SubmissionStatus::Accepted,
            stdout: String::new(),
            stderr: String::new(),
            expected_output: None,
            actual_output: None,
            execution_time_ms: 1,
            memory_used_kb: 0,
            is_sample: false,
        };
        let detail = Submission {
            submission_id: 12,
            user_id: 1,
            problem_id: 3,
            language: "python".into(),
            source_code: "print(1)".into(),
            status: SubmissionStatus::Accepted,
            execution_time_ms: 1,
            memory_used_kb: 0,
            points_earned: 30,
            test_cases_passed: 3,
            total_test_cases: 3,
            error_message: None,
            execution_logs: Some(vec![log(3), log(1), log(2)]),
            submitted_at: None,
        };

        let ids: Vec<_> = ordered_logs(&detail).iter().map(|l| l.test_case_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
