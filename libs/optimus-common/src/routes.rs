use crate::types::SubmissionId;

/// Backend route semantics - defines only paths, not transport logic
/// Keeps the client and any test backend from drifting apart

pub const LANGUAGES: &str = "/languages";
pub const RUN: &str = "/run";
pub const SUBMISSIONS: &str = "/submissions";
pub const MY_SUBMISSIONS: &str = "/submissions/my";
pub const SUBMISSION_STATS: &str = "/submissions/stats";

/// Path of the full submission record
pub fn submission_path(id: SubmissionId) -> String {
    format!("{}/{}", SUBMISSIONS, id)
}

/// Path of the lightweight status snapshot used for polling
pub fn submission_status_path(id: SubmissionId) -> String {
    format!("{}/{}/status", SUBMISSIONS, id)
}

/// Paginated "my submissions" path with query string
pub fn my_submissions_path(page: u32, limit: u32) -> String {
    format!("{}?page={}&limit={}", MY_SUBMISSIONS, page, limit)
}

/// Join a base URL and a route without doubling or dropping the slash
pub fn join(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_paths() {
        assert_eq!(submission_path(101), "/submissions/101");
        assert_eq!(submission_status_path(101), "/submissions/101/status");
    }

    #[test]
    fn test_my_submissions_query() {
        assert_eq!(my_submissions_path(2, 20), "/submissions/my?page=2&limit=20");
    }

    #[test]
    fn test_join_normalizes_slashes() {
        assert_eq!(join("http://h/api/", "/run"), "http://h/api/run");
        assert_eq!(join("http://h/api", "run"), "http://h/api/run");
    }
}
