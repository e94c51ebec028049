//! Cache tags and the mutations that declare them.
//!
//! A [`Tag`] names a class (`Submission:LIST`) or an instance
//! (`Submission:42`) of cached data. Cached views declare the tags they
//! provide; mutations declare the tags they invalidate. Neither side knows
//! about the other.

use optimus_common::types::{ProblemId, SubmissionId};
use std::fmt;

pub const LIST: &str = "LIST";
pub const MY_LIST: &str = "MY_LIST";
pub const STATS: &str = "STATS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagKind {
    Language,
    Problem,
    Submission,
    Conversation,
    ProblemConfig,
    User,
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TagKind::Language => "Language",
            TagKind::Problem => "Problem",
            TagKind::Submission => "Submission",
            TagKind::Conversation => "Conversation",
            TagKind::ProblemConfig => "ProblemConfig",
            TagKind::User => "User",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagId {
    Name(String),
    Id(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    pub kind: TagKind,
    /// `None` addresses every tag of this kind.
    pub id: Option<TagId>,
}

impl Tag {
    /// Matches every tag of `kind` when used for invalidation.
    pub fn kind(kind: TagKind) -> Self {
        Self { kind, id: None }
    }

    pub fn named(kind: TagKind, name: &str) -> Self {
        Self {
            kind,
            id: Some(TagId::Name(name.to_string())),
        }
    }

    pub fn id(kind: TagKind, id: u64) -> Self {
        Self {
            kind,
            id: Some(TagId::Id(id)),
        }
    }

    pub fn list(kind: TagKind) -> Self {
        Self::named(kind, LIST)
    }

    /// Whether invalidating `self` affects an entry that provides `provided`.
    pub fn matches(&self, provided: &Tag) -> bool {
        self.kind == provided.kind && (self.id.is_none() || self.id == provided.id)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            None => write!(f, "{}", self.kind),
            Some(TagId::Name(name)) => write!(f, "{}:{}", self.kind, name),
            Some(TagId::Id(id)) => write!(f, "{}:{}", self.kind, id),
        }
    }
}

/// A completed write, described by the tags it makes stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    SubmissionCreated { problem_id: ProblemId },
    /// The judge reached a terminal status for a submission we were watching.
    JudgingFinished { submission_id: SubmissionId },
    ProblemCreated,
    ProblemUpdated { problem_id: ProblemId },
    ProblemDeleted { problem_id: ProblemId },
    ConversationMessagePosted { problem_id: ProblemId },
    ProblemConfigUpdated { problem_id: ProblemId },
}

impl Mutation {
    pub fn tags(&self) -> Vec<Tag> {
        match *self {
            Mutation::SubmissionCreated { problem_id } => vec![
                Tag::named(TagKind::Submission, MY_LIST),
                Tag::list(TagKind::Submission),
                Tag::named(TagKind::Submission, STATS),
                Tag::list(TagKind::Problem),
                Tag::id(TagKind::Problem, problem_id),
            ],
            Mutation::JudgingFinished { submission_id } => vec![
                Tag::id(TagKind::Submission, submission_id),
                Tag::named(TagKind::Submission, MY_LIST),
                Tag::named(TagKind::Submission, STATS),
            ],
            Mutation::ProblemCreated => vec![Tag::list(TagKind::Problem)],
            Mutation::ProblemUpdated { problem_id } => vec![
                Tag::list(TagKind::Problem),
                Tag::id(TagKind::Problem, problem_id),
            ],
            Mutation::ProblemDeleted { problem_id } => vec![
                Tag::list(TagKind::Problem),
                Tag::id(TagKind::Problem, problem_id),
                Tag::id(TagKind::Conversation, problem_id),
                Tag::id(TagKind::ProblemConfig, problem_id),
                Tag::list(TagKind::Submission),
            ],
            Mutation::ConversationMessagePosted { problem_id } => {
                vec![Tag::id(TagKind::Conversation, problem_id)]
            }
            Mutation::ProblemConfigUpdated { problem_id } => vec![
                Tag::id(TagKind::ProblemConfig, problem_id),
                Tag::id(TagKind::Problem, problem_id),
            ],
        }
    }
}
