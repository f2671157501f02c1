use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    ApplicantView, DecidedStudent, Decision, NewPost, Post, Student, StudentId, TransitionOutcome,
};
use super::engine::TransitionError;

/// Count of confirmed students sharing a grouping key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount<K> {
    pub key: K,
    pub count: u64,
}

/// Decisions recorded within one calendar month (`YYYY-MM`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyDecisions {
    pub date: String,
    pub confirmed: u64,
    pub rejected: u64,
}

/// Storage abstraction shared by the HTTP layer, the CLI, and tests.
#[async_trait]
pub trait AdmissionsRepository: Send + Sync {
    async fn insert_student(&self, student: Student) -> Result<Student, StoreError>;
    async fn insert_post(&self, post: NewPost, created_at: DateTime<Utc>)
        -> Result<Post, StoreError>;
    async fn recent_posts(&self) -> Result<Vec<Post>, StoreError>;

    /// Students without a status row or with a non-terminal status.
    async fn unreviewed(&self) -> Result<Vec<ApplicantView>, StoreError>;
    /// Unreviewed students whose id or student number equals `term`.
    async fn search_unreviewed(&self, term: &str) -> Result<Vec<ApplicantView>, StoreError>;
    /// Students whose current status is the decision's target, newest decision first.
    async fn decided(&self, decision: Decision) -> Result<Vec<DecidedStudent>, StoreError>;

    async fn confirmed_by_year_level(&self) -> Result<Vec<GroupCount<Option<u8>>>, StoreError>;
    async fn confirmed_by_degree_program(
        &self,
    ) -> Result<Vec<GroupCount<Option<String>>>, StoreError>;
    /// Terminal decisions grouped by month, oldest month first.
    async fn decisions_by_month(&self) -> Result<Vec<MonthlyDecisions>, StoreError>;

    /// Apply a review decision atomically.
    async fn transition(
        &self,
        student_id: &StudentId,
        decision: Decision,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome, TransitionError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("student {0} not found")]
    UnknownStudent(StudentId),
    #[error("student {0} already exists")]
    DuplicateStudent(StudentId),
    #[error("no application status row for student {0}")]
    MissingStatusRow(StudentId),
    #[error("corrupt row: {0}")]
    CorruptRow(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
