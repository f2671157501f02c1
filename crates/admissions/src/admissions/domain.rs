use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for enrolled students.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub String);

impl StudentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StudentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Student record as delivered by the enrollment system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    #[serde(default)]
    pub student_id: StudentId,
    #[serde(default)]
    pub student_number: Option<String>,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub middle_initial: Option<String>,
    #[serde(default)]
    pub degree_program: Option<String>,
    #[serde(default)]
    pub year_level: Option<u8>,
    #[serde(default)]
    pub gmail: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub status_enrollment: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub enrolled_units: Option<u16>,
}

impl Student {
    /// Reject records the store cannot key or display.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.student_id.0.trim().is_empty() {
            return Err(ValidationError::MissingField("student_id"));
        }
        if self.first_name.trim().is_empty() {
            return Err(ValidationError::MissingField("first_name"));
        }
        if self.last_name.trim().is_empty() {
            return Err(ValidationError::MissingField("last_name"));
        }
        Ok(())
    }
}

/// Student joined with the current application status, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicantView {
    #[serde(flatten)]
    pub student: Student,
    pub application_status: Option<ApplicationStatus>,
}

/// Student joined with the decision that placed it in a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecidedStudent {
    #[serde(flatten)]
    pub student: Student,
    pub updated_at: DateTime<Utc>,
}

/// Announcement shown on the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub user_id: i64,
}

/// Author id recorded when the request carries none.
pub const DEFAULT_POST_AUTHOR: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub user_id: Option<i64>,
}

impl NewPost {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() || self.content.trim().is_empty() {
            return Err(ValidationError::TitleAndContentRequired);
        }
        Ok(())
    }

    pub fn author(&self) -> i64 {
        self.user_id.unwrap_or(DEFAULT_POST_AUTHOR)
    }
}

/// Request payload validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Title and content are required")]
    TitleAndContentRequired,
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("search term is required")]
    EmptySearch,
}

/// Stored application states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Confirmed => "confirmed",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Terminal state requested by a reviewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Confirm,
    Reject,
}

impl Decision {
    pub const fn target(self) -> ApplicationStatus {
        match self {
            Decision::Confirm => ApplicationStatus::Confirmed,
            Decision::Reject => ApplicationStatus::Rejected,
        }
    }

    pub const fn verb(self) -> &'static str {
        match self {
            Decision::Confirm => "confirm",
            Decision::Reject => "reject",
        }
    }

    pub const fn progressive(self) -> &'static str {
        match self {
            Decision::Confirm => "confirming",
            Decision::Reject => "rejecting",
        }
    }
}

/// Result of applying a decision to an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    AlreadyInState { status: ApplicationStatus },
    Transitioned {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
}

impl TransitionOutcome {
    pub const fn changed(self) -> bool {
        matches!(self, TransitionOutcome::Transitioned { .. })
    }
}

/// Steps the store must execute to honour a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPlan {
    /// No row exists yet; an explicit pending row is written before anything else.
    pub materialize_pending: bool,
    /// Status to write, `None` when the application already sits in the target state.
    pub write: Option<ApplicationStatus>,
    pub outcome: TransitionOutcome,
}

/// Pure state machine for the review workflow.
///
/// A missing row behaves as `Pending` once materialized. Terminal states may be overwritten by
/// the opposite decision; repeating a decision is a no-op.
pub fn plan_transition(current: Option<ApplicationStatus>, decision: Decision) -> TransitionPlan {
    let materialize_pending = current.is_none();
    let from = current.unwrap_or(ApplicationStatus::Pending);
    let to = decision.target();

    if from == to {
        TransitionPlan {
            materialize_pending,
            write: None,
            outcome: TransitionOutcome::AlreadyInState { status: to },
        }
    } else {
        TransitionPlan {
            materialize_pending,
            write: Some(to),
            outcome: TransitionOutcome::Transitioned { from, to },
        }
    }
}
