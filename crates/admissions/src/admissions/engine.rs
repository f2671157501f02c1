//! Review decision engine.
//!
//! A decision is applied in three steps against a [`StatusLedger`]: look up the current row,
//! materialize an explicit `pending` row when none exists, then write the target status unless
//! the application already holds it. Callers are expected to run the steps inside a single
//! storage transaction so concurrent decisions for one student serialize.

use std::fmt;

use chrono::{DateTime, Utc};

use super::domain::{plan_transition, ApplicationStatus, Decision, StudentId, TransitionOutcome};
use super::repository::StoreError;

/// Row-level operations on the `application_status` table.
pub trait StatusLedger {
    fn current_status(&self, student_id: &StudentId)
        -> Result<Option<ApplicationStatus>, StoreError>;
    fn insert_pending(&self, student_id: &StudentId) -> Result<(), StoreError>;
    fn update_status(
        &self,
        student_id: &StudentId,
        status: ApplicationStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionStep {
    Lookup,
    InsertPending,
    Update,
    Transaction,
}

impl fmt::Display for TransitionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransitionStep::Lookup => "status lookup",
            TransitionStep::InsertPending => "pending status insert",
            TransitionStep::Update => "status update",
            TransitionStep::Transaction => "status transaction",
        };
        f.write_str(label)
    }
}

/// A failed decision, tagged with the step that aborted it.
#[derive(Debug, thiserror::Error)]
#[error("{step} failed: {source}")]
pub struct TransitionError {
    pub step: TransitionStep,
    #[source]
    pub source: StoreError,
}

impl TransitionError {
    pub fn new(step: TransitionStep, source: StoreError) -> Self {
        Self { step, source }
    }
}

impl From<StoreError> for TransitionError {
    fn from(source: StoreError) -> Self {
        Self::new(TransitionStep::Transaction, source)
    }
}

pub fn apply_transition<L>(
    ledger: &L,
    student_id: &StudentId,
    decision: Decision,
    at: DateTime<Utc>,
) -> Result<TransitionOutcome, TransitionError>
where
    L: StatusLedger + ?Sized,
{
    let current = ledger
        .current_status(student_id)
        .map_err(|err| TransitionError::new(TransitionStep::Lookup, err))?;

    let plan = plan_transition(current, decision);

    if plan.materialize_pending {
        ledger
            .insert_pending(student_id)
            .map_err(|err| TransitionError::new(TransitionStep::InsertPending, err))?;
    }

    if let Some(status) = plan.write {
        ledger
            .update_status(student_id, status, at)
            .map_err(|err| TransitionError::new(TransitionStep::Update, err))?;
    }

    Ok(plan.outcome)
}
