//! Student application review: status workflow, reporting queries, spreadsheet export, and the
//! admin HTTP surface.

pub mod clock;
pub mod domain;
pub mod engine;
pub mod export;
pub mod reporting;
pub mod repository;
pub mod router;
pub mod service;
pub mod sqlite;

#[cfg(test)]
mod tests;

pub use clock::{Clock, SystemClock};
pub use domain::{
    plan_transition, ApplicantView, ApplicationStatus, DecidedStudent, Decision, NewPost, Post,
    Student, StudentId, TransitionOutcome, TransitionPlan, ValidationError,
};
pub use engine::{apply_transition, StatusLedger, TransitionError, TransitionStep};
pub use export::{ExportError, SpreadsheetExporter, EXPORT_FILE_NAME};
pub use reporting::{AcceptancePoint, AcceptanceVisualization, ShareBreakdown, VisualizationView};
pub use repository::{AdmissionsRepository, GroupCount, MonthlyDecisions, StoreError};
pub use router::{admissions_router, TransitionResponse};
pub use service::{AdmissionsError, AdmissionsService};
pub use sqlite::SqliteAdmissionsStore;
