use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use super::clock::{Clock, SystemClock};
use super::domain::{
    ApplicantView, DecidedStudent, Decision, NewPost, Post, Student, StudentId, TransitionOutcome,
    ValidationError,
};
use super::engine::TransitionError;
use super::export::{ExportError, SpreadsheetExporter};
use super::reporting::{
    acceptance_series, acceptance_visualization, degree_program_breakdown, visualization,
    year_level_breakdown, AcceptancePoint, AcceptanceVisualization, ShareBreakdown,
    VisualizationView,
};
use super::repository::{AdmissionsRepository, StoreError};

/// Service composing the repository, the spreadsheet exporter, and a clock.
pub struct AdmissionsService<R> {
    repository: Arc<R>,
    exporter: SpreadsheetExporter,
    clock: Arc<dyn Clock>,
}

impl<R> AdmissionsService<R>
where
    R: AdmissionsRepository + 'static,
{
    pub fn new(repository: Arc<R>, exporter: SpreadsheetExporter) -> Self {
        Self::with_clock(repository, exporter, Arc::new(SystemClock))
    }

    pub fn with_clock(
        repository: Arc<R>,
        exporter: SpreadsheetExporter,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            exporter,
            clock,
        }
    }

    pub async fn add_post(&self, post: NewPost) -> Result<Post, AdmissionsError> {
        post.validate()?;
        let stored = self.repository.insert_post(post, self.clock.now()).await?;
        info!(post_id = stored.id, user_id = stored.user_id, "announcement posted");
        Ok(stored)
    }

    pub async fn posts(&self) -> Result<Vec<Post>, AdmissionsError> {
        Ok(self.repository.recent_posts().await?)
    }

    pub async fn add_student(&self, student: Student) -> Result<Student, AdmissionsError> {
        student.validate()?;
        let stored = self.repository.insert_student(student).await?;
        info!(student_id = %stored.student_id, "student record added");
        Ok(stored)
    }

    pub async fn unreviewed(&self) -> Result<Vec<ApplicantView>, AdmissionsError> {
        Ok(self.repository.unreviewed().await?)
    }

    pub async fn search(&self, term: &str) -> Result<Vec<ApplicantView>, AdmissionsError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(ValidationError::EmptySearch.into());
        }
        Ok(self.repository.search_unreviewed(term).await?)
    }

    pub async fn decided(&self, decision: Decision) -> Result<Vec<DecidedStudent>, AdmissionsError> {
        Ok(self.repository.decided(decision).await?)
    }

    /// Move an application to the decision's terminal state.
    pub async fn decide(
        &self,
        student_id: &StudentId,
        decision: Decision,
    ) -> Result<TransitionOutcome, AdmissionsError> {
        let outcome = self
            .repository
            .transition(student_id, decision, self.clock.now())
            .await?;

        match outcome {
            TransitionOutcome::Transitioned { from, to } => info!(
                %student_id,
                from = from.label(),
                to = to.label(),
                "application status changed"
            ),
            TransitionOutcome::AlreadyInState { status } => info!(
                %student_id,
                status = status.label(),
                "application already in requested state"
            ),
        }

        Ok(outcome)
    }

    pub async fn visualization(&self) -> Result<VisualizationView, AdmissionsError> {
        let year_levels = self.repository.confirmed_by_year_level().await?;
        let degree_programs = self.repository.confirmed_by_degree_program().await?;
        let view = visualization(&year_levels, &degree_programs);
        if view.year_level.is_empty() {
            warn!("no confirmed students found for visualization");
        }
        Ok(view)
    }

    pub async fn year_level_shares(&self) -> Result<ShareBreakdown, AdmissionsError> {
        let counts = self.repository.confirmed_by_year_level().await?;
        Ok(year_level_breakdown(&counts))
    }

    pub async fn degree_program_shares(&self) -> Result<ShareBreakdown, AdmissionsError> {
        let counts = self.repository.confirmed_by_degree_program().await?;
        Ok(degree_program_breakdown(&counts))
    }

    pub async fn acceptance_rate(&self) -> Result<Vec<AcceptancePoint>, AdmissionsError> {
        let months = self.repository.decisions_by_month().await?;
        Ok(acceptance_series(months))
    }

    pub async fn acceptance_visualization(
        &self,
    ) -> Result<AcceptanceVisualization, AdmissionsError> {
        let series = self.acceptance_rate().await?;
        if series.is_empty() {
            warn!("no decisions available for acceptance rate visualization");
        }
        Ok(acceptance_visualization(&series))
    }

    /// Write the confirmed-students spreadsheet and return its path.
    pub async fn export_confirmed(&self) -> Result<PathBuf, AdmissionsError> {
        let confirmed = self.repository.decided(Decision::Confirm).await?;
        let rows = confirmed.len();
        let path = self.exporter.write_async(confirmed).await?;
        info!(rows, path = %path.display(), "confirmed students exported");
        Ok(path)
    }
}

/// Error raised by the admissions service.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionsError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Export(#[from] ExportError),
}
