use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::admissions::clock::Clock;
use crate::admissions::domain::{
    ApplicantView, ApplicationStatus, DecidedStudent, Decision, NewPost, Post, Student, StudentId,
    TransitionOutcome,
};
use crate::admissions::engine::{StatusLedger, TransitionError, TransitionStep};
use crate::admissions::export::SpreadsheetExporter;
use crate::admissions::repository::{
    AdmissionsRepository, GroupCount, MonthlyDecisions, StoreError,
};
use crate::admissions::service::AdmissionsService;
use crate::admissions::sqlite::SqliteAdmissionsStore;

pub(super) fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn student(id: &str, number: &str, year_level: u8, program: &str) -> Student {
    Student {
        student_id: StudentId::from(id),
        student_number: Some(number.to_string()),
        first_name: format!("First-{id}"),
        last_name: format!("Last-{id}"),
        middle_initial: Some("Q".to_string()),
        degree_program: Some(program.to_string()),
        year_level: Some(year_level),
        gmail: Some(format!("{id}@gmail.com")),
        phone_number: Some("09171234567".to_string()),
        status_enrollment: Some("regular".to_string()),
        zip_code: Some("1101".to_string()),
        enrolled_units: Some(21),
    }
}

/// Clock returning a settable instant.
pub(super) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(super) fn starting_at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub(super) fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().expect("clock mutex poisoned") = now;
    }

    pub(super) fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().expect("clock mutex poisoned");
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

pub(super) fn memory_store() -> Arc<SqliteAdmissionsStore> {
    Arc::new(SqliteAdmissionsStore::open_in_memory().expect("in-memory store opens"))
}

pub(super) async fn seeded_store(students: &[Student]) -> Arc<SqliteAdmissionsStore> {
    let store = memory_store();
    for student in students {
        store
            .insert_student(student.clone())
            .await
            .expect("seed student");
    }
    store
}

pub(super) fn build_service<R>(
    repository: Arc<R>,
    clock: Arc<ManualClock>,
    export_dir: &Path,
) -> AdmissionsService<R>
where
    R: AdmissionsRepository + 'static,
{
    AdmissionsService::with_clock(repository, SpreadsheetExporter::new(export_dir), clock)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum LedgerCall {
    Lookup,
    InsertPending,
    Update(ApplicationStatus),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct LedgerRow {
    pub(super) status: ApplicationStatus,
    pub(super) updated_at: Option<DateTime<Utc>>,
}

/// In-memory ledger that records each call and can fail a chosen step.
#[derive(Default)]
pub(super) struct MemoryLedger {
    pub(super) rows: Mutex<HashMap<StudentId, LedgerRow>>,
    pub(super) calls: Mutex<Vec<LedgerCall>>,
    pub(super) fail_on: Option<TransitionStep>,
}

impl MemoryLedger {
    pub(super) fn failing(step: TransitionStep) -> Self {
        Self {
            fail_on: Some(step),
            ..Self::default()
        }
    }

    pub(super) fn with_row(id: &str, status: ApplicationStatus, at: DateTime<Utc>) -> Self {
        let ledger = Self::default();
        ledger.rows.lock().expect("rows mutex poisoned").insert(
            StudentId::from(id),
            LedgerRow {
                status,
                updated_at: Some(at),
            },
        );
        ledger
    }

    pub(super) fn row(&self, id: &str) -> Option<LedgerRow> {
        self.rows
            .lock()
            .expect("rows mutex poisoned")
            .get(&StudentId::from(id))
            .cloned()
    }

    pub(super) fn calls(&self) -> Vec<LedgerCall> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }

    fn record(&self, call: LedgerCall, step: TransitionStep) -> Result<(), StoreError> {
        self.calls.lock().expect("calls mutex poisoned").push(call);
        if self.fail_on == Some(step) {
            return Err(StoreError::Database(format!("injected {step} failure")));
        }
        Ok(())
    }
}

impl StatusLedger for MemoryLedger {
    fn current_status(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<ApplicationStatus>, StoreError> {
        self.record(LedgerCall::Lookup, TransitionStep::Lookup)?;
        Ok(self
            .rows
            .lock()
            .expect("rows mutex poisoned")
            .get(student_id)
            .map(|row| row.status))
    }

    fn insert_pending(&self, student_id: &StudentId) -> Result<(), StoreError> {
        self.record(LedgerCall::InsertPending, TransitionStep::InsertPending)?;
        let mut rows = self.rows.lock().expect("rows mutex poisoned");
        if rows.contains_key(student_id) {
            return Err(StoreError::Database("duplicate status row".to_string()));
        }
        rows.insert(
            student_id.clone(),
            LedgerRow {
                status: ApplicationStatus::Pending,
                updated_at: None,
            },
        );
        Ok(())
    }

    fn update_status(
        &self,
        student_id: &StudentId,
        status: ApplicationStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.record(LedgerCall::Update(status), TransitionStep::Update)?;
        let mut rows = self.rows.lock().expect("rows mutex poisoned");
        let row = rows
            .get_mut(student_id)
            .ok_or_else(|| StoreError::MissingStatusRow(student_id.clone()))?;
        row.status = status;
        row.updated_at = Some(at);
        Ok(())
    }
}

/// Repository whose every call fails; transitions fail at the configured step.
pub(super) struct UnavailableRepository {
    pub(super) transition_step: TransitionStep,
}

impl UnavailableRepository {
    pub(super) fn failing_at(step: TransitionStep) -> Arc<Self> {
        Arc::new(Self {
            transition_step: step,
        })
    }

    fn offline() -> StoreError {
        StoreError::Unavailable("database offline".to_string())
    }
}

#[async_trait]
impl AdmissionsRepository for UnavailableRepository {
    async fn insert_student(&self, _student: Student) -> Result<Student, StoreError> {
        Err(Self::offline())
    }

    async fn insert_post(
        &self,
        _post: NewPost,
        _created_at: DateTime<Utc>,
    ) -> Result<Post, StoreError> {
        Err(Self::offline())
    }

    async fn recent_posts(&self) -> Result<Vec<Post>, StoreError> {
        Err(Self::offline())
    }

    async fn unreviewed(&self) -> Result<Vec<ApplicantView>, StoreError> {
        Err(Self::offline())
    }

    async fn search_unreviewed(&self, _term: &str) -> Result<Vec<ApplicantView>, StoreError> {
        Err(Self::offline())
    }

    async fn decided(&self, _decision: Decision) -> Result<Vec<DecidedStudent>, StoreError> {
        Err(Self::offline())
    }

    async fn confirmed_by_year_level(&self) -> Result<Vec<GroupCount<Option<u8>>>, StoreError> {
        Err(Self::offline())
    }

    async fn confirmed_by_degree_program(
        &self,
    ) -> Result<Vec<GroupCount<Option<String>>>, StoreError> {
        Err(Self::offline())
    }

    async fn decisions_by_month(&self) -> Result<Vec<MonthlyDecisions>, StoreError> {
        Err(Self::offline())
    }

    async fn transition(
        &self,
        _student_id: &StudentId,
        _decision: Decision,
        _at: DateTime<Utc>,
    ) -> Result<TransitionOutcome, TransitionError> {
        Err(TransitionError::new(self.transition_step, Self::offline()))
    }
}
