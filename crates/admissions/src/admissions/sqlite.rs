use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{ffi, params, Connection, OptionalExtension, Row, TransactionBehavior};

use super::domain::{
    ApplicantView, ApplicationStatus, DecidedStudent, Decision, NewPost, Post, Student, StudentId,
    TransitionOutcome,
};
use super::engine::{apply_transition, StatusLedger, TransitionError, TransitionStep};
use super::repository::{AdmissionsRepository, GroupCount, MonthlyDecisions, StoreError};

const SCHEMA_SQL: &str = "
PRAGMA foreign_keys = ON;
CREATE TABLE IF NOT EXISTS students (
    student_id        TEXT PRIMARY KEY NOT NULL,
    student_number    TEXT,
    first_name        TEXT NOT NULL,
    last_name         TEXT NOT NULL,
    middle_initial    TEXT,
    degree_program    TEXT,
    year_level        INTEGER,
    gmail             TEXT,
    phone_number      TEXT,
    status_enrollment TEXT,
    zip_code          TEXT,
    enrolled_units    INTEGER
);
CREATE TABLE IF NOT EXISTS application_status (
    student_id TEXT PRIMARY KEY NOT NULL REFERENCES students(student_id),
    status     TEXT NOT NULL CHECK (status IN ('pending', 'confirmed', 'rejected')),
    updated_at TEXT
);
CREATE INDEX IF NOT EXISTS application_status_status_updated
    ON application_status (status, updated_at);
CREATE TABLE IF NOT EXISTS posts (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    title      TEXT NOT NULL,
    content    TEXT NOT NULL,
    created_at TEXT NOT NULL,
    user_id    INTEGER NOT NULL
);
";

const STUDENT_COLUMNS: &str = "s.student_id, s.student_number, s.first_name, s.last_name, \
     s.middle_initial, s.degree_program, s.year_level, s.gmail, s.phone_number, \
     s.status_enrollment, s.zip_code, s.enrolled_units";

const UNREVIEWED_FILTER: &str = "(a.status IS NULL OR a.status NOT IN ('confirmed', 'rejected'))";

/// SQLite-backed store owning a single serialized connection.
///
/// Every call acquires the connection lock on the blocking pool, executes its SQL, and releases
/// the lock before returning.
#[derive(Clone)]
pub struct SqliteAdmissionsStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAdmissionsStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|err| {
                    StoreError::Unavailable(format!("cannot create {}: {err}", parent.display()))
                })?;
            }
        }
        let conn = Connection::open(path).map_err(database)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(database)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL).map_err(database)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Close the connection. Fails if another handle to this store is still alive.
    pub fn close(self) -> Result<(), StoreError> {
        let mutex = Arc::try_unwrap(self.conn).map_err(|_| {
            StoreError::Unavailable("connection is still shared by another handle".to_string())
        })?;
        let conn = mutex
            .into_inner()
            .map_err(|err| StoreError::Unavailable(format!("connection mutex poisoned: {err}")))?;
        conn.close().map_err(|(_, err)| database(err))
    }

    async fn run<T, E, F>(&self, op: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: From<StoreError> + Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, E> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|err| {
                StoreError::Unavailable(format!("connection mutex poisoned: {err}"))
            })?;
            op(&mut *guard)
        })
        .await
        .map_err(|err| E::from(StoreError::Unavailable(err.to_string())))?
    }
}

#[cfg(test)]
impl SqliteAdmissionsStore {
    pub(crate) fn with_ledger<T>(&self, op: impl FnOnce(&SqliteLedger<'_>) -> T) -> T {
        let guard = self.conn.lock().expect("connection mutex poisoned");
        op(&SqliteLedger::new(&guard))
    }

    pub(crate) fn execute_batch(&self, sql: &str) {
        let guard = self.conn.lock().expect("connection mutex poisoned");
        guard.execute_batch(sql).expect("test sql applies");
    }
}

/// Ledger view over an open connection or transaction.
pub(crate) struct SqliteLedger<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteLedger<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl StatusLedger for SqliteLedger<'_> {
    fn current_status(
        &self,
        student_id: &StudentId,
    ) -> Result<Option<ApplicationStatus>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT status FROM application_status WHERE student_id = ?1",
                params![student_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(database)?;

        raw.map(|label| {
            ApplicationStatus::from_label(&label)
                .ok_or_else(|| StoreError::CorruptRow(format!("unknown status '{label}'")))
        })
        .transpose()
    }

    fn insert_pending(&self, student_id: &StudentId) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO application_status (student_id, status) VALUES (?1, 'pending')",
                params![student_id.as_str()],
            )
            .map_err(|err| match constraint_code(&err) {
                Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
                    StoreError::UnknownStudent(student_id.clone())
                }
                _ => database(err),
            })?;
        Ok(())
    }

    fn update_status(
        &self,
        student_id: &StudentId,
        status: ApplicationStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let updated = self
            .conn
            .execute(
                "UPDATE application_status SET status = ?1, updated_at = ?2 WHERE student_id = ?3",
                params![status.label(), encode_timestamp(at), student_id.as_str()],
            )
            .map_err(database)?;

        if updated == 0 {
            return Err(StoreError::MissingStatusRow(student_id.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl AdmissionsRepository for SqliteAdmissionsStore {
    async fn insert_student(&self, student: Student) -> Result<Student, StoreError> {
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO students (student_id, student_number, first_name, last_name, \
                 middle_initial, degree_program, year_level, gmail, phone_number, \
                 status_enrollment, zip_code, enrolled_units) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    student.student_id.as_str(),
                    student.student_number,
                    student.first_name,
                    student.last_name,
                    student.middle_initial,
                    student.degree_program,
                    student.year_level,
                    student.gmail,
                    student.phone_number,
                    student.status_enrollment,
                    student.zip_code,
                    student.enrolled_units,
                ],
            )
            .map_err(|err| match constraint_code(&err) {
                Some(ffi::SQLITE_CONSTRAINT_PRIMARYKEY) => {
                    StoreError::DuplicateStudent(student.student_id.clone())
                }
                _ => database(err),
            })?;
            Ok(student)
        })
        .await
    }

    async fn insert_post(
        &self,
        post: NewPost,
        created_at: DateTime<Utc>,
    ) -> Result<Post, StoreError> {
        self.run(move |conn| {
            let user_id = post.author();
            conn.execute(
                "INSERT INTO posts (title, content, created_at, user_id) VALUES (?1, ?2, ?3, ?4)",
                params![post.title, post.content, encode_timestamp(created_at), user_id],
            )
            .map_err(database)?;

            Ok(Post {
                id: conn.last_insert_rowid(),
                title: post.title,
                content: post.content,
                created_at,
                user_id,
            })
        })
        .await
    }

    async fn recent_posts(&self) -> Result<Vec<Post>, StoreError> {
        self.run(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, title, content, created_at, user_id FROM posts \
                     ORDER BY created_at DESC, id DESC",
                )
                .map_err(database)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                })
                .map_err(database)?;

            let mut posts = Vec::new();
            for row in rows {
                let (id, title, content, created_at, user_id) = row.map_err(database)?;
                posts.push(Post {
                    id,
                    title,
                    content,
                    created_at: decode_timestamp(&created_at)?,
                    user_id,
                });
            }
            Ok(posts)
        })
        .await
    }

    async fn unreviewed(&self) -> Result<Vec<ApplicantView>, StoreError> {
        self.run(|conn| {
            let sql = format!(
                "SELECT {STUDENT_COLUMNS}, a.status AS application_status FROM students s \
                 LEFT JOIN application_status a ON s.student_id = a.student_id \
                 WHERE {UNREVIEWED_FILTER} ORDER BY s.student_id"
            );
            query_applicants(conn, &sql, params![])
        })
        .await
    }

    async fn search_unreviewed(&self, term: &str) -> Result<Vec<ApplicantView>, StoreError> {
        let term = term.to_string();
        self.run(move |conn| {
            let sql = format!(
                "SELECT {STUDENT_COLUMNS}, a.status AS application_status FROM students s \
                 LEFT JOIN application_status a ON s.student_id = a.student_id \
                 WHERE (s.student_id = ?1 OR s.student_number = ?1) AND {UNREVIEWED_FILTER} \
                 ORDER BY s.student_id"
            );
            query_applicants(conn, &sql, params![term])
        })
        .await
    }

    async fn decided(&self, decision: Decision) -> Result<Vec<DecidedStudent>, StoreError> {
        self.run(move |conn| {
            let sql = format!(
                "SELECT {STUDENT_COLUMNS}, a.updated_at FROM students s \
                 INNER JOIN application_status a ON s.student_id = a.student_id \
                 WHERE a.status = ?1 ORDER BY a.updated_at DESC, s.student_id"
            );
            let mut stmt = conn.prepare(&sql).map_err(database)?;
            let rows = stmt
                .query_map(params![decision.target().label()], |row| {
                    Ok((student_from_row(row)?, row.get::<_, Option<String>>("updated_at")?))
                })
                .map_err(database)?;

            let mut students = Vec::new();
            for row in rows {
                let (student, updated_at) = row.map_err(database)?;
                let updated_at = updated_at.ok_or_else(|| {
                    StoreError::CorruptRow(format!(
                        "decided student {} has no decision timestamp",
                        student.student_id
                    ))
                })?;
                students.push(DecidedStudent {
                    student,
                    updated_at: decode_timestamp(&updated_at)?,
                });
            }
            Ok(students)
        })
        .await
    }

    async fn confirmed_by_year_level(&self) -> Result<Vec<GroupCount<Option<u8>>>, StoreError> {
        self.run(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT s.year_level, COUNT(*) FROM students s \
                     INNER JOIN application_status a ON s.student_id = a.student_id \
                     WHERE a.status = 'confirmed' \
                     GROUP BY s.year_level ORDER BY s.year_level",
                )
                .map_err(database)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(GroupCount {
                        key: row.get::<_, Option<u8>>(0)?,
                        count: row.get::<_, i64>(1)?.max(0) as u64,
                    })
                })
                .map_err(database)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(database)
        })
        .await
    }

    async fn confirmed_by_degree_program(
        &self,
    ) -> Result<Vec<GroupCount<Option<String>>>, StoreError> {
        self.run(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT s.degree_program, COUNT(*) FROM students s \
                     INNER JOIN application_status a ON s.student_id = a.student_id \
                     WHERE a.status = 'confirmed' \
                     GROUP BY s.degree_program ORDER BY s.degree_program",
                )
                .map_err(database)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(GroupCount {
                        key: row.get::<_, Option<String>>(0)?,
                        count: row.get::<_, i64>(1)?.max(0) as u64,
                    })
                })
                .map_err(database)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(database)
        })
        .await
    }

    async fn decisions_by_month(&self) -> Result<Vec<MonthlyDecisions>, StoreError> {
        self.run(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT strftime('%Y-%m', updated_at) AS month, \
                     SUM(CASE WHEN status = 'confirmed' THEN 1 ELSE 0 END), \
                     SUM(CASE WHEN status = 'rejected' THEN 1 ELSE 0 END) \
                     FROM application_status \
                     WHERE status IN ('confirmed', 'rejected') AND updated_at IS NOT NULL \
                     GROUP BY month ORDER BY month",
                )
                .map_err(database)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(MonthlyDecisions {
                        date: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                        confirmed: row.get::<_, i64>(1)?.max(0) as u64,
                        rejected: row.get::<_, i64>(2)?.max(0) as u64,
                    })
                })
                .map_err(database)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(database)
        })
        .await
    }

    async fn transition(
        &self,
        student_id: &StudentId,
        decision: Decision,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome, TransitionError> {
        let student_id = student_id.clone();
        self.run(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|err| TransitionError::new(TransitionStep::Transaction, database(err)))?;
            let outcome = apply_transition(&SqliteLedger::new(&tx), &student_id, decision, at)?;
            tx.commit()
                .map_err(|err| TransitionError::new(TransitionStep::Transaction, database(err)))?;
            Ok(outcome)
        })
        .await
    }
}

fn query_applicants(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<ApplicantView>, StoreError> {
    let mut stmt = conn.prepare(sql).map_err(database)?;
    let rows = stmt
        .query_map(params, |row| {
            Ok((
                student_from_row(row)?,
                row.get::<_, Option<String>>("application_status")?,
            ))
        })
        .map_err(database)?;

    let mut applicants = Vec::new();
    for row in rows {
        let (student, status) = row.map_err(database)?;
        let application_status = status
            .map(|label| {
                ApplicationStatus::from_label(&label)
                    .ok_or_else(|| StoreError::CorruptRow(format!("unknown status '{label}'")))
            })
            .transpose()?;
        applicants.push(ApplicantView {
            student,
            application_status,
        });
    }
    Ok(applicants)
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        student_id: StudentId(row.get("student_id")?),
        student_number: row.get("student_number")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        middle_initial: row.get("middle_initial")?,
        degree_program: row.get("degree_program")?,
        year_level: row.get("year_level")?,
        gmail: row.get("gmail")?,
        phone_number: row.get("phone_number")?,
        status_enrollment: row.get("status_enrollment")?,
        zip_code: row.get("zip_code")?,
        enrolled_units: row.get("enrolled_units")?,
    })
}

/// Fixed-width UTC text so lexical order matches chronological order.
pub(crate) fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| StoreError::CorruptRow(format!("invalid timestamp '{raw}': {err}")))
}

fn constraint_code(err: &rusqlite::Error) -> Option<i32> {
    match err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Some(failure.extended_code)
        }
        _ => None,
    }
}

fn database(err: rusqlite::Error) -> StoreError {
    StoreError::Database(err.to_string())
}
