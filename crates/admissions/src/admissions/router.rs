use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::domain::{Decision, NewPost, Student, StudentId, TransitionOutcome};
use super::engine::{TransitionError, TransitionStep};
use super::export::EXPORT_FILE_NAME;
use super::repository::{AdmissionsRepository, StoreError};
use super::service::{AdmissionsError, AdmissionsService};

/// Router builder exposing the admin dashboard endpoints.
pub fn admissions_router<R>(service: Arc<AdmissionsService<R>>) -> Router
where
    R: AdmissionsRepository + 'static,
{
    Router::new()
        .route("/", get(posts_handler::<R>))
        .route("/posts", get(posts_handler::<R>))
        .route("/application", get(application_handler::<R>))
        .route("/search", get(search_handler::<R>))
        .route("/addStudent", post(add_student_handler::<R>))
        .route("/addPost", post(add_post_handler::<R>))
        .route("/confirmStudent/:student_id", post(confirm_handler::<R>))
        .route("/confirm/:student_id", post(confirm_handler::<R>))
        .route("/rejectStudent/:student_id", post(reject_handler::<R>))
        .route("/confirmed", get(confirmed_handler::<R>))
        .route("/rejected", get(rejected_handler::<R>))
        .route("/export/confirmed-students", get(export_handler::<R>))
        .route("/acceptance-rate-data", get(acceptance_rate_handler::<R>))
        .route(
            "/acceptance-visualization",
            get(acceptance_visualization_handler::<R>),
        )
        .route("/visualization", get(visualization_handler::<R>))
        .route("/year-level-data", get(year_level_handler::<R>))
        .route("/degree-program-data", get(degree_program_handler::<R>))
        .with_state(service)
}

/// Body returned by the confirm and reject endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchParams {
    #[serde(default)]
    search: Option<String>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({ "error": message.into() });
    (status, Json(payload)).into_response()
}

/// Log the detailed failure and answer with a generic message.
fn failure_response(context: &'static str, err: &AdmissionsError, message: &str) -> Response {
    match err {
        AdmissionsError::Validation(validation) => {
            error_response(StatusCode::BAD_REQUEST, validation.to_string())
        }
        AdmissionsError::Store(StoreError::DuplicateStudent(id)) => error_response(
            StatusCode::CONFLICT,
            format!("student {id} already exists"),
        ),
        other => {
            error!(error = %other, context, "request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, message)
        }
    }
}

pub(crate) async fn posts_handler<R>(State(service): State<Arc<AdmissionsService<R>>>) -> Response
where
    R: AdmissionsRepository + 'static,
{
    match service.posts().await {
        Ok(posts) => (StatusCode::OK, Json(json!({ "posts": posts }))).into_response(),
        Err(err) => failure_response("list posts", &err, "Database error"),
    }
}

pub(crate) async fn application_handler<R>(
    State(service): State<Arc<AdmissionsService<R>>>,
) -> Response
where
    R: AdmissionsRepository + 'static,
{
    match service.unreviewed().await {
        Ok(students) => (StatusCode::OK, Json(json!({ "students": students }))).into_response(),
        Err(err) => failure_response("list unreviewed students", &err, "Database error"),
    }
}

pub(crate) async fn search_handler<R>(
    State(service): State<Arc<AdmissionsService<R>>>,
    Query(params): Query<SearchParams>,
) -> Response
where
    R: AdmissionsRepository + 'static,
{
    let term = params.search.unwrap_or_default();
    match service.search(&term).await {
        Ok(students) => (StatusCode::OK, Json(json!({ "students": students }))).into_response(),
        Err(err) => failure_response("search students", &err, "Database error"),
    }
}

/// Malformed or non-JSON bodies are validation failures like any other.
fn rejection_response(rejection: JsonRejection) -> Response {
    error_response(StatusCode::BAD_REQUEST, rejection.body_text())
}

pub(crate) async fn add_student_handler<R>(
    State(service): State<Arc<AdmissionsService<R>>>,
    payload: Result<Json<Student>, JsonRejection>,
) -> Response
where
    R: AdmissionsRepository + 'static,
{
    let student = match payload {
        Ok(Json(student)) => student,
        Err(rejection) => return rejection_response(rejection),
    };
    match service.add_student(student).await {
        Ok(stored) => (StatusCode::CREATED, Json(stored)).into_response(),
        Err(err) => failure_response("add student", &err, "Error adding student."),
    }
}

pub(crate) async fn add_post_handler<R>(
    State(service): State<Arc<AdmissionsService<R>>>,
    payload: Result<Json<NewPost>, JsonRejection>,
) -> Response
where
    R: AdmissionsRepository + 'static,
{
    let post = match payload {
        Ok(Json(post)) => post,
        Err(rejection) => return rejection_response(rejection),
    };
    match service.add_post(post).await {
        Ok(stored) => (StatusCode::CREATED, Json(stored)).into_response(),
        Err(err) => failure_response("add post", &err, "Internal Server Error"),
    }
}

pub(crate) async fn confirm_handler<R>(
    State(service): State<Arc<AdmissionsService<R>>>,
    Path(student_id): Path<String>,
) -> Response
where
    R: AdmissionsRepository + 'static,
{
    decision_response(&service, StudentId(student_id), Decision::Confirm).await
}

pub(crate) async fn reject_handler<R>(
    State(service): State<Arc<AdmissionsService<R>>>,
    Path(student_id): Path<String>,
) -> Response
where
    R: AdmissionsRepository + 'static,
{
    decision_response(&service, StudentId(student_id), Decision::Reject).await
}

async fn decision_response<R>(
    service: &AdmissionsService<R>,
    student_id: StudentId,
    decision: Decision,
) -> Response
where
    R: AdmissionsRepository + 'static,
{
    let past = decision.target().label();
    let (status, body) = match service.decide(&student_id, decision).await {
        Ok(TransitionOutcome::Transitioned { .. }) => (
            StatusCode::OK,
            TransitionResponse {
                success: true,
                message: format!("Student application {past} successfully!"),
            },
        ),
        Ok(TransitionOutcome::AlreadyInState { .. }) => (
            StatusCode::OK,
            TransitionResponse {
                success: false,
                message: format!("Student application is already {past}."),
            },
        ),
        Err(AdmissionsError::Transition(TransitionError {
            source: StoreError::UnknownStudent(_),
            ..
        })) => (
            StatusCode::NOT_FOUND,
            TransitionResponse {
                success: false,
                message: "Student not found.".to_string(),
            },
        ),
        Err(err) => {
            let message = match &err {
                AdmissionsError::Transition(TransitionError { step, .. }) => {
                    transition_failure_message(*step, decision)
                }
                _ => transition_failure_message(TransitionStep::Transaction, decision),
            };
            error!(%student_id, action = decision.verb(), error = %err, "status transition failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                TransitionResponse {
                    success: false,
                    message,
                },
            )
        }
    };

    (status, Json(body)).into_response()
}

fn transition_failure_message(step: TransitionStep, decision: Decision) -> String {
    match step {
        TransitionStep::Lookup => "Error retrieving student status.".to_string(),
        TransitionStep::InsertPending => "Error inserting application status.".to_string(),
        TransitionStep::Update | TransitionStep::Transaction => {
            format!("Error {} student.", decision.progressive())
        }
    }
}

pub(crate) async fn confirmed_handler<R>(
    State(service): State<Arc<AdmissionsService<R>>>,
) -> Response
where
    R: AdmissionsRepository + 'static,
{
    match service.decided(Decision::Confirm).await {
        Ok(students) => (StatusCode::OK, Json(json!({ "students": students }))).into_response(),
        Err(err) => failure_response(
            "list confirmed students",
            &err,
            "Error retrieving confirmed students.",
        ),
    }
}

pub(crate) async fn rejected_handler<R>(
    State(service): State<Arc<AdmissionsService<R>>>,
) -> Response
where
    R: AdmissionsRepository + 'static,
{
    match service.decided(Decision::Reject).await {
        Ok(students) => (StatusCode::OK, Json(json!({ "students": students }))).into_response(),
        Err(err) => failure_response(
            "list rejected students",
            &err,
            "Error retrieving rejected students.",
        ),
    }
}

pub(crate) async fn export_handler<R>(State(service): State<Arc<AdmissionsService<R>>>) -> Response
where
    R: AdmissionsRepository + 'static,
{
    let path = match service.export_confirmed().await {
        Ok(path) => path,
        Err(err) => {
            return failure_response("export confirmed students", &err, "Error exporting file.")
        }
    };

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(error = %err, path = %path.display(), "reading export failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error exporting file.");
        }
    };

    let content_type = mime_guess::from_path(&path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    let disposition = format!("attachment; filename=\"{EXPORT_FILE_NAME}\"");

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

pub(crate) async fn acceptance_rate_handler<R>(
    State(service): State<Arc<AdmissionsService<R>>>,
) -> Response
where
    R: AdmissionsRepository + 'static,
{
    match service.acceptance_rate().await {
        Ok(series) => (StatusCode::OK, Json(series)).into_response(),
        Err(err) => failure_response("acceptance rate data", &err, "Error fetching data"),
    }
}

pub(crate) async fn acceptance_visualization_handler<R>(
    State(service): State<Arc<AdmissionsService<R>>>,
) -> Response
where
    R: AdmissionsRepository + 'static,
{
    match service.acceptance_visualization().await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => failure_response("acceptance visualization", &err, "Database error"),
    }
}

pub(crate) async fn visualization_handler<R>(
    State(service): State<Arc<AdmissionsService<R>>>,
) -> Response
where
    R: AdmissionsRepository + 'static,
{
    match service.visualization().await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => failure_response("visualization", &err, "Database error"),
    }
}

pub(crate) async fn year_level_handler<R>(
    State(service): State<Arc<AdmissionsService<R>>>,
) -> Response
where
    R: AdmissionsRepository + 'static,
{
    match service.year_level_shares().await {
        Ok(shares) => (StatusCode::OK, Json(shares)).into_response(),
        Err(err) => failure_response("year level data", &err, "Database error"),
    }
}

pub(crate) async fn degree_program_handler<R>(
    State(service): State<Arc<AdmissionsService<R>>>,
) -> Response
where
    R: AdmissionsRepository + 'static,
{
    match service.degree_program_shares().await {
        Ok(shares) => (StatusCode::OK, Json(shares)).into_response(),
        Err(err) => failure_response("degree program data", &err, "Database error"),
    }
}
