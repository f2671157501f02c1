use super::common::*;
use chrono::Duration;

use crate::admissions::domain::{
    ApplicationStatus, Decision, NewPost, StudentId, ValidationError, DEFAULT_POST_AUTHOR,
};
use crate::admissions::engine::StatusLedger;
use crate::admissions::repository::{AdmissionsRepository, StoreError};
use crate::admissions::service::AdmissionsError;

fn ids<T>(items: &[T], id: impl Fn(&T) -> &StudentId) -> Vec<String> {
    items.iter().map(|item| id(item).to_string()).collect()
}

#[tokio::test]
async fn unreviewed_lists_students_without_terminal_status() {
    let store = seeded_store(&[
        student("S-1", "2021-0001", 1, "BSCS"),
        student("S-2", "2021-0002", 2, "BSIT"),
        student("S-3", "2021-0003", 3, "BSCS"),
        student("S-4", "2021-0004", 4, "BSIS"),
    ])
    .await;
    store.with_ledger(|ledger| {
        ledger
            .insert_pending(&StudentId::from("S-2"))
            .expect("pending row")
    });
    store
        .transition(&StudentId::from("S-3"), Decision::Confirm, at(2025, 1, 2, 9))
        .await
        .expect("confirm");
    store
        .transition(&StudentId::from("S-4"), Decision::Reject, at(2025, 1, 2, 10))
        .await
        .expect("reject");

    let unreviewed = store.unreviewed().await.expect("unreviewed");

    assert_eq!(
        ids(&unreviewed, |view| &view.student.student_id),
        vec!["S-1", "S-2"]
    );
    assert_eq!(unreviewed[0].application_status, None);
    assert_eq!(
        unreviewed[1].application_status,
        Some(ApplicationStatus::Pending)
    );
}

#[tokio::test]
async fn decided_lists_newest_decision_first() {
    let store = seeded_store(&[
        student("S-1", "2021-0001", 1, "BSCS"),
        student("S-2", "2021-0002", 2, "BSIT"),
        student("S-3", "2021-0003", 3, "BSCS"),
        student("S-4", "2021-0004", 4, "BSIS"),
    ])
    .await;
    for (id, hour) in [("S-1", 8), ("S-3", 12), ("S-2", 10)] {
        store
            .transition(&StudentId::from(id), Decision::Confirm, at(2025, 4, 1, hour))
            .await
            .expect("confirm");
    }

    let confirmed = store.decided(Decision::Confirm).await.expect("confirmed");
    assert_eq!(
        ids(&confirmed, |decided| &decided.student.student_id),
        vec!["S-3", "S-2", "S-1"]
    );
    assert!(store
        .decided(Decision::Reject)
        .await
        .expect("rejected")
        .is_empty());
}

#[tokio::test]
async fn search_matches_student_id_or_number_among_unreviewed() {
    let store = seeded_store(&[
        student("S-1", "2021-0001", 1, "BSCS"),
        student("S-2", "2021-0002", 2, "BSIT"),
    ])
    .await;
    let dir = tempfile::tempdir().expect("tempdir");
    let service = build_service(
        store.clone(),
        ManualClock::starting_at(at(2025, 1, 1, 0)),
        dir.path(),
    );

    let by_id = service.search("S-2").await.expect("search by id");
    assert_eq!(ids(&by_id, |view| &view.student.student_id), vec!["S-2"]);

    let by_number = service.search("  2021-0001 ").await.expect("search by number");
    assert_eq!(ids(&by_number, |view| &view.student.student_id), vec!["S-1"]);

    service
        .decide(&StudentId::from("S-1"), Decision::Confirm)
        .await
        .expect("confirm");
    assert!(service
        .search("2021-0001")
        .await
        .expect("search decided")
        .is_empty());
}

#[tokio::test]
async fn blank_search_is_a_validation_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let service = build_service(
        memory_store(),
        ManualClock::starting_at(at(2025, 1, 1, 0)),
        dir.path(),
    );

    let err = service.search("   ").await.expect_err("blank search");
    assert!(matches!(
        err,
        AdmissionsError::Validation(ValidationError::EmptySearch)
    ));
}

#[tokio::test]
async fn acceptance_rate_groups_decisions_by_month() {
    let students: Vec<_> = (1..=6)
        .map(|n| student(&format!("S-{n}"), &format!("2021-000{n}"), 1, "BSCS"))
        .collect();
    let store = seeded_store(&students).await;
    let clock = ManualClock::starting_at(at(2025, 1, 5, 9));
    let dir = tempfile::tempdir().expect("tempdir");
    let service = build_service(store.clone(), clock.clone(), dir.path());

    for (id, decision) in [
        ("S-1", Decision::Confirm),
        ("S-2", Decision::Confirm),
        ("S-3", Decision::Confirm),
        ("S-4", Decision::Reject),
    ] {
        service
            .decide(&StudentId::from(id), decision)
            .await
            .expect("january decision");
        clock.advance(Duration::minutes(5));
    }
    clock.set(at(2025, 2, 10, 9));
    for id in ["S-5", "S-6"] {
        service
            .decide(&StudentId::from(id), Decision::Reject)
            .await
            .expect("february decision");
    }

    let series = service.acceptance_rate().await.expect("series");
    assert_eq!(series.len(), 2);
    assert_eq!(series[0].date, "2025-01");
    assert_eq!((series[0].confirmed, series[0].rejected), (3, 1));
    assert!((series[0].acceptance_rate - 75.0).abs() < f64::EPSILON);
    assert_eq!(series[1].date, "2025-02");
    assert_eq!((series[1].confirmed, series[1].rejected), (0, 2));
    assert_eq!(series[1].acceptance_rate, 0.0);

    let chart = service
        .acceptance_visualization()
        .await
        .expect("visualization");
    assert_eq!(chart.title, "Acceptance Rate Visualization");
    assert_eq!(chart.date_labels, vec!["2025-01", "2025-02"]);
}

#[tokio::test]
async fn overwritten_decision_moves_to_its_new_month() {
    let store = seeded_store(&[student("S-1", "2021-0001", 1, "BSCS")]).await;
    let id = StudentId::from("S-1");
    store
        .transition(&id, Decision::Confirm, at(2025, 1, 5, 9))
        .await
        .expect("confirm");
    store
        .transition(&id, Decision::Reject, at(2025, 3, 5, 9))
        .await
        .expect("reject");

    let months = store.decisions_by_month().await.expect("months");
    assert_eq!(months.len(), 1);
    assert_eq!(months[0].date, "2025-03");
    assert_eq!((months[0].confirmed, months[0].rejected), (0, 1));
}

#[tokio::test]
async fn breakdowns_share_confirmed_students_by_group() {
    let store = seeded_store(&[
        student("S-1", "2021-0001", 1, "BSCS"),
        student("S-2", "2021-0002", 1, "BSIT"),
        student("S-3", "2021-0003", 2, "BSCS"),
        student("S-4", "2021-0004", 2, "BSCS"),
        student("S-5", "2021-0005", 3, "BSIS"),
    ])
    .await;
    let dir = tempfile::tempdir().expect("tempdir");
    let service = build_service(
        store.clone(),
        ManualClock::starting_at(at(2025, 5, 1, 9)),
        dir.path(),
    );
    for id in ["S-1", "S-2", "S-3", "S-4"] {
        service
            .decide(&StudentId::from(id), Decision::Confirm)
            .await
            .expect("confirm");
    }
    service
        .decide(&StudentId::from("S-5"), Decision::Reject)
        .await
        .expect("reject");

    let years = service.year_level_shares().await.expect("year levels");
    assert_eq!(years.labels, vec!["1 Year", "2 Year"]);
    assert_eq!(years.values, vec![50.0, 50.0]);

    let programs = service.degree_program_shares().await.expect("programs");
    assert_eq!(programs.labels, vec!["BSCS", "BSIT"]);
    assert_eq!(programs.values, vec![75.0, 25.0]);

    let view = service.visualization().await.expect("visualization");
    assert_eq!(view.title, "Data Visualization (Confirmed Students)");
    assert_eq!(view.year_level, years);
    assert_eq!(view.degree_program, programs);
}

#[tokio::test]
async fn visualization_without_confirmations_is_empty() {
    let store = seeded_store(&[student("S-1", "2021-0001", 1, "BSCS")]).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let service = build_service(
        store,
        ManualClock::starting_at(at(2025, 5, 1, 9)),
        dir.path(),
    );

    let view = service.visualization().await.expect("visualization");
    assert_eq!(view.title, "Data Visualization");
    assert!(view.year_level.is_empty());
    assert!(view.degree_program.is_empty());
    assert!(service
        .acceptance_rate()
        .await
        .expect("series")
        .is_empty());
}

#[tokio::test]
async fn posts_are_listed_newest_first_with_default_author() {
    let clock = ManualClock::starting_at(at(2025, 6, 1, 8));
    let dir = tempfile::tempdir().expect("tempdir");
    let service = build_service(memory_store(), clock.clone(), dir.path());

    let first = service
        .add_post(NewPost {
            title: "Enrollment opens".to_string(),
            content: "Submit forms by Friday.".to_string(),
            user_id: None,
        })
        .await
        .expect("first post");
    clock.advance(Duration::hours(1));
    service
        .add_post(NewPost {
            title: "Schedule posted".to_string(),
            content: "See the registrar board.".to_string(),
            user_id: Some(7),
        })
        .await
        .expect("second post");

    assert_eq!(first.user_id, DEFAULT_POST_AUTHOR);
    let posts = service.posts().await.expect("posts");
    let titles: Vec<_> = posts.iter().map(|post| post.title.as_str()).collect();
    assert_eq!(titles, vec!["Schedule posted", "Enrollment opens"]);
    assert_eq!(posts[0].user_id, 7);
    assert_eq!(posts[1].created_at, at(2025, 6, 1, 8));
}

#[tokio::test]
async fn post_without_content_is_rejected_before_storage() {
    let dir = tempfile::tempdir().expect("tempdir");
    let service = build_service(
        UnavailableRepository::failing_at(crate::admissions::engine::TransitionStep::Lookup),
        ManualClock::starting_at(at(2025, 6, 1, 8)),
        dir.path(),
    );

    let err = service
        .add_post(NewPost {
            title: "Notice".to_string(),
            content: "  ".to_string(),
            user_id: None,
        })
        .await
        .expect_err("missing content");
    assert!(matches!(
        err,
        AdmissionsError::Validation(ValidationError::TitleAndContentRequired)
    ));
}

#[tokio::test]
async fn duplicate_student_is_reported() {
    let store = seeded_store(&[student("S-1", "2021-0001", 1, "BSCS")]).await;

    let err = store
        .insert_student(student("S-1", "2021-0099", 2, "BSIT"))
        .await
        .expect_err("duplicate");
    assert!(matches!(err, StoreError::DuplicateStudent(id) if id.as_str() == "S-1"));
}

#[tokio::test]
async fn students_without_group_values_chart_as_unassigned() {
    let mut unplaced = student("S-2", "2021-0002", 1, "BSCS");
    unplaced.year_level = None;
    unplaced.degree_program = None;
    let store = seeded_store(&[student("S-1", "2021-0001", 3, "BSCS"), unplaced]).await;
    for id in ["S-1", "S-2"] {
        store
            .transition(&StudentId::from(id), Decision::Confirm, at(2025, 7, 1, 9))
            .await
            .expect("confirm");
    }
    let dir = tempfile::tempdir().expect("tempdir");
    let service = build_service(
        store,
        ManualClock::starting_at(at(2025, 7, 2, 9)),
        dir.path(),
    );

    let years = service.year_level_shares().await.expect("year levels");
    assert_eq!(years.labels, vec!["Unassigned", "3 Year"]);
    assert_eq!(years.values, vec![50.0, 50.0]);

    let programs = service.degree_program_shares().await.expect("programs");
    assert_eq!(programs.labels, vec!["Unassigned", "BSCS"]);
}
