use chrono::{Duration, Utc};

use super::*;

fn build(status: BuildStatus) -> IndexBuild {
    IndexBuild {
        id: 1,
        status,
        document_count: 3,
        chunk_count: 42,
        embedding_model: "text-embedding-ada-002".to_string(),
        dimension: Some(1536),
        started_date: Utc::now().naive_utc(),
        completed_date: None,
        error_message: None,
    }
}

#[test]
fn build_status_display() {
    assert_eq!(BuildStatus::Building.to_string(), "Building");
    assert_eq!(BuildStatus::Completed.to_string(), "Completed");
    assert_eq!(BuildStatus::Failed.to_string(), "Failed");
}

#[test]
fn build_completion() {
    assert!(!build(BuildStatus::Building).is_completed());
    assert!(!build(BuildStatus::Failed).is_completed());
    assert!(build(BuildStatus::Completed).is_completed());
}

#[test]
fn build_duration() {
    let mut finished = build(BuildStatus::Completed);
    assert_eq!(finished.duration(), None);

    finished.completed_date = Some(finished.started_date + Duration::seconds(90));
    assert_eq!(finished.duration(), Some(Duration::seconds(90)));
}
