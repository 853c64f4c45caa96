use std::sync::Arc;

use chrono::{Duration, Utc};

use bommap_core::{EngineError, JobManager, NewSession, SessionManager};
use bommap_model::{BlobRef, ColumnName, HeaderMapping, JobStatus, MappingEntry, SessionStatus};
use bommap_store::{Clock, FixedClock, MemoryRecordStore, RecordStore};

fn col(name: &str) -> ColumnName {
    ColumnName::new(name).unwrap()
}

struct Fixture {
    sessions: SessionManager,
    jobs: JobManager,
    clock: Arc<FixedClock>,
}

fn fixture() -> Fixture {
    let records = Arc::new(MemoryRecordStore::new());
    let clock = Arc::new(FixedClock::new(Utc::now()));
    Fixture {
        sessions: SessionManager::new(
            Arc::clone(&records) as Arc<dyn RecordStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
        ),
        jobs: JobManager::new(
            Arc::clone(&records) as Arc<dyn RecordStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
        ),
        clock,
    }
}

fn mapped_session(fixture: &Fixture) -> bommap_model::Session {
    let session = fixture
        .sessions
        .create(NewSession {
            source_file_ref: BlobRef::new("uploads/src.csv").unwrap(),
            target_file_ref: BlobRef::new("uploads/tgt.csv").unwrap(),
            source_file_name: "src.csv".to_string(),
            target_file_name: "tgt.csv".to_string(),
            source_sheet: None,
            source_header_row: 1,
            target_sheet: None,
            target_header_row: 1,
        })
        .unwrap();
    fixture
        .sessions
        .confirm_mapping(
            &session.session_id,
            HeaderMapping::new(vec![MappingEntry {
                target: col("Item Code"),
                source: Some(col("Part No")),
            }])
            .unwrap(),
        )
        .unwrap()
}

#[test]
fn job_creation_requires_a_mapped_session() {
    let fixture = fixture();
    let uploaded = fixture
        .sessions
        .create(NewSession {
            source_file_ref: BlobRef::new("uploads/a.csv").unwrap(),
            target_file_ref: BlobRef::new("uploads/b.csv").unwrap(),
            source_file_name: "a.csv".to_string(),
            target_file_name: "b.csv".to_string(),
            source_sheet: None,
            source_header_row: 1,
            target_sheet: None,
            target_header_row: 1,
        })
        .unwrap();

    assert!(matches!(
        fixture.jobs.create(&uploaded),
        Err(EngineError::State { .. })
    ));

    let mapped = mapped_session(&fixture);
    let job = fixture.jobs.create(&mapped).unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.progress, 0);
}

#[test]
fn happy_path_reaches_completed_with_result() {
    let fixture = fixture();
    let session = mapped_session(&fixture);
    let job = fixture.jobs.create(&session).unwrap();

    fixture.jobs.start(&job.job_id).unwrap();
    fixture.jobs.record_progress(&job.job_id, 40).unwrap();
    let done = fixture
        .jobs
        .complete(
            &job.job_id,
            BlobRef::new("processed/s/out.csv").unwrap(),
        )
        .unwrap();

    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress, 100);
    assert!(done.result.is_some());
    assert!(done.error_message.is_none());
}

#[test]
fn failure_stores_message_and_leaves_session_alone() {
    let fixture = fixture();
    let session = mapped_session(&fixture);
    let job = fixture.jobs.create(&session).unwrap();

    fixture.jobs.start(&job.job_id).unwrap();
    let failed = fixture
        .jobs
        .fail(&job.job_id, "source blob unreadable")
        .unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("source blob unreadable"));
    assert!(failed.result.is_none());

    let reloaded = fixture.sessions.get(&session.session_id).unwrap();
    assert_eq!(reloaded.status, SessionStatus::Mapped);
}

#[test]
fn terminal_jobs_reject_further_transitions() {
    let fixture = fixture();
    let session = mapped_session(&fixture);
    let job = fixture.jobs.create(&session).unwrap();
    fixture.jobs.start(&job.job_id).unwrap();
    fixture
        .jobs
        .complete(&job.job_id, BlobRef::new("processed/x.csv").unwrap())
        .unwrap();

    assert!(matches!(
        fixture.jobs.start(&job.job_id),
        Err(EngineError::State { .. })
    ));
    assert!(matches!(
        fixture.jobs.fail(&job.job_id, "too late"),
        Err(EngineError::State { .. })
    ));
}

#[test]
fn progress_is_monotonic_and_gated_on_processing() {
    let fixture = fixture();
    let session = mapped_session(&fixture);
    let job = fixture.jobs.create(&session).unwrap();

    // Progress before pickup is a state error, not a silent no-op.
    assert!(matches!(
        fixture.jobs.record_progress(&job.job_id, 10),
        Err(EngineError::State { .. })
    ));

    fixture.jobs.start(&job.job_id).unwrap();
    fixture.jobs.record_progress(&job.job_id, 60).unwrap();
    let job_after = fixture.jobs.record_progress(&job.job_id, 30).unwrap();
    assert_eq!(job_after.progress, 60);
}

#[test]
fn expired_job_reads_as_not_found() {
    let fixture = fixture();
    let session = mapped_session(&fixture);
    let job = fixture.jobs.create(&session).unwrap();

    fixture.clock.advance(Duration::hours(25));
    assert!(matches!(
        fixture.jobs.get(&job.job_id),
        Err(EngineError::NotFound { .. })
    ));
}

#[test]
fn deleting_a_queued_job_cancels_it_before_pickup() {
    let fixture = fixture();
    let session = mapped_session(&fixture);
    let job = fixture.jobs.create(&session).unwrap();

    assert!(fixture.jobs.delete(&job.job_id).unwrap());
    assert!(matches!(
        fixture.jobs.get(&job.job_id),
        Err(EngineError::NotFound { .. })
    ));
}
