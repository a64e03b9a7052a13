mod common;

use common::{
    fast_config, harness, harness_with, harness_with_presenter, CloudScript, RecordingDirectory,
    RecordingPresenter, ScriptedCloud,
};
use notesar_core::{
    AnchorState, CoordinatorError, LocalAnchorHandle, NoteDisposition, ProgressObserver,
    UploadError, UploadOutcome, UploadTicket, Visual,
};
use std::cell::Cell;
use std::thread;
use std::time::Duration;

fn expect_upload(disposition: NoteDisposition) -> UploadTicket {
    match disposition {
        NoteDisposition::Uploading(ticket) => ticket,
        NoteDisposition::Cancelled => panic!("note should start an upload"),
    }
}

#[test]
fn tap_note_scan_upload_registers_once_and_releases_gate() {
    let h = harness(ScriptedCloud::answering(vec![CloudScript::Assign("abc123")]));

    let record_id = h
        .coordinator
        .handle_tap(|| LocalAnchorHandle::new(11))
        .expect("first tap should start a note");
    assert!(h.coordinator.is_creating());

    let ticket = expect_upload(
        h.coordinator
            .submit_note(record_id, Some("Hello".to_string()))
            .expect("note should be accepted"),
    );

    h.coordinator.report_progress(0.3);
    thread::sleep(Duration::from_millis(60));
    assert_eq!(h.cloud.upload_count(), 0, "upload must wait for scan quality");
    assert!(h.coordinator.is_creating());

    h.coordinator.report_progress(1.0);
    let outcome = ticket.join();

    assert_eq!(
        outcome,
        UploadOutcome::Saved {
            identifier: "abc123".to_string(),
            registered: true,
        }
    );
    assert_eq!(
        h.directory.registrations(),
        vec![("abc123".to_string(), "helloworld".to_string())]
    );
    assert!(!h.coordinator.is_creating());

    let uploads = h.cloud.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, 11);
    assert_eq!(uploads[0].1.property("note"), Some("Hello"));

    assert_eq!(
        h.presenter.visuals_for(record_id),
        vec![
            Visual::Created,
            Visual::Scanning,
            Visual::Uploading,
            Visual::Saved
        ]
    );
    let adopted = h.presenter.adopted();
    assert_eq!(adopted.len(), 1);
    assert_eq!(adopted[0].state, AnchorState::Saved);
    assert_eq!(adopted[0].identifier, "abc123");
}

#[test]
fn cancelled_note_makes_no_remote_calls_and_destroys_local_anchor() {
    let h = harness(ScriptedCloud::default());

    let record_id = h
        .coordinator
        .handle_tap(|| LocalAnchorHandle::new(21))
        .expect("tap should start a note");
    let disposition = h
        .coordinator
        .submit_note(record_id, None)
        .expect("cancel should be accepted");

    assert!(matches!(disposition, NoteDisposition::Cancelled));
    assert!(!h.coordinator.is_creating());
    assert_eq!(h.cloud.upload_count(), 0);
    assert!(h.directory.registrations().is_empty());
    assert_eq!(h.presenter.discarded(), vec![(record_id, 21)]);
    assert!(h.presenter.adopted().is_empty());
}

#[test]
fn blank_note_counts_as_cancel() {
    let h = harness(ScriptedCloud::default());
    let record_id = h
        .coordinator
        .handle_tap(|| LocalAnchorHandle::new(22))
        .expect("tap should start a note");

    let disposition = h
        .coordinator
        .submit_note(record_id, Some("   ".to_string()))
        .expect("blank note should be accepted as cancel");
    assert!(matches!(disposition, NoteDisposition::Cancelled));
    assert!(!h.coordinator.is_creating());
}

#[test]
fn second_tap_while_scanning_is_dropped_without_creating_an_anchor() {
    let h = harness(ScriptedCloud::answering(vec![CloudScript::Assign("first")]));
    let record_id = h
        .coordinator
        .handle_tap(|| LocalAnchorHandle::new(31))
        .expect("first tap should start a note");
    let ticket = expect_upload(
        h.coordinator
            .submit_note(record_id, Some("one".to_string()))
            .expect("note should be accepted"),
    );

    let anchors_created = Cell::new(0);
    let second = h.coordinator.handle_tap(|| {
        anchors_created.set(anchors_created.get() + 1);
        LocalAnchorHandle::new(32)
    });

    assert_eq!(second, None);
    assert_eq!(anchors_created.get(), 0);
    assert_eq!(h.presenter.note_requests.lock().unwrap().len(), 1);

    h.coordinator.report_progress(1.0);
    assert!(matches!(ticket.join(), UploadOutcome::Saved { .. }));
    assert!(h
        .coordinator
        .handle_tap(|| LocalAnchorHandle::new(33))
        .is_some());
}

#[test]
fn rejected_upload_releases_gate_and_never_registers() {
    let h = harness(ScriptedCloud::answering(vec![CloudScript::Fail(
        UploadError::Rejected("quota exceeded".to_string()),
    )]));
    h.coordinator.report_progress(2.0);

    let record_id = h
        .coordinator
        .handle_tap(|| LocalAnchorHandle::new(41))
        .expect("tap should start a note");
    let ticket = expect_upload(
        h.coordinator
            .submit_note(record_id, Some("doomed".to_string()))
            .expect("note should be accepted"),
    );

    assert_eq!(
        ticket.join(),
        UploadOutcome::Failed(UploadError::Rejected("quota exceeded".to_string()))
    );
    assert!(!h.coordinator.is_creating());
    assert!(h.directory.registrations().is_empty());
    assert!(h.presenter.adopted().is_empty());
    assert!(h.presenter.discarded().is_empty());
}

#[test]
fn success_without_identifier_is_a_failure() {
    let h = harness(ScriptedCloud::answering(vec![
        CloudScript::SucceedWithoutIdentifier,
    ]));
    h.coordinator.report_progress(1.0);

    let record_id = h
        .coordinator
        .handle_tap(|| LocalAnchorHandle::new(42))
        .expect("tap should start a note");
    let ticket = expect_upload(
        h.coordinator
            .submit_note(record_id, Some("no id".to_string()))
            .expect("note should be accepted"),
    );

    assert_eq!(
        ticket.join(),
        UploadOutcome::Failed(UploadError::MissingIdentifier)
    );
    assert!(h.directory.registrations().is_empty());
    assert!(!h.coordinator.is_creating());
}

#[test]
fn scan_timeout_fails_workflow_and_releases_gate() {
    let mut config = fast_config();
    config.scan_timeout_ms = Some(50);
    let h = harness_with(
        config,
        RecordingDirectory::default(),
        ScriptedCloud::answering(vec![CloudScript::Assign("never")]),
    );

    let record_id = h
        .coordinator
        .handle_tap(|| LocalAnchorHandle::new(51))
        .expect("tap should start a note");
    let ticket = expect_upload(
        h.coordinator
            .submit_note(record_id, Some("waiting".to_string()))
            .expect("note should be accepted"),
    );

    assert!(matches!(
        ticket.join(),
        UploadOutcome::Failed(UploadError::ScanTimedOut { .. })
    ));
    assert_eq!(h.cloud.upload_count(), 0);
    assert!(!h.coordinator.is_creating());
}

#[test]
fn note_for_unknown_record_is_rejected_and_keeps_pending_note() {
    let h = harness(ScriptedCloud::default());

    let stray = uuid::Uuid::new_v4();
    assert!(matches!(
        h.coordinator.submit_note(stray, Some("x".to_string())),
        Err(CoordinatorError::NoPendingRecord(_))
    ));

    let record_id = h
        .coordinator
        .handle_tap(|| LocalAnchorHandle::new(61))
        .expect("tap should start a note");
    assert!(matches!(
        h.coordinator.submit_note(stray, Some("x".to_string())),
        Err(CoordinatorError::RecordMismatch { .. })
    ));
    assert!(h.coordinator.is_creating());

    let disposition = h
        .coordinator
        .submit_note(record_id, None)
        .expect("pending record should still accept its answer");
    assert!(matches!(disposition, NoteDisposition::Cancelled));
}

#[test]
fn begin_session_resets_scan_progress() {
    let h = harness(ScriptedCloud::default());
    h.coordinator.progress_observer().on_progress(0.8);
    assert_eq!(h.coordinator.scan_progress(), 0.8);

    h.coordinator.begin_session();
    assert_eq!(h.coordinator.scan_progress(), 0.0);
}

#[test]
fn interrupted_upload_releases_gate_and_never_registers() {
    let h = harness(ScriptedCloud::answering(vec![CloudScript::Fail(
        UploadError::Interrupted,
    )]));
    h.coordinator.report_progress(1.0);

    let record_id = h
        .coordinator
        .handle_tap(|| LocalAnchorHandle::new(71))
        .expect("tap should start a note");
    let ticket = expect_upload(
        h.coordinator
            .submit_note(record_id, Some("cut short".to_string()))
            .expect("note should be accepted"),
    );

    assert_eq!(
        ticket.join(),
        UploadOutcome::Failed(UploadError::Interrupted)
    );
    assert_eq!(h.cloud.upload_count(), 1);
    assert!(!h.coordinator.is_creating());
    assert!(h.directory.registrations().is_empty());
    assert!(h.presenter.adopted().is_empty());
}

#[test]
fn panicking_presenter_fails_worker_and_releases_gate() {
    let presenter = RecordingPresenter {
        panic_on: Some(Visual::Scanning),
        ..RecordingPresenter::default()
    };
    let h = harness_with_presenter(
        fast_config(),
        RecordingDirectory::default(),
        ScriptedCloud::answering(vec![CloudScript::Assign("unused")]),
        presenter,
    );
    h.coordinator.report_progress(1.0);

    let record_id = h
        .coordinator
        .handle_tap(|| LocalAnchorHandle::new(72))
        .expect("tap should start a note");
    let ticket = expect_upload(
        h.coordinator
            .submit_note(record_id, Some("boom".to_string()))
            .expect("note should be accepted"),
    );

    assert_eq!(
        ticket.join(),
        UploadOutcome::Failed(UploadError::WorkerPanicked)
    );
    assert!(!h.coordinator.is_creating());
    assert_eq!(h.cloud.upload_count(), 0);
    assert!(h.directory.registrations().is_empty());
    assert!(h
        .coordinator
        .handle_tap(|| LocalAnchorHandle::new(73))
        .is_some());
}

#[test]
fn ending_session_interrupts_scan_wait_and_refuses_taps() {
    let h = harness(ScriptedCloud::answering(vec![CloudScript::Assign("late")]));

    let record_id = h
        .coordinator
        .handle_tap(|| LocalAnchorHandle::new(81))
        .expect("tap should start a note");
    let ticket = expect_upload(
        h.coordinator
            .submit_note(record_id, Some("never scanned".to_string()))
            .expect("note should be accepted"),
    );
    thread::sleep(Duration::from_millis(30));
    assert!(!ticket.is_finished());

    h.coordinator.end_session();

    assert_eq!(
        ticket.join(),
        UploadOutcome::Failed(UploadError::Interrupted)
    );
    assert!(!h.coordinator.is_creating());
    assert_eq!(h.cloud.upload_count(), 0);
    assert!(h.directory.registrations().is_empty());

    let anchors_created = Cell::new(0);
    let tap = h.coordinator.handle_tap(|| {
        anchors_created.set(anchors_created.get() + 1);
        LocalAnchorHandle::new(82)
    });
    assert_eq!(tap, None);
    assert_eq!(anchors_created.get(), 0);
}
