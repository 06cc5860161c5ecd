//! Integration tests for the attachment upload pipeline.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{FakeAttachments, FakeMail};
use jaryn_core::{
    Error, NotificationKind, OutgoingEmail, OutgoingFile, Signals, UploadMode, UploadPipeline,
    UploadProgressHandle,
};
use tokio::time::Instant;

const SENDER: &str = "alice@jaryn.com";

fn pipeline(attachments: &Arc<FakeAttachments>) -> UploadPipeline<FakeAttachments> {
    pipeline_with(attachments, &Signals::new())
}

fn pipeline_with(
    attachments: &Arc<FakeAttachments>,
    signals: &Signals,
) -> UploadPipeline<FakeAttachments> {
    UploadPipeline::new(
        Arc::clone(attachments),
        UploadProgressHandle::new(),
        signals.clone(),
        Duration::from_secs(1),
    )
}

fn message() -> OutgoingEmail {
    OutgoingEmail::new(["bob@jaryn.com"], "Report", "See attached")
}

fn files() -> Vec<OutgoingFile> {
    vec![
        OutgoingFile::new("report.pdf", &b"%PDF-1.7"[..]),
        OutgoingFile::new("photo.png", &b"\x89PNG"[..]),
    ]
}

#[tokio::test(start_paused = true)]
async fn test_non_transactional_send_references_reserved_ids() {
    let attachments = Arc::new(FakeAttachments::new());
    let mail = FakeMail::new();
    let pipeline = pipeline(&attachments);

    pipeline
        .send(&mail, message(), files(), SENDER, UploadMode::NonTransactional)
        .await
        .unwrap();
    pipeline.flush().await;

    assert_eq!(attachments.reserved.load(Ordering::SeqCst), 2);
    let sent = mail.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let refs = &sent[0].attachments;
    assert_eq!(refs.len(), 2);
    assert_eq!(refs[0].file_name, "report.pdf");
    assert_eq!(refs[1].file_name, "photo.png");
    assert_ne!(refs[0].id, refs[1].id);
    assert_eq!(refs[0].accessors, vec!["bob@jaryn.com", SENDER]);

    let uploads = attachments.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 2);
    for (id, descriptor) in uploads.iter() {
        let reference = refs.iter().find(|r| r.file_name == descriptor.file_name).unwrap();
        assert_eq!(id.as_deref(), Some(reference.id.as_str()));
    }
    drop(uploads);

    let progress = pipeline.progress().current();
    assert_eq!(progress.completed, 2);
    assert!(!progress.in_progress);
}

#[tokio::test(start_paused = true)]
async fn test_non_transactional_does_not_wait_for_uploads() {
    let attachments = Arc::new(FakeAttachments::new());
    *attachments.upload_delay.lock().unwrap() = Some(Duration::from_secs(30));
    let mail = FakeMail::new();
    let pipeline = pipeline(&attachments);

    let started = Instant::now();
    pipeline
        .send(&mail, message(), files(), SENDER, UploadMode::NonTransactional)
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(mail.count("send_email"), 1);
    assert!(pipeline.progress().current().in_progress);

    pipeline.flush().await;
    assert_eq!(attachments.uploaded_names(), vec!["photo.png", "report.pdf"]);
}

#[tokio::test(start_paused = true)]
async fn test_background_uploads_outlive_the_pipeline() {
    let attachments = Arc::new(FakeAttachments::new());
    *attachments.upload_delay.lock().unwrap() = Some(Duration::from_secs(1));
    let mail = FakeMail::new();
    let pipeline = pipeline(&attachments);
    let progress = pipeline.progress().clone();

    pipeline
        .send(&mail, message(), files(), SENDER, UploadMode::NonTransactional)
        .await
        .unwrap();
    drop(pipeline);
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(mail.count("send_email"), 1);
    assert_eq!(attachments.uploaded_names(), vec!["photo.png", "report.pdf"]);
    let current = progress.current();
    assert_eq!((current.completed, current.failed, current.total), (2, 0, 2));
    assert!(!current.in_progress);
}

#[tokio::test(start_paused = true)]
async fn test_background_failure_still_sends() {
    let attachments = Arc::new(FakeAttachments::new());
    attachments.fail_upload_of("photo.png");
    let mail = FakeMail::new();
    let pipeline = pipeline(&attachments);

    pipeline
        .send(&mail, message(), files(), SENDER, UploadMode::NonTransactional)
        .await
        .unwrap();
    pipeline.flush().await;

    assert_eq!(mail.count("send_email"), 1);
    let progress = pipeline.progress().current();
    assert_eq!((progress.completed, progress.failed), (1, 1));
}

#[tokio::test(start_paused = true)]
async fn test_failed_reservation_aborts_send() {
    let attachments = Arc::new(FakeAttachments::new());
    *attachments.fail_reserve.lock().unwrap() = true;
    let mail = FakeMail::new();

    let result = pipeline(&attachments)
        .send(&mail, message(), files(), SENDER, UploadMode::NonTransactional)
        .await;
    assert!(matches!(result, Err(Error::Server { status: 503, .. })));
    assert_eq!(mail.count("send_email"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_transactional_send_uses_server_descriptors() {
    let attachments = Arc::new(FakeAttachments::new());
    let mail = FakeMail::new();
    let pipeline = pipeline(&attachments);

    let started = Instant::now();
    pipeline
        .send(&mail, message(), files(), SENDER, UploadMode::Transactional)
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(attachments.reserved.load(Ordering::SeqCst), 0);
    let sent = mail.sent.lock().unwrap();
    let ids: Vec<&str> = sent[0].attachments.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["srv-report.pdf", "srv-photo.png"]);
}

#[tokio::test(start_paused = true)]
async fn test_transactional_failure_abandons_send() {
    let attachments = Arc::new(FakeAttachments::new());
    attachments.fail_upload_of("photo.png");
    let mail = FakeMail::new();
    let pipeline = pipeline(&attachments);

    let result = pipeline
        .send(&mail, message(), files(), SENDER, UploadMode::Transactional)
        .await;

    match result {
        Err(Error::Upload(reason)) => assert!(reason.contains("photo.png")),
        other => panic!("expected upload error, got {other:?}"),
    }
    assert_eq!(mail.count("send_email"), 0);
    assert!(!pipeline.progress().current().in_progress);
}

#[tokio::test(start_paused = true)]
async fn test_both_modes_keep_name_and_type() {
    let file = OutgoingFile::new("notes.docx", &b"PK"[..]);
    let mime = file.mime_type.clone();

    for mode in [UploadMode::NonTransactional, UploadMode::Transactional] {
        let attachments = Arc::new(FakeAttachments::new());
        let mail = FakeMail::new();
        let pipeline = pipeline(&attachments);
        pipeline
            .send(&mail, message(), vec![file.clone()], SENDER, mode)
            .await
            .unwrap();
        pipeline.flush().await;

        let sent = mail.sent.lock().unwrap();
        let referenced = &sent[0].attachments[0];
        assert_eq!(referenced.file_name, "notes.docx");
        assert_eq!(referenced.mime_type, mime);

        let uploads = attachments.uploads.lock().unwrap();
        let stored = &uploads[0].1;
        assert_eq!(stored.file_name, "notes.docx");
        assert_eq!(stored.mime_type, mime);
    }
}

#[tokio::test(start_paused = true)]
async fn test_invalid_message_sends_nothing() {
    let attachments = Arc::new(FakeAttachments::new());
    let mail = FakeMail::new();
    let invalid = OutgoingEmail::new(["not-an-address"], "Hi", "Body");

    let result = pipeline(&attachments)
        .send(&mail, invalid, files(), SENDER, UploadMode::Transactional)
        .await;
    assert!(matches!(result, Err(Error::Validation(_))));
    assert!(attachments.uploads.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_send_outcomes_are_notified() {
    let signals = Signals::new();
    let mut notes = signals.notifications.subscribe();
    let attachments = Arc::new(FakeAttachments::new());
    attachments.fail_upload_of("photo.png");
    let mail = FakeMail::new();
    let pipeline = pipeline_with(&attachments, &signals);

    pipeline
        .send(&mail, message(), files(), SENDER, UploadMode::Transactional)
        .await
        .unwrap_err();
    let failed = notes.drain();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].kind, NotificationKind::Error);
    assert!(failed[0].message.contains("photo.png"));

    *attachments.fail_file.lock().unwrap() = None;
    pipeline
        .send(&mail, message(), files(), SENDER, UploadMode::NonTransactional)
        .await
        .unwrap();
    let sent = notes.drain();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, NotificationKind::Success);
    assert_eq!(sent[0].message, "Email sent");
}

#[tokio::test(start_paused = true)]
async fn test_expired_session_is_not_notified() {
    let signals = Signals::new();
    let mut notes = signals.notifications.subscribe();
    let attachments = Arc::new(FakeAttachments::new());
    let mail = FakeMail::new();
    mail.fail("send_email", 401);

    let result = pipeline_with(&attachments, &signals)
        .send(&mail, message(), Vec::new(), SENDER, UploadMode::Transactional)
        .await;
    assert!(matches!(result, Err(Error::Unauthorized)));
    assert!(notes.drain().is_empty());
}
