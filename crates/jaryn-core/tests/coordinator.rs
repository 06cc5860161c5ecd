//! Integration tests for optimistic and confirm-first mutations.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::time::Duration;

use common::{FakeMail, Harness, email};
use jaryn_core::{
    Error, Flag, MessageId, MutationOutcome, NotificationKind, OutgoingEmail, RefreshReason,
    SortBy, ValidationError,
};

fn id(s: &str) -> MessageId {
    MessageId::from(s)
}

fn starred(harness: &Harness, message: &str) -> Option<bool> {
    harness
        .coordinator
        .with_view(|v| v.flag(&id(message), Flag::Starred))
}

#[tokio::test(start_paused = true)]
async fn test_star_applies_before_confirmation() {
    let harness = Harness::with_inbox(vec![email("m1", "Hello")]).await;

    let outcome = harness.coordinator.set_starred(&id("m1"), true).await.unwrap();
    assert_eq!(outcome, MutationOutcome::AppliedBeforeConfirmation);
    assert_eq!(starred(&harness, "m1"), Some(true));
    assert_eq!(harness.api.calls().last().unwrap(), "set_starred m1 true");
}

#[tokio::test(start_paused = true)]
async fn test_star_twice_is_idempotent() {
    let harness = Harness::with_inbox(vec![email("m1", "Hello")]).await;

    harness.coordinator.set_starred(&id("m1"), true).await.unwrap();
    assert_eq!(harness.api.starred_on_server("m1"), Some(true));
    harness.coordinator.set_starred(&id("m1"), true).await.unwrap();
    assert_eq!(starred(&harness, "m1"), Some(true));
    assert_eq!(harness.api.starred_on_server("m1"), Some(true));
    assert_eq!(harness.api.count("set_starred"), 2);

    harness.coordinator.set_starred(&id("m1"), false).await.unwrap();
    harness.coordinator.set_starred(&id("m1"), false).await.unwrap();
    assert_eq!(starred(&harness, "m1"), Some(false));
    assert_eq!(harness.api.starred_on_server("m1"), Some(false));
}

#[tokio::test(start_paused = true)]
async fn test_mark_read_twice_leaves_server_read() {
    let harness = Harness::with_inbox(vec![email("m1", "Hello")]).await;

    harness.coordinator.mark_read(&id("m1"), true).await.unwrap();
    harness.coordinator.mark_read(&id("m1"), true).await.unwrap();
    assert_eq!(harness.api.read_on_server("m1"), Some(true));
    assert_eq!(harness.api.count("set_read"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_toggle_restores_prior_flag() {
    let harness = Harness::with_inbox(vec![email("m1", "Hello")]).await;
    harness.api.fail("set_starred", 500);
    harness.api.delay("set_starred", Duration::from_millis(50));
    let mut notifications = harness.signals.notifications.subscribe();

    let coordinator = &harness.coordinator;
    let m1 = id("m1");
    let (result, seen) = tokio::join!(coordinator.toggle_star(&m1), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        starred(&harness, "m1")
    });

    assert_eq!(seen, Some(true), "flag flips while the request is pending");
    assert!(matches!(result, Err(Error::Server { status: 500, .. })));
    assert_eq!(starred(&harness, "m1"), Some(false));
    assert_eq!(harness.api.starred_on_server("m1"), None);
    assert_eq!(
        notifications.try_recv().unwrap().kind,
        NotificationKind::Error
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_toggle_after_removal_is_noop() {
    let harness = Harness::with_inbox(vec![email("m1", "Hello"), email("m2", "Other")]).await;
    harness.api.fail("set_read", 500);
    harness.api.delay("set_read", Duration::from_millis(50));

    let coordinator = &harness.coordinator;
    let m1 = id("m1");
    let (result, ()) = tokio::join!(coordinator.mark_read(&m1, true), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        coordinator.with_view(|v| {
            v.remove(&[id("m1")]);
        });
    });

    assert!(result.is_err());
    let view = coordinator.snapshot();
    assert!(!view.contains(&id("m1")));
    assert_eq!(view.items().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_auth_failure_is_not_notified() {
    let harness = Harness::with_inbox(vec![email("m1", "Hello")]).await;
    harness.api.fail("set_starred", 401);
    let mut notifications = harness.signals.notifications.subscribe();

    let result = harness.coordinator.set_starred(&id("m1"), true).await;
    assert!(matches!(result, Err(Error::Unauthorized)));
    assert_eq!(starred(&harness, "m1"), Some(false));
    assert!(notifications.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_mark_read_emits_signals() {
    let harness = Harness::with_inbox(vec![email("m1", "Hello")]).await;
    let mut read = harness.signals.message_read.subscribe();
    let mut unread = harness.signals.unread_count.subscribe();

    harness.coordinator.mark_read(&id("m1"), true).await.unwrap();

    assert_eq!(read.try_recv(), Some(id("m1")));
    assert_eq!(unread.try_recv(), Some(()));
    assert_eq!(
        harness.coordinator.with_view(|v| v.flag(&id("m1"), Flag::Read)),
        Some(true)
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_delete_leaves_view_untouched() {
    let harness = Harness::with_inbox(vec![email("m1", "Hello"), email("m2", "Other")]).await;
    harness.api.fail("bulk_delete", 500);
    harness.coordinator.with_view(|v| {
        v.select_all();
    });
    let mut cleared = harness.signals.selection_clear.subscribe();

    let result = harness.coordinator.delete_selected().await;
    assert!(result.is_err());

    let view = harness.coordinator.snapshot();
    assert_eq!(view.items().len(), 2);
    assert_eq!(view.selected().len(), 2);
    assert!(cleared.try_recv().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_confirm_first_waits_for_server() {
    let harness = Harness::with_inbox(vec![email("m1", "Hello")]).await;
    harness.api.delay("delete_email", Duration::from_millis(50));

    let coordinator = &harness.coordinator;
    let m1 = id("m1");
    let (outcome, present) = tokio::join!(coordinator.delete(&m1), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        coordinator.with_view(|v| v.contains(&id("m1")))
    });

    assert!(present, "item stays until the server confirms");
    assert_eq!(outcome.unwrap(), MutationOutcome::AppliedAfterConfirmation);
    assert!(!coordinator.snapshot().contains(&id("m1")));
}

#[tokio::test(start_paused = true)]
async fn test_bulk_delete_including_open_message() {
    let harness = Harness::with_inbox(vec![
        email("m1", "One"),
        email("m2", "Two"),
        email("m3", "Three"),
        email("m4", "Four"),
    ])
    .await;
    harness.coordinator.with_view(|v| {
        v.select(&id("m1"));
        v.select(&id("m2"));
        v.select(&id("m3"));
        v.open_detail(email("m2", "Two"));
    });
    let mut cleared = harness.signals.selection_clear.subscribe();

    let outcome = harness.coordinator.delete_selected().await.unwrap();
    assert_eq!(outcome, MutationOutcome::AppliedAfterConfirmation);

    let view = harness.coordinator.snapshot();
    assert!(view.selected().is_empty());
    assert!(view.detail().is_none());
    assert_eq!(view.items().len(), 1);
    assert_eq!(harness.navigator.backs(), 1);
    assert_eq!(cleared.drain().len(), 1);
    assert_eq!(harness.api.calls().last().unwrap(), "bulk_delete m1,m2,m3");
}

#[tokio::test(start_paused = true)]
async fn test_bulk_move_refreshes_list() {
    let harness = Harness::with_inbox(vec![email("m1", "One"), email("m2", "Two")]).await;
    harness.coordinator.with_view(|v| {
        v.select_all();
    });
    let mut refresh = harness.signals.list_refresh.subscribe();

    harness.coordinator.move_selected("work").await.unwrap();

    assert!(harness.coordinator.snapshot().items().is_empty());
    assert_eq!(refresh.try_recv(), Some(RefreshReason::Local));
    assert_eq!(harness.navigator.backs(), 0);
    assert_eq!(harness.api.calls().last().unwrap(), "bulk_move m1,m2 work");
}

#[tokio::test(start_paused = true)]
async fn test_empty_selection_is_rejected() {
    let harness = Harness::with_inbox(vec![email("m1", "One")]).await;

    let result = harness.coordinator.delete_selected().await;
    assert!(matches!(
        result,
        Err(Error::Validation(ref errors)) if errors == &[ValidationError::EmptySelection]
    ));
    assert_eq!(harness.api.count("bulk_delete"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_restore_and_permanent_delete() {
    let harness = Harness::new(
        FakeMail::new().with_page("trash", vec![email("t1", "Old"), email("t2", "Older")]),
    );
    harness
        .coordinator
        .open_folder("trash", SortBy::Date)
        .await
        .unwrap();

    harness.coordinator.bulk_restore(&[id("t1")]).await.unwrap();
    harness
        .coordinator
        .permanent_delete(&[id("t2")])
        .await
        .unwrap();

    assert!(harness.coordinator.snapshot().items().is_empty());
    assert_eq!(harness.api.count("bulk_restore"), 1);
    assert_eq!(harness.api.count("permanent_delete"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_response_after_navigation_is_discarded() {
    let harness = Harness::with_inbox(vec![email("m1", "One"), email("m2", "Two")]).await;
    harness.api.delay("bulk_delete", Duration::from_millis(50));
    harness.coordinator.with_view(|v| {
        v.select_all();
    });

    let coordinator = &harness.coordinator;
    let (result, ()) = tokio::join!(coordinator.delete_selected(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        coordinator.with_view(|v| {
            v.navigate("sent");
        });
    });

    result.unwrap();
    let view = coordinator.snapshot();
    assert_eq!(view.folder(), "sent");
    assert_eq!(harness.navigator.backs(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stale_page_is_discarded() {
    let harness = Harness::new(
        FakeMail::new()
            .with_page("inbox", vec![email("m1", "One")])
            .with_page("sent", vec![email("s1", "Sent")]),
    );
    harness.api.delay("list_folder", Duration::from_millis(50));

    let coordinator = &harness.coordinator;
    let (slow, ()) = tokio::join!(coordinator.load_page(1, SortBy::Date), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        coordinator.with_view(|v| {
            v.navigate("sent");
        });
    });
    slow.unwrap();
    assert!(coordinator.snapshot().items().is_empty());

    coordinator.load_page(1, SortBy::Date).await.unwrap();
    let view = coordinator.snapshot();
    assert_eq!(view.items().len(), 1);
    assert!(view.contains(&id("s1")));
}

#[tokio::test(start_paused = true)]
async fn test_open_message_marks_read() {
    let harness = Harness::new(
        FakeMail::new()
            .with_page("inbox", vec![email("m1", "One")])
            .with_email(email("m1", "One")),
    );
    harness
        .coordinator
        .load_page(1, SortBy::Date)
        .await
        .unwrap();
    let mut read = harness.signals.message_read.subscribe();

    let opened = harness.coordinator.open_message(&id("m1")).await.unwrap();
    assert!(opened.is_read);

    let view = harness.coordinator.snapshot();
    assert_eq!(view.detail().unwrap().message_id, id("m1"));
    assert_eq!(view.flag(&id("m1"), Flag::Read), Some(true));
    assert_eq!(read.try_recv(), Some(id("m1")));
}

#[tokio::test(start_paused = true)]
async fn test_send_validates_before_request() {
    let harness = Harness::new(FakeMail::new());
    let mut notifications = harness.signals.notifications.subscribe();

    let invalid = OutgoingEmail::new(Vec::<String>::new(), "", "");
    assert!(matches!(
        harness.coordinator.send(&invalid).await,
        Err(Error::Validation(_))
    ));
    assert_eq!(harness.api.count("send_email"), 0);
    assert_eq!(
        notifications.try_recv().unwrap().kind,
        NotificationKind::Error
    );

    let valid = OutgoingEmail::new(["bob@jaryn.com"], "Hi", "Body");
    harness.coordinator.send(&valid).await.unwrap();
    assert_eq!(harness.api.count("send_email"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_send_draft_removes_it_from_drafts() {
    let harness = Harness::new(FakeMail::new().with_page("drafts", vec![email("d1", "Draft")]));
    harness
        .coordinator
        .open_folder("drafts", SortBy::Date)
        .await
        .unwrap();

    harness.coordinator.send_draft(&id("d1")).await.unwrap();
    assert!(harness.coordinator.snapshot().items().is_empty());
}
