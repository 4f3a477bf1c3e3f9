use super::*;
use crate::config_store::ConfigStore;
use shared::domain::{ImageFormat, RenderScale};

fn inputs(value: &str) -> PreviewInputs {
    let mut store = ConfigStore::new();
    store.set("text", value);
    PreviewInputs {
        config: store.get_all(),
        metadata: MetadataEntry::default(),
    }
}

fn response(tag: &str) -> PreviewResult {
    PreviewResult {
        image_bytes: tag.as_bytes().to_vec(),
        image_format: ImageFormat::Webp,
        width: 64,
        height: 32,
        title: tag.to_string(),
        loading: false,
    }
}

#[test]
fn out_of_order_completion_keeps_latest_issued_result() {
    let mut sync = PreviewSync::new(true);
    let t1 = sync.observe(&inputs("1")).expect("first request");
    let t2 = sync.observe(&inputs("2")).expect("no result yet, not coalesced");
    let t3 = sync.observe(&inputs("3")).expect("no result yet, not coalesced");
    assert_eq!((t1.seq, t2.seq, t3.seq), (1, 2, 3));

    assert_eq!(sync.complete(2, Ok(response("2"))), PreviewOutcome::Applied);
    assert!(sync.is_loading());
    assert_eq!(sync.complete(3, Ok(response("3"))), PreviewOutcome::Applied);
    assert_eq!(sync.complete(1, Ok(response("1"))), PreviewOutcome::Superseded);

    let current = sync.current().expect("current preview");
    assert_eq!(current.title, "3");
    assert!(!current.loading);
    assert!(!sync.is_loading());
}

#[test]
fn identical_inputs_do_not_issue_requests() {
    let mut sync = PreviewSync::new(true);
    assert!(sync.observe(&inputs("a")).is_some());
    assert!(sync.observe(&inputs("a")).is_none());
    assert_eq!(sync.last_issued(), 1);
}

#[test]
fn changes_coalesce_once_a_result_exists() {
    let mut sync = PreviewSync::new(true);
    let first = sync.observe(&inputs("a")).expect("first");
    sync.complete(first.seq, Ok(response("a")));

    let second = sync.observe(&inputs("b")).expect("idle, so issued");
    assert!(sync.observe(&inputs("c")).is_none());
    assert!(sync.observe(&inputs("d")).is_none());
    assert!(sync.take_trailing().is_none(), "still in flight");

    sync.complete(second.seq, Ok(response("b")));
    let trailing = sync.take_trailing().expect("coalesced change is flushed");
    assert_eq!(trailing.seq, 3);
    assert_eq!(trailing.submission.get("text"), Some("d"));
    assert!(sync.take_trailing().is_none());
}

#[test]
fn without_trailing_refresh_the_next_change_retriggers() {
    let mut sync = PreviewSync::new(false);
    let first = sync.observe(&inputs("a")).expect("first");
    sync.complete(first.seq, Ok(response("a")));
    let second = sync.observe(&inputs("b")).expect("second");
    assert!(sync.observe(&inputs("c")).is_none());

    sync.complete(second.seq, Ok(response("b")));
    assert!(sync.take_trailing().is_none());

    let next = sync.observe(&inputs("e")).expect("next change after completion");
    assert_eq!(next.submission.get("text"), Some("e"));
}

#[test]
fn failure_keeps_last_rendered_image() {
    let mut sync = PreviewSync::new(true);
    let first = sync.observe(&inputs("a")).expect("first");
    sync.complete(first.seq, Ok(response("a")));
    let second = sync.observe(&inputs("b")).expect("second");
    assert!(sync.current().is_some_and(|p| p.loading));

    let outcome = sync.complete(
        second.seq,
        Err(PreviewError::Transport("connection refused".into())),
    );
    assert!(matches!(outcome, PreviewOutcome::Failed(PreviewError::Transport(_))));
    let current = sync.current().expect("stale image stays");
    assert_eq!(current.title, "a");
    assert!(!current.loading);
}

#[test]
fn stale_failures_are_discarded() {
    let mut sync = PreviewSync::new(true);
    let t1 = sync.observe(&inputs("a")).expect("first");
    let t2 = sync.observe(&inputs("b")).expect("second");
    sync.complete(t2.seq, Ok(response("b")));

    let outcome = sync.complete(t1.seq, Err(PreviewError::Render("boom".into())));
    assert_eq!(outcome, PreviewOutcome::Superseded);
    assert_eq!(sync.current().map(|p| p.title.as_str()), Some("b"));
}

#[test]
fn submission_carries_large_entries_and_metadata() {
    let mut store = ConfigStore::new();
    let large = "p".repeat(4096);
    store.set("photo", &large);
    let inputs = PreviewInputs {
        config: store.get_all(),
        metadata: MetadataEntry {
            render_scale: Some(RenderScale::Double),
            timezone: "UTC".into(),
            locale: String::new(),
        },
    };

    let submission = PreviewSubmission::build(&inputs);
    assert_eq!(submission.get("photo"), Some(large.as_str()));
    assert_eq!(submission.get("_renderScale"), Some("2"));
    assert_eq!(submission.get("_metaTimezone"), Some("UTC"));
    assert_eq!(submission.get("_metaLocale"), Some(""));
}
