use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use watchtower_core::event::{EventBus, StreamEvent};
use watchtower_core::panels::{
    DisplayImage, ImageKind, PhotoConfig, PhotoPanel, PhotoState, ResponseConfig, ResponsePanel,
    ResponseState, TimestampPanel, TimestampState,
};

// Base64 payloads used across the photo tests
const ANNOTATED_B64: &str = "YW5ub3RhdGVk";
const RAW_B64: &str = "cmF3";

// =============================================================================
// Photo state machine
// =============================================================================

#[test]
fn photo_displays_latest_payload_for_selected_kind() {
    let mut state = PhotoState::new(ImageKind::Annotated);
    assert_eq!(state.display(), DisplayImage::Blank);

    assert!(state.record(ImageKind::Annotated, ANNOTATED_B64));
    assert_eq!(
        state.display(),
        DisplayImage::Frame {
            kind: ImageKind::Annotated,
            base64: ANNOTATED_B64.to_string()
        }
    );

    // A raw payload does not leak into the annotated view
    assert!(state.record(ImageKind::Raw, RAW_B64));
    assert_eq!(
        state.display(),
        DisplayImage::Frame {
            kind: ImageKind::Annotated,
            base64: ANNOTATED_B64.to_string()
        }
    );

    state.select(ImageKind::Raw);
    assert_eq!(
        state.display(),
        DisplayImage::Frame {
            kind: ImageKind::Raw,
            base64: RAW_B64.to_string()
        }
    );
}

#[test]
fn photo_toggle_to_missing_kind_degrades_to_blank() {
    let mut state = PhotoState::new(ImageKind::Annotated);
    assert!(state.record(ImageKind::Annotated, ANNOTATED_B64));

    state.select(ImageKind::Raw);
    assert_eq!(state.display(), DisplayImage::Blank);

    state.select(ImageKind::Annotated);
    assert!(matches!(state.display(), DisplayImage::Frame { .. }));
}

#[test]
fn photo_rejects_undecodable_payload() {
    let mut state = PhotoState::new(ImageKind::Annotated);
    assert!(state.record(ImageKind::Annotated, ANNOTATED_B64));

    assert!(!state.record(ImageKind::Annotated, "!!! not base64 !!!"));
    assert_eq!(
        state.display(),
        DisplayImage::Frame {
            kind: ImageKind::Annotated,
            base64: ANNOTATED_B64.to_string()
        }
    );
}

#[test]
fn photo_interleaving_always_shows_latest_of_selected_kind() {
    // Scripted interleaving of payload arrivals and toggle flips; after each
    // step the view must equal the latest payload of the selected kind.
    let mut state = PhotoState::new(ImageKind::Annotated);
    let mut latest_annotated: Option<&str> = None;
    let mut latest_raw: Option<&str> = None;

    enum Step {
        Arrive(ImageKind, &'static str),
        Flip(ImageKind),
    }
    let script = [
        Step::Flip(ImageKind::Raw),
        Step::Arrive(ImageKind::Annotated, "YQ=="),
        Step::Arrive(ImageKind::Raw, "Yg=="),
        Step::Flip(ImageKind::Annotated),
        Step::Arrive(ImageKind::Annotated, "Yw=="),
        Step::Flip(ImageKind::Raw),
        Step::Flip(ImageKind::Annotated),
        Step::Arrive(ImageKind::Raw, "ZA=="),
    ];

    for step in script {
        match step {
            Step::Arrive(kind, payload) => {
                assert!(state.record(kind, payload));
                match kind {
                    ImageKind::Annotated => latest_annotated = Some(payload),
                    ImageKind::Raw => latest_raw = Some(payload),
                }
            }
            Step::Flip(kind) => state.select(kind),
        }
        let expected = match state.selected() {
            ImageKind::Annotated => latest_annotated,
            ImageKind::Raw => latest_raw,
        };
        match expected {
            None => assert_eq!(state.display(), DisplayImage::Blank),
            Some(payload) => assert_eq!(
                state.display(),
                DisplayImage::Frame {
                    kind: state.selected(),
                    base64: payload.to_string()
                }
            ),
        }
    }
}

// =============================================================================
// Timestamp state machine
// =============================================================================

#[test]
fn timestamp_formats_epoch_seconds_as_time_of_day() {
    let mut state = TimestampState::default();
    assert!(state.apply("1700000000", "%H:%M:%S"));

    let label = state.label();
    assert_eq!(label.len(), 8, "time-of-day only: {label}");
    assert_eq!(&label[2..3], ":");
    assert_eq!(&label[5..6], ":");
}

#[test]
fn timestamp_ignores_malformed_payloads() {
    let mut state = TimestampState::default();
    assert!(state.apply("1700000000", "%H:%M:%S"));
    let before = state.label().to_string();

    assert!(!state.apply("not-a-number", "%H:%M:%S"));
    assert!(!state.apply("", "%H:%M:%S"));
    assert!(!state.apply("12.5", "%H:%M:%S"));
    assert_eq!(state.label(), before);
}

// =============================================================================
// Response state machine
// =============================================================================

#[test]
fn response_accumulator_grows_by_delta_lengths() {
    let mut state = ResponseState::default();
    state.begin_request();
    assert!(state.loading());
    assert_eq!(state.accumulator(), "");

    let deltas = ["Intruder ", "detected ", "near the gate"];
    for delta in deltas {
        let payload = serde_json::json!({ "response": delta }).to_string();
        assert!(state.apply_chunk(&payload, "response"));
    }
    let expected_len: usize = deltas.iter().map(|d| d.len()).sum();
    assert_eq!(state.accumulator().len(), expected_len);
    assert_eq!(state.accumulator(), "Intruder detected near the gate");
}

#[test]
fn response_reset_happens_exactly_once_per_cycle() {
    let mut state = ResponseState::default();
    state.begin_request();
    assert!(state.apply_chunk("{\"response\":\"old\"}", "response"));

    // A new cycle truncates the in-flight one
    state.begin_request();
    assert_eq!(state.accumulator(), "");
    assert!(state.apply_chunk("{\"response\":\"new\"}", "response"));
    assert_eq!(state.accumulator(), "new");
}

#[test]
fn response_malformed_chunk_changes_nothing() {
    let mut state = ResponseState::default();
    state.begin_request();
    assert!(state.apply_chunk("{\"response\":\"ok\"}", "response"));

    assert!(!state.apply_chunk("{not json", "response"));
    assert!(!state.apply_chunk("{\"other\":\"field\"}", "response"));
    assert!(!state.apply_chunk("{\"response\":42}", "response"));
    assert_eq!(state.accumulator(), "ok");
    assert!(state.loading(), "loading flag untouched by malformed chunks");
}

#[test]
fn response_commit_publishes_accumulator_without_touching_loading() {
    let mut state = ResponseState::default();
    state.begin_request();
    assert!(state.apply_chunk("{\"response\":\"all clear\"}", "response"));
    state.mark_response_started();

    state.commit();
    let view = state.view();
    assert_eq!(view.response, "all clear");
    assert!(!view.loading);

    // Commit does not clear the accumulator; only a new request start does
    assert_eq!(state.accumulator(), "all clear");
}

// =============================================================================
// End-to-end over the bus
// =============================================================================

async fn wait_changed<T: Clone>(rx: &mut tokio::sync::watch::Receiver<T>) -> T {
    timeout(Duration::from_millis(500), rx.changed())
        .await
        .expect("timeout waiting for panel update")
        .expect("panel task gone");
    rx.borrow().clone()
}

#[tokio::test]
async fn response_cycle_end_to_end() {
    let bus = Arc::new(EventBus::new());
    let (mut view, _handle) = ResponsePanel::new(bus.clone(), ResponseConfig::default()).start();

    bus.publish(StreamEvent::new("llm_request_start", "")).await;
    let v = wait_changed(&mut view).await;
    assert!(v.loading);
    assert_eq!(v.response, "");

    bus.publish(StreamEvent::new("llm_response", "{\"response\":\"Hello\"}"))
        .await;
    bus.publish(StreamEvent::new("llm_response", "{\"response\":\" world\"}"))
        .await;

    // Chunks accumulate internally; the view flips when the first token is out
    bus.publish(StreamEvent::new("llm_response_start", "")).await;
    let v = wait_changed(&mut view).await;
    assert!(!v.loading);
    assert_eq!(v.response, "", "nothing committed yet");

    bus.publish(StreamEvent::new("prompt", "person detection"))
        .await;
    let v = wait_changed(&mut view).await;
    assert_eq!(v.response, "Hello world");
    assert!(!v.loading, "loading stays as last set by llm_response_start");
}

#[tokio::test]
async fn response_malformed_chunk_is_silently_ignored_end_to_end() {
    let bus = Arc::new(EventBus::new());
    let (mut view, _handle) = ResponsePanel::new(bus.clone(), ResponseConfig::default()).start();

    bus.publish(StreamEvent::new("llm_request_start", "")).await;
    assert!(wait_changed(&mut view).await.loading);

    bus.publish(StreamEvent::new("llm_response", "{\"response\":\"Hi\"}"))
        .await;
    bus.publish(StreamEvent::new("llm_response", "garbage")).await;
    bus.publish(StreamEvent::new("prompt", "")).await;

    let v = wait_changed(&mut view).await;
    assert_eq!(v.response, "Hi");
}

#[tokio::test]
async fn photo_panel_end_to_end_with_toggle() {
    let bus = Arc::new(EventBus::new());
    let (mut view, toggle, _handle) = PhotoPanel::new(bus.clone(), PhotoConfig::default()).start();

    bus.publish(StreamEvent::new("annotated_image", ANNOTATED_B64))
        .await;
    let v = wait_changed(&mut view).await;
    assert_eq!(
        v,
        DisplayImage::Frame {
            kind: ImageKind::Annotated,
            base64: ANNOTATED_B64.to_string()
        }
    );

    // A raw frame arrives but annotated stays selected: no view change
    bus.publish(StreamEvent::new("raw_image", RAW_B64)).await;
    let unchanged = timeout(Duration::from_millis(200), view.changed()).await;
    assert!(unchanged.is_err(), "non-selected payload must not render");

    toggle.select(ImageKind::Raw).await.unwrap();
    let v = wait_changed(&mut view).await;
    assert_eq!(
        v,
        DisplayImage::Frame {
            kind: ImageKind::Raw,
            base64: RAW_B64.to_string()
        }
    );
}

#[tokio::test]
async fn photo_panel_toggle_before_any_payload_stays_blank() {
    let bus = Arc::new(EventBus::new());
    let (mut view, toggle, _handle) = PhotoPanel::new(bus, PhotoConfig::default()).start();

    toggle.select(ImageKind::Raw).await.unwrap();

    // Blank -> Blank is not a transition; the view never fires
    let unchanged = timeout(Duration::from_millis(200), view.changed()).await;
    assert!(unchanged.is_err());
    assert_eq!(*view.borrow(), DisplayImage::Blank);
}

#[tokio::test]
async fn timestamp_panel_retains_label_on_malformed_payload() {
    let bus = Arc::new(EventBus::new());
    let (mut view, _handle) =
        TimestampPanel::new(bus.clone(), Default::default()).start();

    bus.publish(StreamEvent::new("timestamp", "1700000000")).await;
    let label = wait_changed(&mut view).await;
    assert_eq!(label.len(), 8);

    bus.publish(StreamEvent::new("timestamp", "garbage")).await;
    let unchanged = timeout(Duration::from_millis(200), view.changed()).await;
    assert!(unchanged.is_err(), "malformed payload must not update the label");
    assert_eq!(*view.borrow(), label);
}
