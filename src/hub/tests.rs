//! Hub integration tests against the in-memory remote

use super::*;
use crate::mvc::StateSchema;
use crate::remote::{MemoryRemote, ResourceStore};
use crate::render::RecordingRenderer;
use serde_json::json;
use tokio::sync::broadcast::Receiver;

const MIXER: &str = "/api/mixer";

fn edit(value: Value) -> PartialState {
    value.as_object().cloned().unwrap()
}

struct Fixture {
    remote: Arc<MemoryRemote>,
    left: RecordingRenderer,
    right: RecordingRenderer,
    hub: Hub,
}

/// Two widgets sharing the `mixer` model, both writing `volume`
fn fixture(timeout: Duration) -> Fixture {
    let store = ResourceStore::new().with_document(MIXER, json!({"volume": 3, "mute": false}));
    let remote = Arc::new(MemoryRemote::new(store));
    let mut hub = Hub::new(remote.clone(), timeout);
    hub.add_model("mixer", MIXER);

    let left = RecordingRenderer::new();
    let right = RecordingRenderer::new();
    for (name, renderer) in [("left", &left), ("right", &right)] {
        let mut widget = Widget::new(name, StateSchema::new(["volume"]), Box::new(renderer.clone()));
        widget.controller_mut().bind_to_model("volume", "mixer", None);
        hub.add_widget(widget, &["mixer"]).unwrap();
    }

    Fixture {
        remote,
        left,
        right,
        hub,
    }
}

async fn next_event(rx: &mut Receiver<HubNotification>) -> HubNotification {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a notification")
        .expect("notification channel closed")
}

#[tokio::test]
async fn test_write_broadcasts_to_every_subscriber() {
    let f = fixture(Duration::from_secs(10));
    let mut rx = f.hub.subscribe();
    let handle = f.hub.spawn();

    assert!(handle.user_input("left", edit(json!({"volume": 7}))).await.unwrap());

    assert_eq!(
        next_event(&mut rx).await,
        HubNotification::Confirmed {
            widget: "left".to_string(),
            state: json!({"volume": 7}),
            forced: false,
        }
    );
    assert_eq!(
        next_event(&mut rx).await,
        HubNotification::Confirmed {
            widget: "right".to_string(),
            state: json!({"volume": 7}),
            forced: true,
        }
    );

    // Origin only rendered its own input; the echo matched the shadow
    assert_eq!(f.left.frames(), vec![edit(json!({"volume": 7}))]);
    assert_eq!(f.right.frames(), vec![edit(json!({"volume": 7}))]);
    assert_eq!(f.remote.store().document(MIXER).unwrap()["volume"], json!(7));

    let left = handle.snapshot("left").await.unwrap();
    assert_eq!(left.transaction, "idle");
    assert!(left.clear_to_send);
    assert_eq!(left.state, json!({"volume": 7}));
}

#[tokio::test]
async fn test_failure_reaches_origin_only_and_reopens_gate() {
    let f = fixture(Duration::from_secs(10));
    f.remote.fail_next(RemoteError::Status {
        status: 500,
        reason: "Internal Server Error".to_string(),
        body: "boom".to_string(),
    });
    let mut rx = f.hub.subscribe();
    let handle = f.hub.spawn();

    assert!(handle.user_input("left", edit(json!({"volume": 9}))).await.unwrap());
    assert_eq!(
        next_event(&mut rx).await,
        HubNotification::ModelFailure {
            widget: "left".to_string(),
            error: "Internal Server Error".to_string(),
            message: "boom".to_string(),
        }
    );

    let left = handle.snapshot("left").await.unwrap();
    assert_eq!(left.transaction, "failed");
    assert!(left.clear_to_send);
    assert!(left.model_failure);
    assert_eq!(left.state, json!({"volume": null}));
    assert_eq!(left.shadow, json!({"volume": 9}));

    let right = handle.snapshot("right").await.unwrap();
    assert_eq!(right.transaction, "idle");
    assert!(f.right.frames().is_empty());

    // Retry with the same value still reaches the model
    assert!(handle.user_input("left", edit(json!({"volume": 9}))).await.unwrap());
    assert!(matches!(
        next_event(&mut rx).await,
        HubNotification::Confirmed { ref widget, forced: false, .. } if widget == "left"
    ));
    assert_eq!(f.remote.store().document(MIXER).unwrap()["volume"], json!(9));
}

#[tokio::test]
async fn test_edit_dropped_while_pending() {
    let f = fixture(Duration::from_secs(10));
    f.remote.stall_next();
    let mut rx = f.hub.subscribe();
    let handle = f.hub.spawn();

    assert!(handle.user_input("left", edit(json!({"volume": 1}))).await.unwrap());
    assert!(!handle.user_input("left", edit(json!({"volume": 2}))).await.unwrap());

    assert_eq!(
        next_event(&mut rx).await,
        HubNotification::EditDropped {
            widget: "left".to_string()
        }
    );
    assert_eq!(handle.snapshot("left").await.unwrap().transaction, "pending");

    // The other widget is not gated by the left one's transaction
    assert!(handle.user_input("right", edit(json!({"volume": 5}))).await.unwrap());
}

#[tokio::test]
async fn test_clear_transaction_reopens_gate() {
    let f = fixture(Duration::from_secs(10));
    f.remote.stall_next();
    let handle = f.hub.spawn();

    assert!(handle.user_input("left", edit(json!({"volume": 1}))).await.unwrap());
    handle.clear_transaction("left").await.unwrap();

    let left = handle.snapshot("left").await.unwrap();
    assert_eq!(left.transaction, "idle");
    assert!(handle.user_input("left", edit(json!({"volume": 2}))).await.unwrap());
}

#[tokio::test]
async fn test_stalled_transaction_expires() {
    let f = fixture(Duration::from_millis(50));
    f.remote.stall_next();
    let mut rx = f.hub.subscribe();
    let handle = f.hub.spawn();

    assert!(handle.user_input("left", edit(json!({"volume": 4}))).await.unwrap());
    assert_eq!(
        next_event(&mut rx).await,
        HubNotification::ModelFailure {
            widget: "left".to_string(),
            error: "timeout".to_string(),
            message: "no response within 50 ms".to_string(),
        }
    );

    let left = handle.snapshot("left").await.unwrap();
    assert_eq!(left.transaction, "failed");
    assert!(left.clear_to_send);
}

#[tokio::test]
async fn test_whole_document_read_is_raw() {
    let f = fixture(Duration::from_secs(10));
    let mut rx = f.hub.subscribe();
    let handle = f.hub.spawn();

    handle.read("left", None, false).await.unwrap();
    assert_eq!(
        next_event(&mut rx).await,
        HubNotification::RawData {
            widget: "left".to_string(),
            data: json!({"volume": 3, "mute": false}),
        }
    );
    assert!(f.left.frames().is_empty());
}

#[tokio::test]
async fn test_scoped_read_goes_to_origin_only() {
    let f = fixture(Duration::from_secs(10));
    let mut rx = f.hub.subscribe();
    let handle = f.hub.spawn();

    handle.read("left", Some("volume".to_string()), true).await.unwrap();
    assert_eq!(
        next_event(&mut rx).await,
        HubNotification::Confirmed {
            widget: "left".to_string(),
            state: json!({"volume": 3}),
            forced: true,
        }
    );
    assert_eq!(f.left.frames(), vec![edit(json!({"volume": 3}))]);
    assert!(f.right.frames().is_empty());
}

#[tokio::test]
async fn test_startup_reads_run_first() {
    let mut f = fixture(Duration::from_secs(10));
    f.hub.queue_startup(
        1,
        ModelRequest::Read {
            model: "mixer".to_string(),
            param: Some("volume".to_string()),
            force_view_update: true,
            endpoint: None,
        },
    );
    let mut rx = f.hub.subscribe();
    let _handle = f.hub.spawn();

    assert!(matches!(
        next_event(&mut rx).await,
        HubNotification::Confirmed { ref widget, forced: true, .. } if widget == "right"
    ));
    assert_eq!(f.right.frames(), vec![edit(json!({"volume": 3}))]);
}

#[tokio::test]
async fn test_force_set_publishes_forced_state() {
    let f = fixture(Duration::from_secs(10));
    let mut rx = f.hub.subscribe();
    let handle = f.hub.spawn();

    assert!(handle.force_set("right", edit(json!({"volume": 11}))).await.unwrap());
    assert!(!handle.force_set("right", edit(json!({"volume": 11}))).await.unwrap());

    assert_eq!(
        next_event(&mut rx).await,
        HubNotification::Confirmed {
            widget: "right".to_string(),
            state: json!({"volume": 11}),
            forced: true,
        }
    );
    assert_eq!(f.right.frames(), vec![edit(json!({"volume": 11}))]);
    // Forced state is local; the model is not written
    assert_eq!(f.remote.store().document(MIXER).unwrap()["volume"], json!(3));
}

#[tokio::test]
async fn test_unknown_widget_is_an_error() {
    let f = fixture(Duration::from_secs(10));
    let handle = f.hub.spawn();

    assert_eq!(
        handle.user_input("nope", edit(json!({"volume": 1}))).await,
        Err(HubError::UnknownWidget("nope".to_string()))
    );
    assert_eq!(
        handle.read("nope", None, false).await,
        Err(HubError::UnknownWidget("nope".to_string()))
    );
}

#[tokio::test]
async fn test_request_for_unknown_model_fails_origin() {
    let mut f = fixture(Duration::from_secs(10));
    let mut widget = Widget::new("lamp", StateSchema::new(["on"]), Box::new(RecordingRenderer::new()));
    widget.controller_mut().bind_to_model("on", "lights", None);
    f.hub.add_widget(widget, &["mixer"]).unwrap();

    let mut rx = f.hub.subscribe();
    let handle = f.hub.spawn();

    assert!(handle.user_input("lamp", edit(json!({"on": true}))).await.unwrap());
    assert_eq!(
        next_event(&mut rx).await,
        HubNotification::ModelFailure {
            widget: "lamp".to_string(),
            error: "unknown model".to_string(),
            message: "lights".to_string(),
        }
    );
}

#[tokio::test]
async fn test_change_handler_read_reaches_origin() {
    let mut f = fixture(Duration::from_secs(10));
    let mut widget = Widget::new(
        "meter",
        StateSchema::new(["volume", "refresh"]),
        Box::new(RecordingRenderer::new()),
    );
    widget
        .controller_mut()
        .on_change("refresh", |_, fx| fx.read("mixer", None, false));
    f.hub.add_widget(widget, &["mixer"]).unwrap();

    let mut rx = f.hub.subscribe();
    let handle = f.hub.spawn();

    assert!(handle.user_input("meter", edit(json!({"refresh": true}))).await.unwrap());
    assert_eq!(
        next_event(&mut rx).await,
        HubNotification::RawData {
            widget: "meter".to_string(),
            data: json!({"volume": 3, "mute": false}),
        }
    );

    // Reads leave the document and the other subscribers alone
    assert!(f.left.frames().is_empty());
    assert_eq!(f.remote.store().document(MIXER).unwrap()["volume"], json!(3));
    assert_eq!(handle.snapshot("meter").await.unwrap().transaction, "idle");
}

#[tokio::test]
async fn test_update_settings_moves_model_endpoint() {
    let f = fixture(Duration::from_secs(10));
    let mut rx = f.hub.subscribe();
    let handle = f.hub.spawn();

    let mut endpoints = HashMap::new();
    endpoints.insert("mixer".to_string(), "/api/mixer-v2".to_string());
    handle.update_settings(HubSettings {
        endpoints,
        transaction_timeout: Duration::from_secs(5),
    });

    assert!(handle.user_input("left", edit(json!({"volume": 6}))).await.unwrap());
    next_event(&mut rx).await;

    assert_eq!(f.remote.store().document("/api/mixer-v2").unwrap()["volume"], json!(6));
    assert_eq!(f.remote.store().document(MIXER).unwrap()["volume"], json!(3));
}

#[tokio::test]
async fn test_registration_errors() {
    let mut f = fixture(Duration::from_secs(10));

    let dup = Widget::new("left", StateSchema::new(["volume"]), Box::new(RecordingRenderer::new()));
    assert_eq!(
        f.hub.add_widget(dup, &["mixer"]),
        Err(HubError::DuplicateWidget("left".to_string()))
    );

    let orphan = Widget::new("orphan", StateSchema::new(["volume"]), Box::new(RecordingRenderer::new()));
    assert_eq!(
        f.hub.add_widget(orphan, &["lights"]),
        Err(HubError::UnknownModel("lights".to_string()))
    );
}

#[tokio::test]
async fn test_list_widgets_and_shutdown() {
    let f = fixture(Duration::from_secs(10));
    let handle = f.hub.spawn();

    let names: Vec<String> = handle
        .list_widgets()
        .await
        .unwrap()
        .into_iter()
        .map(|w| w.name)
        .collect();
    assert_eq!(names, vec!["left", "right"]);

    handle.shutdown();
    tokio::time::timeout(Duration::from_secs(1), async {
        while handle.is_alive() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(handle.list_widgets().await, Err(HubError::Closed));
}
